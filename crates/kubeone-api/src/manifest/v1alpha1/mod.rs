//! The legacy `kubeone.k8c.io/v1alpha1` revision.
//!
//! All hosts are control plane hosts, the cloud provider is selected by name
//! and the Hetzner network lives in the cluster network section.
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::api::{
    Addons, DynamicWorkerConfig, MachineControllerConfig, MetricsServer, OpenIdConnect,
    ProxyConfig, StaticAuditLog, VersionConfig,
};

mod conversion;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct KubeOneCluster {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub hosts: Vec<HostConfig>,
    pub api_endpoint: ApiEndpoint,
    pub cloud_provider: CloudProviderSpec,
    pub versions: VersionConfig,
    pub cluster_network: ClusterNetworkConfig,
    pub proxy: ProxyConfig,
    pub workers: Vec<DynamicWorkerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_controller: Option<MachineControllerConfig>,
    pub features: Features,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addons: Option<Addons>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct HostConfig {
    pub public_address: String,
    pub private_address: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<u16>,
    pub ssh_username: String,
    pub ssh_private_key_file: String,
    pub ssh_agent_socket: String,
    pub bastion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bastion_port: Option<u16>,
    pub bastion_user: String,
    pub is_leader: bool,

    /// Removes the default control plane taint, so workloads can be scheduled
    /// on the host.
    pub untaint: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ApiEndpoint {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct CloudProviderSpec {
    /// One of [`ProviderName`], kept as a plain string so that unknown names
    /// surface as conversion errors naming the field.
    pub name: String,
    pub external: bool,
    pub cloud_config: String,
}

/// The provider names known to this revision.
#[derive(Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderName {
    Aws,
    Azure,
    DigitalOcean,
    Gce,
    Hetzner,
    OpenStack,
    Packet,
    VSphere,
    None,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ClusterNetworkConfig {
    pub pod_subnet: String,
    pub service_subnet: String,
    pub service_domain_name: String,
    pub node_port_range: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cni: Option<CniConfig>,

    /// Only meaningful on Hetzner.
    #[serde(rename = "networkID")]
    pub network_id: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct CniConfig {
    /// One of [`CniProvider`].
    pub provider: String,

    /// Only meaningful for Weave Net.
    pub encrypted: bool,
}

#[derive(Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum CniProvider {
    Canal,
    WeaveNet,
    External,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Features {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_server: Option<MetricsServer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_audit_log: Option<StaticAuditLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openid_connect: Option<OpenIdConnect>,
}
