//! The canonical, version-independent cluster configuration model.
//!
//! Every versioned manifest (see [`crate::manifest`]) converts into a
//! [`KubeOneCluster`], and every consumer of the configuration reads only this
//! type. The model follows two conventions:
//!
//! - String fields use the empty string to mean "unset". In YAML an absent and
//!   an empty scalar are indistinguishable, so there is no point in an extra
//!   [`Option`] layer.
//! - Every other field which is filled in by [defaulting](crate::defaults) or by
//!   the [infrastructure merge](crate::infra) is an [`Option`], so that "the user
//!   wrote nothing" can be told apart from a deliberate value.
//!
//! Tagged unions ([`CloudProvider`], [`Cni`], [`ContainerRuntime`],
//! [`KubeProxyConfig`]) are closed enums. Exactly one variant is populated by
//! construction, which is checked once at the conversion boundary.
use std::collections::BTreeMap;

pub use k8s_openapi::api::core::v1::Taint;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

mod cloud_provider;
mod host;

pub use cloud_provider::*;
pub use host::*;

/// The effect used by every taint the pipeline creates on its own.
pub const TAINT_EFFECT_NO_SCHEDULE: &str = "NoSchedule";

/// The legacy control plane taint key, used up to Kubernetes 1.24.
pub const MASTER_TAINT_KEY: &str = "node-role.kubernetes.io/master";

/// The control plane taint key, used since Kubernetes 1.24.
pub const CONTROL_PLANE_TAINT_KEY: &str = "node-role.kubernetes.io/control-plane";

/// Builds a `NoSchedule` taint without a value for the given `key`.
pub fn no_schedule_taint(key: &str) -> Taint {
    Taint {
        key: key.to_owned(),
        effect: TAINT_EFFECT_NO_SCHEDULE.to_owned(),
        ..Default::default()
    }
}

/// The canonical cluster configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct KubeOneCluster {
    pub name: String,
    pub control_plane: ControlPlaneConfig,
    pub api_endpoint: ApiEndpoint,
    pub cloud_provider: CloudProviderSpec,
    pub versions: VersionConfig,
    pub container_runtime: Option<ContainerRuntime>,
    pub cluster_network: ClusterNetworkConfig,
    pub proxy: ProxyConfig,
    pub static_workers: StaticWorkersConfig,
    pub dynamic_workers: Vec<DynamicWorkerConfig>,
    pub machine_controller: Option<MachineControllerConfig>,
    pub operating_system_manager: Option<OperatingSystemManagerConfig>,
    pub features: Features,
    pub addons: Option<Addons>,
    pub helm_releases: Vec<HelmRelease>,
    pub system_packages: Option<SystemPackages>,
}

impl KubeOneCluster {
    /// Returns all hosts, control plane hosts first.
    pub fn hosts(&self) -> impl Iterator<Item = &HostConfig> {
        self.control_plane
            .hosts
            .iter()
            .chain(self.static_workers.hosts.iter())
    }

    /// Returns the control plane host marked as leader, if any.
    pub fn leader(&self) -> Option<&HostConfig> {
        self.control_plane.hosts.iter().find(|host| host.is_leader)
    }

    /// Returns the dynamic worker pool with the given name.
    pub fn dynamic_worker(&self, name: &str) -> Option<&DynamicWorkerConfig> {
        self.dynamic_workers.iter().find(|pool| pool.name == name)
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ControlPlaneConfig {
    pub hosts: Vec<HostConfig>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct StaticWorkersConfig {
    pub hosts: Vec<HostConfig>,
}

/// The endpoint used to reach the Kubernetes API server, usually a load
/// balancer in front of the control plane.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ApiEndpoint {
    pub host: String,
    pub port: Option<u16>,
    pub alternative_names: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct VersionConfig {
    /// The Kubernetes version, without a leading `v` once defaulted.
    pub kubernetes: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerRuntime {
    Docker,
    Containerd,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ClusterNetworkConfig {
    pub ip_family: Option<IpFamily>,
    pub pod_subnet: String,
    pub pod_subnet_ipv6: String,
    pub service_subnet: String,
    pub service_subnet_ipv6: String,
    pub service_domain_name: String,
    pub node_port_range: String,
    pub node_cidr_mask_size_ipv4: Option<u8>,
    pub node_cidr_mask_size_ipv6: Option<u8>,
    pub cni: Option<Cni>,
    pub kube_proxy: Option<KubeProxyConfig>,
}

/// The IP families used by the cluster network.
///
/// The string forms are the ones used in manifests, e.g. `IPv4+IPv6`.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize,
)]
pub enum IpFamily {
    #[default]
    #[serde(rename = "IPv4")]
    #[strum(serialize = "IPv4")]
    IPv4,

    #[serde(rename = "IPv6")]
    #[strum(serialize = "IPv6")]
    IPv6,

    #[serde(rename = "IPv4+IPv6")]
    #[strum(serialize = "IPv4+IPv6")]
    IPv4IPv6,

    #[serde(rename = "IPv6+IPv4")]
    #[strum(serialize = "IPv6+IPv4")]
    IPv6IPv4,
}

impl IpFamily {
    pub fn has_ipv4(self) -> bool {
        !matches!(self, Self::IPv6)
    }

    pub fn has_ipv6(self) -> bool {
        !matches!(self, Self::IPv4)
    }
}

/// The container network interface plugin.
#[derive(Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Cni {
    Canal {
        mtu: Option<u32>,
    },
    Cilium {
        kube_proxy_replacement: Option<KubeProxyReplacement>,
        enable_hubble: bool,
    },
    WeaveNet {
        encrypted: bool,
    },
    External,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum KubeProxyReplacement {
    #[default]
    Disabled,
    Partial,
    Strict,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KubeProxyConfig {
    Ipvs(IpvsConfig),
    Iptables,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct IpvsConfig {
    pub strict_arp: bool,
    pub scheduler: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ProxyConfig {
    pub http: String,
    pub https: String,
    pub no_proxy: String,
}

/// A pool of workers created by the machine-controller.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct DynamicWorkerConfig {
    pub name: String,
    pub replicas: Option<u32>,
    pub provider_spec: ProviderSpec,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Provider specific instance parameters. This is schemaless on purpose,
    /// the machine-controller owns its format.
    pub cloud_provider_spec: serde_json::Value,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub taints: Vec<Taint>,
    pub ssh_public_keys: Vec<String>,
    pub operating_system: String,
    pub operating_system_spec: serde_json::Value,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct MachineControllerConfig {
    pub deploy: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct OperatingSystemManagerConfig {
    pub deploy: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct SystemPackages {
    pub configure_repositories: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Features {
    pub metrics_server: Option<MetricsServer>,
    #[serde(rename = "coreDNS")]
    pub core_dns: Option<CoreDns>,
    #[serde(rename = "nodeLocalDNS")]
    pub node_local_dns: Option<NodeLocalDns>,
    pub static_audit_log: Option<StaticAuditLog>,
    pub openid_connect: Option<OpenIdConnect>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct MetricsServer {
    pub enable: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct CoreDns {
    pub replicas: Option<u32>,
    pub deploy_pod_disruption_budget: Option<bool>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct NodeLocalDns {
    pub deploy: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct StaticAuditLog {
    pub enable: bool,
    pub config: StaticAuditLogConfig,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct StaticAuditLogConfig {
    pub policy_file_path: String,
    pub log_path: String,
    pub log_max_age: Option<u32>,
    pub log_max_backup: Option<u32>,
    pub log_max_size: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct OpenIdConnect {
    pub enable: bool,
    pub config: OpenIdConnectConfig,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct OpenIdConnectConfig {
    #[serde(rename = "issuerURL")]
    pub issuer_url: String,
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub username_claim: String,
    pub username_prefix: String,
    pub groups_claim: String,
    pub groups_prefix: String,
    pub required_claim: String,
    pub signing_algs: String,
    pub ca_file: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Addons {
    pub enable: bool,
    pub path: String,
    pub global_params: BTreeMap<String, String>,
    pub addons: Vec<Addon>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Addon {
    pub name: String,
    pub params: BTreeMap<String, String>,
    pub delete: bool,
}

/// A Helm chart deployed into the cluster after provisioning.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct HelmRelease {
    pub chart: String,
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    #[serde(rename = "version")]
    pub chart_version: String,
    pub release_name: String,
    pub namespace: String,
    pub wait: bool,
    pub timeout: String,
    pub values: Vec<HelmValues>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct HelmValues {
    pub values_file: String,
    pub inline: serde_json::Value,
}
