//! The `kubeone.k8c.io/v1beta2` revision, the current one.
//!
//! Compared to [`v1beta1`](super::v1beta1) this revision adds dual-stack
//! networking, Helm releases and the VMware Cloud Director and KubeVirt
//! providers. Docker is no longer a supported container runtime.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::v1beta1::{CanalSpec, ExternalCniSpec, KubeProxyConfig, WeaveNetSpec};
use crate::api::{
    Addons, ApiEndpoint, AwsSpec, AzureSpec, DigitalOceanSpec, DynamicWorkerConfig,
    EquinixMetalSpec, Features, GceSpec, HelmRelease, HetznerSpec, IpFamily,
    KubeProxyReplacement, KubevirtSpec, MachineControllerConfig, NoneSpec, NutanixSpec,
    OpenStackSpec, OperatingSystemManagerConfig, ProxyConfig, SystemPackages, Taint, VSphereSpec,
    VersionConfig, VmwareCloudDirectorSpec,
};

mod conversion;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct KubeOneCluster {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub control_plane: ControlPlaneConfig,
    pub api_endpoint: ApiEndpoint,
    pub cloud_provider: CloudProviderSpec,
    pub versions: VersionConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_runtime: Option<ContainerRuntimeConfig>,
    pub cluster_network: ClusterNetworkConfig,
    pub proxy: ProxyConfig,
    pub static_workers: StaticWorkersConfig,
    pub dynamic_workers: Vec<DynamicWorkerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_controller: Option<MachineControllerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_system_manager: Option<OperatingSystemManagerConfig>,
    pub features: Features,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addons: Option<Addons>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub helm_releases: Vec<HelmRelease>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_packages: Option<SystemPackages>,
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

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct HostConfig {
    pub public_address: String,
    pub private_address: String,
    #[serde(rename = "ipv6Addresses", skip_serializing_if = "Vec::is_empty")]
    pub ipv6_addresses: Vec<String>,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<Taint>>,
    pub labels: BTreeMap<String, String>,
}

/// Exactly one provider section must be set.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct CloudProviderSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureSpec>,
    #[serde(rename = "digitalocean", skip_serializing_if = "Option::is_none")]
    pub digital_ocean: Option<DigitalOceanSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gce: Option<GceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hetzner: Option<HetznerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nutanix: Option<NutanixSpec>,
    #[serde(rename = "openstack", skip_serializing_if = "Option::is_none")]
    pub open_stack: Option<OpenStackSpec>,
    #[serde(rename = "equinixmetal", skip_serializing_if = "Option::is_none")]
    pub equinix_metal: Option<EquinixMetalSpec>,
    #[serde(rename = "vsphere", skip_serializing_if = "Option::is_none")]
    pub vsphere: Option<VSphereSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmware_cloud_director: Option<VmwareCloudDirectorSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubevirt: Option<KubevirtSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub none: Option<NoneSpec>,

    pub external: bool,
    #[serde(rename = "disableBundledCSIDrivers")]
    pub disable_bundled_csi_drivers: bool,
    pub cloud_config: String,
    pub csi_config: String,
}

/// Only containerd is left, Docker support was removed in this revision.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ContainerRuntimeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containerd: Option<super::v1beta1::ContainerRuntimeContainerd>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ClusterNetworkConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_family: Option<IpFamily>,
    pub pod_subnet: String,
    #[serde(rename = "podSubnetIPv6")]
    pub pod_subnet_ipv6: String,
    pub service_subnet: String,
    #[serde(rename = "serviceSubnetIPv6")]
    pub service_subnet_ipv6: String,
    pub service_domain_name: String,
    pub node_port_range: String,
    #[serde(rename = "nodeCIDRMaskSizeIPv4", skip_serializing_if = "Option::is_none")]
    pub node_cidr_mask_size_ipv4: Option<u8>,
    #[serde(rename = "nodeCIDRMaskSizeIPv6", skip_serializing_if = "Option::is_none")]
    pub node_cidr_mask_size_ipv6: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cni: Option<CniConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kube_proxy: Option<KubeProxyConfig>,
}

/// At most one CNI section may be set.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct CniConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canal: Option<CanalSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cilium: Option<CiliumSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weave_net: Option<WeaveNetSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalCniSpec>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct CiliumSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kube_proxy_replacement: Option<KubeProxyReplacement>,
    pub enable_hubble: bool,
}
