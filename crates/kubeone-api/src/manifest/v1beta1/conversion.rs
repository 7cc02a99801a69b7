use snafu::ensure;

use super::{
    CanalSpec, CiliumSpec, CloudProviderSpec, ClusterNetworkConfig, CniConfig,
    ContainerRuntimeConfig, ContainerRuntimeContainerd, ContainerRuntimeDocker,
    ControlPlaneConfig, ExternalCniSpec, HostConfig, IptablesConfig, KubeOneCluster,
    KubeProxyConfig, StaticWorkersConfig, WeaveNetSpec,
};
use crate::{
    api::{self, CloudProvider, IpFamily, KubeProxyReplacement},
    manifest::{
        KIND, ManifestRevision, OneOf, Result, Revision, UnrepresentableFieldSnafu,
        UnsupportedVariantSnafu, ensure_representable,
    },
};

const REVISION: Revision = Revision::V1Beta1;

impl ManifestRevision for KubeOneCluster {
    const REVISION: Revision = REVISION;

    fn into_canonical(self) -> Result<api::KubeOneCluster> {
        let container_runtime = match self.container_runtime {
            Some(runtime) => runtime.into_canonical()?,
            None => None,
        };

        Ok(api::KubeOneCluster {
            name: self.name,
            control_plane: api::ControlPlaneConfig {
                hosts: self
                    .control_plane
                    .hosts
                    .into_iter()
                    .map(host_into_canonical)
                    .collect(),
            },
            api_endpoint: self.api_endpoint,
            cloud_provider: self.cloud_provider.into_canonical()?,
            versions: self.versions,
            container_runtime,
            cluster_network: self.cluster_network.into_canonical()?,
            proxy: self.proxy,
            static_workers: api::StaticWorkersConfig {
                hosts: self
                    .static_workers
                    .hosts
                    .into_iter()
                    .map(host_into_canonical)
                    .collect(),
            },
            dynamic_workers: self.dynamic_workers,
            machine_controller: self.machine_controller,
            operating_system_manager: self.operating_system_manager,
            features: self.features,
            addons: self.addons,
            helm_releases: Vec::new(),
            system_packages: self.system_packages,
        })
    }

    fn from_canonical(cluster: &api::KubeOneCluster) -> Result<Self> {
        ensure!(
            cluster.helm_releases.is_empty(),
            UnrepresentableFieldSnafu {
                field: "helmReleases",
                revision: REVISION,
            }
        );

        Ok(Self {
            api_version: REVISION.api_version(),
            kind: KIND.to_owned(),
            name: cluster.name.clone(),
            control_plane: ControlPlaneConfig {
                hosts: hosts_from_canonical(&cluster.control_plane.hosts)?,
            },
            api_endpoint: cluster.api_endpoint.clone(),
            cloud_provider: CloudProviderSpec::from_canonical(&cluster.cloud_provider)?,
            versions: cluster.versions.clone(),
            container_runtime: cluster
                .container_runtime
                .map(ContainerRuntimeConfig::from_canonical),
            cluster_network: ClusterNetworkConfig::from_canonical(&cluster.cluster_network)?,
            proxy: cluster.proxy.clone(),
            static_workers: StaticWorkersConfig {
                hosts: hosts_from_canonical(&cluster.static_workers.hosts)?,
            },
            dynamic_workers: cluster.dynamic_workers.clone(),
            machine_controller: cluster.machine_controller,
            operating_system_manager: cluster.operating_system_manager,
            features: cluster.features.clone(),
            addons: cluster.addons.clone(),
            system_packages: cluster.system_packages,
        })
    }
}

fn host_into_canonical(host: HostConfig) -> api::HostConfig {
    api::HostConfig {
        public_address: host.public_address,
        private_address: host.private_address,
        hostname: host.hostname,
        ssh_port: host.ssh_port,
        ssh_username: host.ssh_username,
        ssh_private_key_file: host.ssh_private_key_file,
        ssh_agent_socket: host.ssh_agent_socket,
        bastion: host.bastion,
        bastion_port: host.bastion_port,
        bastion_user: host.bastion_user,
        is_leader: host.is_leader,
        taints: host.taints,
        labels: host.labels,
        ..Default::default()
    }
}

fn hosts_from_canonical(hosts: &[api::HostConfig]) -> Result<Vec<HostConfig>> {
    hosts
        .iter()
        .map(|host| {
            ensure!(
                host.ipv6_addresses.is_empty(),
                UnrepresentableFieldSnafu {
                    field: "hosts.ipv6Addresses",
                    revision: REVISION,
                }
            );

            Ok(HostConfig {
                public_address: host.public_address.clone(),
                private_address: host.private_address.clone(),
                hostname: host.hostname.clone(),
                ssh_port: host.ssh_port,
                ssh_username: host.ssh_username.clone(),
                ssh_private_key_file: host.ssh_private_key_file.clone(),
                ssh_agent_socket: host.ssh_agent_socket.clone(),
                bastion: host.bastion.clone(),
                bastion_port: host.bastion_port,
                bastion_user: host.bastion_user.clone(),
                is_leader: host.is_leader,
                taints: host.taints.clone(),
                labels: host.labels.clone(),
            })
        })
        .collect()
}

impl CloudProviderSpec {
    fn into_canonical(self) -> Result<api::CloudProviderSpec> {
        let provider = OneOf::new("cloudProvider")
            .with("aws", self.aws, CloudProvider::Aws)
            .with("azure", self.azure, CloudProvider::Azure)
            .with("digitalocean", self.digital_ocean, CloudProvider::DigitalOcean)
            .with("gce", self.gce, CloudProvider::Gce)
            .with("hetzner", self.hetzner, CloudProvider::Hetzner)
            .with("nutanix", self.nutanix, CloudProvider::Nutanix)
            .with("openstack", self.open_stack, CloudProvider::OpenStack)
            .with("equinixmetal", self.equinix_metal, CloudProvider::EquinixMetal)
            .with("vsphere", self.vsphere, CloudProvider::VSphere)
            .with("none", self.none, CloudProvider::None)
            .required()?;

        Ok(api::CloudProviderSpec {
            external: self.external,
            disable_bundled_csi_drivers: self.disable_bundled_csi_drivers,
            cloud_config: self.cloud_config,
            csi_config: self.csi_config,
            provider,
        })
    }

    fn from_canonical(spec: &api::CloudProviderSpec) -> Result<Self> {
        let mut versioned = Self {
            external: spec.external,
            disable_bundled_csi_drivers: spec.disable_bundled_csi_drivers,
            cloud_config: spec.cloud_config.clone(),
            csi_config: spec.csi_config.clone(),
            ..Default::default()
        };

        match &spec.provider {
            CloudProvider::Aws(aws) => versioned.aws = Some(aws.clone()),
            CloudProvider::Azure(azure) => versioned.azure = Some(azure.clone()),
            CloudProvider::DigitalOcean(digital_ocean) => {
                versioned.digital_ocean = Some(digital_ocean.clone());
            }
            CloudProvider::Gce(gce) => versioned.gce = Some(gce.clone()),
            CloudProvider::Hetzner(hetzner) => versioned.hetzner = Some(hetzner.clone()),
            CloudProvider::Nutanix(nutanix) => versioned.nutanix = Some(nutanix.clone()),
            CloudProvider::OpenStack(open_stack) => versioned.open_stack = Some(open_stack.clone()),
            CloudProvider::EquinixMetal(equinix_metal) => {
                versioned.equinix_metal = Some(equinix_metal.clone());
            }
            CloudProvider::VSphere(vsphere) => versioned.vsphere = Some(vsphere.clone()),
            CloudProvider::None(none) => versioned.none = Some(none.clone()),
            provider @ (CloudProvider::VmwareCloudDirector(_) | CloudProvider::Kubevirt(_)) => {
                return UnsupportedVariantSnafu {
                    field: "cloudProvider",
                    variant: provider.kind().to_string(),
                    revision: REVISION,
                }
                .fail();
            }
        }

        Ok(versioned)
    }
}

impl ContainerRuntimeConfig {
    fn into_canonical(self) -> Result<Option<api::ContainerRuntime>> {
        OneOf::new("containerRuntime")
            .with("docker", self.docker, |_| api::ContainerRuntime::Docker)
            .with("containerd", self.containerd, |_| {
                api::ContainerRuntime::Containerd
            })
            .optional()
    }

    fn from_canonical(runtime: api::ContainerRuntime) -> Self {
        match runtime {
            api::ContainerRuntime::Docker => Self {
                docker: Some(ContainerRuntimeDocker {}),
                containerd: None,
            },
            api::ContainerRuntime::Containerd => Self {
                docker: None,
                containerd: Some(ContainerRuntimeContainerd {}),
            },
        }
    }
}

impl ClusterNetworkConfig {
    fn into_canonical(self) -> Result<api::ClusterNetworkConfig> {
        let cni = match self.cni {
            Some(cni) => cni.into_canonical()?,
            None => None,
        };

        Ok(api::ClusterNetworkConfig {
            pod_subnet: self.pod_subnet,
            service_subnet: self.service_subnet,
            service_domain_name: self.service_domain_name,
            node_port_range: self.node_port_range,
            cni,
            kube_proxy: kube_proxy_into_canonical(self.kube_proxy)?,
            ..Default::default()
        })
    }

    fn from_canonical(network: &api::ClusterNetworkConfig) -> Result<Self> {
        ensure_representable(
            network.ip_family.as_ref(),
            &IpFamily::IPv4,
            "clusterNetwork.ipFamily",
            REVISION,
        )?;
        ensure_representable(
            network.node_cidr_mask_size_ipv4.as_ref(),
            &24,
            "clusterNetwork.nodeCIDRMaskSizeIPv4",
            REVISION,
        )?;
        ensure_representable(
            network.node_cidr_mask_size_ipv6.as_ref(),
            &64,
            "clusterNetwork.nodeCIDRMaskSizeIPv6",
            REVISION,
        )?;
        ensure!(
            network.pod_subnet_ipv6.is_empty(),
            UnrepresentableFieldSnafu {
                field: "clusterNetwork.podSubnetIPv6",
                revision: REVISION,
            }
        );
        ensure!(
            network.service_subnet_ipv6.is_empty(),
            UnrepresentableFieldSnafu {
                field: "clusterNetwork.serviceSubnetIPv6",
                revision: REVISION,
            }
        );

        Ok(Self {
            pod_subnet: network.pod_subnet.clone(),
            service_subnet: network.service_subnet.clone(),
            service_domain_name: network.service_domain_name.clone(),
            node_port_range: network.node_port_range.clone(),
            cni: network.cni.as_ref().map(CniConfig::from_canonical).transpose()?,
            kube_proxy: network.kube_proxy.as_ref().map(kube_proxy_from_canonical),
        })
    }
}

impl CniConfig {
    fn into_canonical(self) -> Result<Option<api::Cni>> {
        OneOf::new("clusterNetwork.cni")
            .with("canal", self.canal, |canal| api::Cni::Canal { mtu: canal.mtu })
            .with("cilium", self.cilium, |cilium| api::Cni::Cilium {
                kube_proxy_replacement: Some(if cilium.kube_proxy_replacement {
                    KubeProxyReplacement::Strict
                } else {
                    KubeProxyReplacement::Disabled
                }),
                enable_hubble: cilium.enable_hubble,
            })
            .with("weaveNet", self.weave_net, |weave_net| api::Cni::WeaveNet {
                encrypted: weave_net.encrypted,
            })
            .with("external", self.external, |_| api::Cni::External)
            .optional()
    }

    fn from_canonical(cni: &api::Cni) -> Result<Self> {
        let versioned = match cni {
            api::Cni::Canal { mtu } => Self {
                canal: Some(CanalSpec { mtu: *mtu }),
                ..Default::default()
            },
            api::Cni::Cilium {
                kube_proxy_replacement,
                enable_hubble,
            } => {
                let kube_proxy_replacement = match kube_proxy_replacement {
                    None | Some(KubeProxyReplacement::Disabled) => false,
                    Some(KubeProxyReplacement::Strict) => true,
                    Some(KubeProxyReplacement::Partial) => {
                        return UnsupportedVariantSnafu {
                            field: "clusterNetwork.cni.cilium.kubeProxyReplacement",
                            variant: KubeProxyReplacement::Partial.to_string(),
                            revision: REVISION,
                        }
                        .fail();
                    }
                };

                Self {
                    cilium: Some(CiliumSpec {
                        kube_proxy_replacement,
                        enable_hubble: *enable_hubble,
                    }),
                    ..Default::default()
                }
            }
            api::Cni::WeaveNet { encrypted } => Self {
                weave_net: Some(WeaveNetSpec {
                    encrypted: *encrypted,
                }),
                ..Default::default()
            },
            api::Cni::External => Self {
                external: Some(ExternalCniSpec {}),
                ..Default::default()
            },
        };

        Ok(versioned)
    }
}

pub(in crate::manifest) fn kube_proxy_into_canonical(
    kube_proxy: Option<KubeProxyConfig>,
) -> Result<Option<api::KubeProxyConfig>> {
    let Some(kube_proxy) = kube_proxy else {
        return Ok(None);
    };

    OneOf::new("clusterNetwork.kubeProxy")
        .with("ipvs", kube_proxy.ipvs, api::KubeProxyConfig::Ipvs)
        .with("iptables", kube_proxy.iptables, |_| {
            api::KubeProxyConfig::Iptables
        })
        .optional()
}

pub(in crate::manifest) fn kube_proxy_from_canonical(
    kube_proxy: &api::KubeProxyConfig,
) -> KubeProxyConfig {
    match kube_proxy {
        api::KubeProxyConfig::Ipvs(ipvs) => KubeProxyConfig {
            ipvs: Some(ipvs.clone()),
            iptables: None,
        },
        api::KubeProxyConfig::Iptables => KubeProxyConfig {
            ipvs: None,
            iptables: Some(IptablesConfig {}),
        },
    }
}
