use super::{
    CiliumSpec, CloudProviderSpec, ClusterNetworkConfig, CniConfig, ContainerRuntimeConfig,
    ControlPlaneConfig, HostConfig, KubeOneCluster, StaticWorkersConfig,
};
use crate::{
    api::{self, CloudProvider},
    manifest::{
        KIND, ManifestRevision, OneOf, Result, Revision, UnsupportedVariantSnafu,
        v1beta1::{
            CanalSpec, ContainerRuntimeContainerd, ExternalCniSpec, WeaveNetSpec,
            kube_proxy_from_canonical, kube_proxy_into_canonical,
        },
    },
};

const REVISION: Revision = Revision::V1Beta2;

impl ManifestRevision for KubeOneCluster {
    const REVISION: Revision = REVISION;

    fn into_canonical(self) -> Result<api::KubeOneCluster> {
        let container_runtime = self
            .container_runtime
            .and_then(|runtime| runtime.containerd)
            .map(|_| api::ContainerRuntime::Containerd);

        Ok(api::KubeOneCluster {
            name: self.name,
            control_plane: api::ControlPlaneConfig {
                hosts: self
                    .control_plane
                    .hosts
                    .into_iter()
                    .map(HostConfig::into_canonical)
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
                    .map(HostConfig::into_canonical)
                    .collect(),
            },
            dynamic_workers: self.dynamic_workers,
            machine_controller: self.machine_controller,
            operating_system_manager: self.operating_system_manager,
            features: self.features,
            addons: self.addons,
            helm_releases: self.helm_releases,
            system_packages: self.system_packages,
        })
    }

    fn from_canonical(cluster: &api::KubeOneCluster) -> Result<Self> {
        let container_runtime = match cluster.container_runtime {
            None => None,
            Some(api::ContainerRuntime::Containerd) => Some(ContainerRuntimeConfig {
                containerd: Some(ContainerRuntimeContainerd {}),
            }),
            Some(runtime @ api::ContainerRuntime::Docker) => {
                return UnsupportedVariantSnafu {
                    field: "containerRuntime",
                    variant: runtime.to_string(),
                    revision: REVISION,
                }
                .fail();
            }
        };

        Ok(Self {
            api_version: REVISION.api_version(),
            kind: KIND.to_owned(),
            name: cluster.name.clone(),
            control_plane: ControlPlaneConfig {
                hosts: cluster
                    .control_plane
                    .hosts
                    .iter()
                    .map(HostConfig::from_canonical)
                    .collect(),
            },
            api_endpoint: cluster.api_endpoint.clone(),
            cloud_provider: CloudProviderSpec::from_canonical(&cluster.cloud_provider),
            versions: cluster.versions.clone(),
            container_runtime,
            cluster_network: ClusterNetworkConfig::from_canonical(&cluster.cluster_network),
            proxy: cluster.proxy.clone(),
            static_workers: StaticWorkersConfig {
                hosts: cluster
                    .static_workers
                    .hosts
                    .iter()
                    .map(HostConfig::from_canonical)
                    .collect(),
            },
            dynamic_workers: cluster.dynamic_workers.clone(),
            machine_controller: cluster.machine_controller,
            operating_system_manager: cluster.operating_system_manager,
            features: cluster.features.clone(),
            addons: cluster.addons.clone(),
            helm_releases: cluster.helm_releases.clone(),
            system_packages: cluster.system_packages,
        })
    }
}

impl HostConfig {
    fn into_canonical(self) -> api::HostConfig {
        api::HostConfig {
            public_address: self.public_address,
            private_address: self.private_address,
            ipv6_addresses: self.ipv6_addresses,
            hostname: self.hostname,
            ssh_port: self.ssh_port,
            ssh_username: self.ssh_username,
            ssh_private_key_file: self.ssh_private_key_file,
            ssh_agent_socket: self.ssh_agent_socket,
            bastion: self.bastion,
            bastion_port: self.bastion_port,
            bastion_user: self.bastion_user,
            is_leader: self.is_leader,
            taints: self.taints,
            labels: self.labels,
            ..Default::default()
        }
    }

    fn from_canonical(host: &api::HostConfig) -> Self {
        Self {
            public_address: host.public_address.clone(),
            private_address: host.private_address.clone(),
            ipv6_addresses: host.ipv6_addresses.clone(),
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
        }
    }
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
            .with(
                "vmwareCloudDirector",
                self.vmware_cloud_director,
                CloudProvider::VmwareCloudDirector,
            )
            .with("kubevirt", self.kubevirt, CloudProvider::Kubevirt)
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

    fn from_canonical(spec: &api::CloudProviderSpec) -> Self {
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
            CloudProvider::VmwareCloudDirector(vcd) => {
                versioned.vmware_cloud_director = Some(vcd.clone());
            }
            CloudProvider::Kubevirt(kubevirt) => versioned.kubevirt = Some(kubevirt.clone()),
            CloudProvider::None(none) => versioned.none = Some(none.clone()),
        }

        versioned
    }
}

impl ClusterNetworkConfig {
    fn into_canonical(self) -> Result<api::ClusterNetworkConfig> {
        let cni = match self.cni {
            Some(cni) => cni.into_canonical()?,
            None => None,
        };

        Ok(api::ClusterNetworkConfig {
            ip_family: self.ip_family,
            pod_subnet: self.pod_subnet,
            pod_subnet_ipv6: self.pod_subnet_ipv6,
            service_subnet: self.service_subnet,
            service_subnet_ipv6: self.service_subnet_ipv6,
            service_domain_name: self.service_domain_name,
            node_port_range: self.node_port_range,
            node_cidr_mask_size_ipv4: self.node_cidr_mask_size_ipv4,
            node_cidr_mask_size_ipv6: self.node_cidr_mask_size_ipv6,
            cni,
            kube_proxy: kube_proxy_into_canonical(self.kube_proxy)?,
        })
    }

    fn from_canonical(network: &api::ClusterNetworkConfig) -> Self {
        Self {
            ip_family: network.ip_family,
            pod_subnet: network.pod_subnet.clone(),
            pod_subnet_ipv6: network.pod_subnet_ipv6.clone(),
            service_subnet: network.service_subnet.clone(),
            service_subnet_ipv6: network.service_subnet_ipv6.clone(),
            service_domain_name: network.service_domain_name.clone(),
            node_port_range: network.node_port_range.clone(),
            node_cidr_mask_size_ipv4: network.node_cidr_mask_size_ipv4,
            node_cidr_mask_size_ipv6: network.node_cidr_mask_size_ipv6,
            cni: network.cni.as_ref().map(CniConfig::from_canonical),
            kube_proxy: network.kube_proxy.as_ref().map(kube_proxy_from_canonical),
        }
    }
}

impl CniConfig {
    fn into_canonical(self) -> Result<Option<api::Cni>> {
        OneOf::new("clusterNetwork.cni")
            .with("canal", self.canal, |canal| api::Cni::Canal { mtu: canal.mtu })
            .with("cilium", self.cilium, |cilium| api::Cni::Cilium {
                kube_proxy_replacement: cilium.kube_proxy_replacement,
                enable_hubble: cilium.enable_hubble,
            })
            .with("weaveNet", self.weave_net, |weave_net| api::Cni::WeaveNet {
                encrypted: weave_net.encrypted,
            })
            .with("external", self.external, |_| api::Cni::External)
            .optional()
    }

    fn from_canonical(cni: &api::Cni) -> Self {
        match cni {
            api::Cni::Canal { mtu } => Self {
                canal: Some(CanalSpec { mtu: *mtu }),
                ..Default::default()
            },
            api::Cni::Cilium {
                kube_proxy_replacement,
                enable_hubble,
            } => Self {
                cilium: Some(CiliumSpec {
                    kube_proxy_replacement: *kube_proxy_replacement,
                    enable_hubble: *enable_hubble,
                }),
                ..Default::default()
            },
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
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;
    use crate::{
        api::{IpFamily, KubeProxyReplacement, VmwareCloudDirectorSpec},
        manifest::{self, Error},
    };

    #[test]
    fn dual_stack_network() {
        let cluster = manifest::from_yaml(indoc! {"
            apiVersion: kubeone.k8c.io/v1beta2
            kind: KubeOneCluster
            name: demo
            cloudProvider:
              vmwareCloudDirector:
                vapp: cluster-vapp
            controlPlane:
              hosts:
                - privateAddress: 10.0.0.1
                  ipv6Addresses: [\"fd00::1\"]
            clusterNetwork:
              ipFamily: IPv4+IPv6
              podSubnetIPv6: fd01::/48
              nodeCIDRMaskSizeIPv6: 80
              cni:
                cilium:
                  kubeProxyReplacement: partial
                  enableHubble: true
        "})
        .expect("manifest must convert");

        assert_eq!(
            cluster.cloud_provider.provider,
            CloudProvider::VmwareCloudDirector(VmwareCloudDirectorSpec {
                vapp: "cluster-vapp".to_owned(),
                ..Default::default()
            })
        );
        assert_eq!(cluster.control_plane.hosts[0].ipv6_addresses, ["fd00::1"]);

        let network = &cluster.cluster_network;
        assert_eq!(network.ip_family, Some(IpFamily::IPv4IPv6));
        assert_eq!(network.pod_subnet_ipv6, "fd01::/48");
        assert_eq!(network.node_cidr_mask_size_ipv6, Some(80));
        assert_eq!(
            network.cni,
            Some(api::Cni::Cilium {
                kube_proxy_replacement: Some(KubeProxyReplacement::Partial),
                enable_hubble: true,
            })
        );
    }

    #[test]
    fn docker_is_unknown() {
        let err = manifest::from_yaml(indoc! {"
            apiVersion: kubeone.k8c.io/v1beta2
            kind: KubeOneCluster
            cloudProvider:
              none: {}
            containerRuntime:
              docker: {}
        "})
        .expect_err("docker was removed");
        assert!(matches!(err, Error::DeserializeManifest { .. }), "{err:?}");

        let cluster = api::KubeOneCluster {
            container_runtime: Some(api::ContainerRuntime::Docker),
            ..Default::default()
        };
        let err = KubeOneCluster::from_canonical(&cluster).expect_err("docker was removed");
        assert!(
            matches!(err, Error::UnsupportedVariant { field: "containerRuntime", .. }),
            "{err:?}"
        );
    }

    #[rstest]
    #[case("disabled", KubeProxyReplacement::Disabled)]
    #[case("partial", KubeProxyReplacement::Partial)]
    #[case("strict", KubeProxyReplacement::Strict)]
    fn cilium_modes(#[case] mode: &str, #[case] expected: KubeProxyReplacement) {
        let cni: CniConfig = serde_yaml::from_str(&format!("cilium:\n  kubeProxyReplacement: {mode}\n"))
            .expect("CNI section must decode");

        assert_eq!(
            cni.into_canonical().expect("CNI must convert"),
            Some(api::Cni::Cilium {
                kube_proxy_replacement: Some(expected),
                enable_hubble: false,
            })
        );
    }

    #[test]
    fn helm_releases_round_trip() {
        let cluster = api::KubeOneCluster {
            name: "demo".to_owned(),
            cloud_provider: api::CloudProviderSpec {
                provider: CloudProvider::Kubevirt(api::KubevirtSpec {
                    infra_namespace: "tenant".to_owned(),
                }),
                ..Default::default()
            },
            helm_releases: vec![api::HelmRelease {
                chart: "cert-manager".to_owned(),
                repo_url: "https://charts.jetstack.io".to_owned(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let yaml = manifest::to_yaml(&cluster, Revision::V1Beta2).expect("cluster must convert");
        assert!(yaml.contains("repoURL: https://charts.jetstack.io"), "{yaml}");

        assert_eq!(
            manifest::from_yaml(&yaml).expect("written manifest must convert"),
            cluster
        );
    }
}
