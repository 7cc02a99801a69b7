use std::fmt::Display;

use itertools::Itertools;
use snafu::{OptionExt, ensure};
use strum::IntoEnumIterator;

use super::{
    ApiEndpoint, CloudProviderSpec, ClusterNetworkConfig, CniConfig, CniProvider, Features,
    HostConfig, KubeOneCluster, ProviderName,
};
use crate::{
    api::{
        self, AwsSpec, AzureSpec, CloudProvider, CoreDns, DigitalOceanSpec, EquinixMetalSpec,
        GceSpec, HetznerSpec, IpFamily, MASTER_TAINT_KEY, NodeLocalDns, NoneSpec, OpenStackSpec,
        OperatingSystemManagerConfig, SystemPackages, VSphereSpec, no_schedule_taint,
    },
    defaults,
    manifest::{
        KIND, ManifestRevision, NoVariantSelectedSnafu, Result, Revision,
        UnknownVariantNameSnafu, UnrepresentableFieldSnafu, UnsupportedTaintsSnafu,
        UnsupportedVariantSnafu, ensure_representable,
    },
};

const REVISION: Revision = Revision::V1Alpha1;

impl ManifestRevision for KubeOneCluster {
    const REVISION: Revision = REVISION;

    fn into_canonical(self) -> Result<api::KubeOneCluster> {
        let mut provider = provider_into_canonical(&self.cloud_provider.name)?;
        migrate_network_id(&mut provider, self.cluster_network.network_id.clone());

        let cni = match &self.cluster_network.cni {
            Some(cni) => Some(cni_into_canonical(cni)?),
            None => None,
        };

        Ok(api::KubeOneCluster {
            name: self.name,
            control_plane: api::ControlPlaneConfig {
                hosts: self.hosts.into_iter().map(host_into_canonical).collect(),
            },
            api_endpoint: api::ApiEndpoint {
                host: self.api_endpoint.host,
                port: self.api_endpoint.port,
                alternative_names: Vec::new(),
            },
            cloud_provider: api::CloudProviderSpec {
                external: self.cloud_provider.external,
                cloud_config: self.cloud_provider.cloud_config,
                provider,
                ..Default::default()
            },
            versions: self.versions,
            // This revision predates the container runtime choice, every
            // cluster it describes runs Docker.
            container_runtime: Some(api::ContainerRuntime::Docker),
            cluster_network: api::ClusterNetworkConfig {
                pod_subnet: self.cluster_network.pod_subnet,
                service_subnet: self.cluster_network.service_subnet,
                service_domain_name: self.cluster_network.service_domain_name,
                node_port_range: self.cluster_network.node_port_range,
                cni,
                ..Default::default()
            },
            proxy: self.proxy,
            static_workers: api::StaticWorkersConfig::default(),
            dynamic_workers: self.workers,
            machine_controller: self.machine_controller,
            operating_system_manager: None,
            features: api::Features {
                metrics_server: self.features.metrics_server,
                static_audit_log: self.features.static_audit_log,
                openid_connect: self.features.openid_connect,
                ..Default::default()
            },
            addons: self.addons,
            helm_releases: Vec::new(),
            system_packages: None,
        })
    }

    fn from_canonical(cluster: &api::KubeOneCluster) -> Result<Self> {
        ensure_compatible(cluster)?;

        let kubernetes = &cluster.versions.kubernetes;
        let hosts = cluster
            .control_plane
            .hosts
            .iter()
            .map(|host| host_from_canonical(host, kubernetes))
            .collect::<Result<_>>()?;

        let network_id = match &cluster.cloud_provider.provider {
            CloudProvider::Hetzner(hetzner) => hetzner.network_id.clone(),
            _ => String::new(),
        };

        Ok(Self {
            api_version: REVISION.api_version(),
            kind: KIND.to_owned(),
            name: cluster.name.clone(),
            hosts,
            api_endpoint: ApiEndpoint {
                host: cluster.api_endpoint.host.clone(),
                port: cluster.api_endpoint.port,
            },
            cloud_provider: CloudProviderSpec {
                name: provider_name_from_canonical(&cluster.cloud_provider.provider)?.to_string(),
                external: cluster.cloud_provider.external,
                cloud_config: cluster.cloud_provider.cloud_config.clone(),
            },
            versions: cluster.versions.clone(),
            cluster_network: ClusterNetworkConfig {
                pod_subnet: cluster.cluster_network.pod_subnet.clone(),
                service_subnet: cluster.cluster_network.service_subnet.clone(),
                service_domain_name: cluster.cluster_network.service_domain_name.clone(),
                node_port_range: cluster.cluster_network.node_port_range.clone(),
                cni: cluster
                    .cluster_network
                    .cni
                    .as_ref()
                    .map(cni_from_canonical)
                    .transpose()?,
                network_id,
            },
            proxy: cluster.proxy.clone(),
            workers: cluster.dynamic_workers.clone(),
            machine_controller: cluster.machine_controller,
            features: Features {
                metrics_server: cluster.features.metrics_server,
                static_audit_log: cluster.features.static_audit_log.clone(),
                openid_connect: cluster.features.openid_connect.clone(),
            },
            addons: cluster.addons.clone(),
        })
    }
}

fn choices<E: IntoEnumIterator + Display>() -> String {
    E::iter().join(", ")
}

fn provider_into_canonical(name: &str) -> Result<CloudProvider> {
    const FIELD: &str = "cloudProvider.name";

    ensure!(
        !name.is_empty(),
        NoVariantSelectedSnafu {
            field: FIELD,
            choices: choices::<ProviderName>(),
        }
    );

    let provider_name = name.parse::<ProviderName>().ok().context(UnknownVariantNameSnafu {
        field: FIELD,
        name,
        choices: choices::<ProviderName>(),
    })?;

    let provider = match provider_name {
        ProviderName::Aws => CloudProvider::Aws(AwsSpec {}),
        ProviderName::Azure => CloudProvider::Azure(AzureSpec {}),
        ProviderName::DigitalOcean => CloudProvider::DigitalOcean(DigitalOceanSpec {}),
        ProviderName::Gce => CloudProvider::Gce(GceSpec {}),
        ProviderName::Hetzner => CloudProvider::Hetzner(HetznerSpec::default()),
        ProviderName::OpenStack => CloudProvider::OpenStack(OpenStackSpec {}),
        ProviderName::Packet => CloudProvider::EquinixMetal(EquinixMetalSpec {}),
        ProviderName::VSphere => CloudProvider::VSphere(VSphereSpec {}),
        ProviderName::None => CloudProvider::None(NoneSpec {}),
    };

    Ok(provider)
}

fn provider_name_from_canonical(provider: &CloudProvider) -> Result<ProviderName> {
    let name = match provider {
        CloudProvider::Aws(_) => ProviderName::Aws,
        CloudProvider::Azure(_) => ProviderName::Azure,
        CloudProvider::DigitalOcean(_) => ProviderName::DigitalOcean,
        CloudProvider::Gce(_) => ProviderName::Gce,
        CloudProvider::Hetzner(_) => ProviderName::Hetzner,
        CloudProvider::OpenStack(_) => ProviderName::OpenStack,
        CloudProvider::EquinixMetal(_) => ProviderName::Packet,
        CloudProvider::VSphere(_) => ProviderName::VSphere,
        CloudProvider::None(_) => ProviderName::None,
        CloudProvider::Nutanix(_)
        | CloudProvider::VmwareCloudDirector(_)
        | CloudProvider::Kubevirt(_) => {
            return UnsupportedVariantSnafu {
                field: "cloudProvider",
                variant: provider.kind().to_string(),
                revision: REVISION,
            }
            .fail();
        }
    };

    Ok(name)
}

/// Moves the Hetzner network from the cluster network section into the
/// provider variant. An already populated variant is kept as is.
fn migrate_network_id(provider: &mut CloudProvider, network_id: String) {
    if network_id.is_empty() {
        return;
    }

    let kind = provider.kind();
    match provider {
        CloudProvider::Hetzner(hetzner) if hetzner.network_id.is_empty() => {
            hetzner.network_id = network_id;
        }
        CloudProvider::Hetzner(_) => {}
        _ => tracing::debug!(
            provider = %kind,
            "Dropping clusterNetwork.networkID, it is only used by the Hetzner provider"
        ),
    }
}

fn cni_into_canonical(cni: &CniConfig) -> Result<api::Cni> {
    const FIELD: &str = "clusterNetwork.cni.provider";

    ensure!(
        !cni.provider.is_empty(),
        NoVariantSelectedSnafu {
            field: FIELD,
            choices: choices::<CniProvider>(),
        }
    );

    let provider = cni.provider.parse::<CniProvider>().ok().context(UnknownVariantNameSnafu {
        field: FIELD,
        name: &cni.provider,
        choices: choices::<CniProvider>(),
    })?;

    let cni = match provider {
        CniProvider::Canal => {
            if cni.encrypted {
                tracing::warn!(
                    "Canal does not support encryption, ignoring clusterNetwork.cni.encrypted"
                );
            }
            // The MTU used to be fixed for every provider.
            api::Cni::Canal {
                mtu: Some(defaults::DEFAULT_CANAL_MTU),
            }
        }
        CniProvider::WeaveNet => api::Cni::WeaveNet {
            encrypted: cni.encrypted,
        },
        CniProvider::External => api::Cni::External,
    };

    Ok(cni)
}

/// Canal always reads back with the fixed legacy MTU, any other MTU would be
/// lost on the way through this revision.
fn cni_from_canonical(cni: &api::Cni) -> Result<CniConfig> {
    let versioned = match cni {
        api::Cni::Canal { mtu } => {
            ensure!(
                mtu.is_none_or(|mtu| mtu == defaults::DEFAULT_CANAL_MTU),
                UnrepresentableFieldSnafu {
                    field: "clusterNetwork.cni.canal.mtu",
                    revision: REVISION,
                }
            );

            CniConfig {
                provider: CniProvider::Canal.to_string(),
                encrypted: false,
            }
        }
        api::Cni::WeaveNet { encrypted } => CniConfig {
            provider: CniProvider::WeaveNet.to_string(),
            encrypted: *encrypted,
        },
        api::Cni::External => CniConfig {
            provider: CniProvider::External.to_string(),
            encrypted: false,
        },
        api::Cni::Cilium { .. } => {
            return UnsupportedVariantSnafu {
                field: "clusterNetwork.cni",
                variant: cni.to_string(),
                revision: REVISION,
            }
            .fail();
        }
    };

    Ok(versioned)
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
        taints: host.untaint.then(Vec::new),
        ..Default::default()
    }
}

fn host_from_canonical(host: &api::HostConfig, kubernetes: &str) -> Result<HostConfig> {
    ensure!(
        host.ipv6_addresses.is_empty(),
        UnrepresentableFieldSnafu {
            field: "hosts.ipv6Addresses",
            revision: REVISION,
        }
    );
    ensure!(
        host.labels.is_empty(),
        UnrepresentableFieldSnafu {
            field: "hosts.labels",
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
        untaint: untaint_from_canonical(host, kubernetes)?,
    })
}

/// Projects the taint list of a host onto the `untaint` flag.
///
/// The flag can only express "no taints" and "the default taints". The
/// legacy master taint always counts as default, as does the set defaulting
/// would assign for the given Kubernetes version.
fn untaint_from_canonical(host: &api::HostConfig, kubernetes: &str) -> Result<bool> {
    let Some(taints) = host.taints.as_deref() else {
        return Ok(false);
    };

    if taints.is_empty() {
        return Ok(true);
    }

    let is_default = taints == [no_schedule_taint(MASTER_TAINT_KEY)]
        || taints == defaults::control_plane_taints(kubernetes).as_slice();
    ensure!(
        is_default,
        UnsupportedTaintsSnafu {
            host: if host.hostname.is_empty() {
                host.reachable_address()
            } else {
                host.hostname.as_str()
            },
            revision: REVISION,
        }
    );

    Ok(false)
}

/// Rejects canonical state this revision has no fields for.
fn ensure_compatible(cluster: &api::KubeOneCluster) -> Result<()> {
    let unrepresentable = |field| UnrepresentableFieldSnafu {
        field,
        revision: REVISION,
    };

    ensure!(
        cluster.static_workers.hosts.is_empty(),
        unrepresentable("staticWorkers")
    );
    ensure!(
        cluster.helm_releases.is_empty(),
        unrepresentable("helmReleases")
    );
    ensure!(
        cluster.api_endpoint.alternative_names.is_empty(),
        unrepresentable("apiEndpoint.alternativeNames")
    );
    ensure!(
        cluster.cloud_provider.csi_config.is_empty(),
        unrepresentable("cloudProvider.csiConfig")
    );
    ensure!(
        !cluster.cloud_provider.disable_bundled_csi_drivers,
        unrepresentable("cloudProvider.disableBundledCSIDrivers")
    );

    if let Some(runtime @ api::ContainerRuntime::Containerd) = cluster.container_runtime {
        return UnsupportedVariantSnafu {
            field: "containerRuntime",
            variant: runtime.to_string(),
            revision: REVISION,
        }
        .fail();
    }

    let network = &cluster.cluster_network;
    ensure_representable(
        network.ip_family.as_ref(),
        &IpFamily::IPv4,
        "clusterNetwork.ipFamily",
        REVISION,
    )?;
    ensure!(
        network.pod_subnet_ipv6.is_empty() && network.service_subnet_ipv6.is_empty(),
        unrepresentable("clusterNetwork.podSubnetIPv6")
    );
    ensure_representable(
        network.node_cidr_mask_size_ipv4.as_ref(),
        &defaults::NODE_CIDR_MASK_SIZE_IPV4,
        "clusterNetwork.nodeCIDRMaskSizeIPv4",
        REVISION,
    )?;
    ensure_representable(
        network.node_cidr_mask_size_ipv6.as_ref(),
        &defaults::NODE_CIDR_MASK_SIZE_IPV6,
        "clusterNetwork.nodeCIDRMaskSizeIPv6",
        REVISION,
    )?;
    ensure_representable(
        network.kube_proxy.as_ref(),
        &api::KubeProxyConfig::Iptables,
        "clusterNetwork.kubeProxy",
        REVISION,
    )?;

    let machine_controller_deploy = cluster
        .machine_controller
        .is_none_or(|machine_controller| machine_controller.deploy);
    ensure_representable(
        cluster.operating_system_manager.as_ref(),
        &OperatingSystemManagerConfig {
            deploy: machine_controller_deploy,
        },
        "operatingSystemManager",
        REVISION,
    )?;
    ensure_representable(
        cluster.system_packages.as_ref(),
        &SystemPackages {
            configure_repositories: true,
        },
        "systemPackages",
        REVISION,
    )?;
    ensure_representable(
        cluster.features.node_local_dns.as_ref(),
        &NodeLocalDns { deploy: true },
        "features.nodeLocalDNS",
        REVISION,
    )?;

    let core_dns_is_default = cluster.features.core_dns.is_none_or(
        |CoreDns {
             replicas,
             deploy_pod_disruption_budget,
         }| {
            replicas.is_none_or(|replicas| replicas == defaults::CORE_DNS_REPLICAS)
                && deploy_pod_disruption_budget.is_none_or(|deploy| deploy)
        },
    );
    ensure!(core_dns_is_default, unrepresentable("features.coreDNS"));

    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;
    use crate::{
        api::{CONTROL_PLANE_TAINT_KEY, Taint},
        manifest::{self, Error},
    };

    fn cluster_with_taints(taints: Option<Vec<Taint>>) -> api::KubeOneCluster {
        api::KubeOneCluster {
            versions: api::VersionConfig {
                kubernetes: "1.22.5".to_owned(),
            },
            control_plane: api::ControlPlaneConfig {
                hosts: vec![api::HostConfig {
                    hostname: "cp-0".to_owned(),
                    taints,
                    ..Default::default()
                }],
            },
            ..Default::default()
        }
    }

    #[test]
    fn legacy_manifest() {
        let cluster = manifest::from_yaml(indoc! {"
            apiVersion: kubeone.k8c.io/v1alpha1
            kind: KubeOneCluster
            name: legacy
            versions:
              kubernetes: 1.22.5
            cloudProvider:
              name: hetzner
            clusterNetwork:
              networkID: net-42
              cni:
                provider: weave-net
                encrypted: true
            hosts:
              - publicAddress: 1.1.1.1
                untaint: true
              - publicAddress: 2.2.2.2
        "})
        .expect("manifest must convert");

        assert_eq!(
            cluster.cloud_provider.provider,
            CloudProvider::Hetzner(HetznerSpec {
                network_id: "net-42".to_owned()
            })
        );
        assert_eq!(cluster.control_plane.hosts.len(), 2);
        assert!(cluster.static_workers.hosts.is_empty());
        assert_eq!(cluster.control_plane.hosts[0].taints, Some(Vec::new()));
        assert_eq!(cluster.control_plane.hosts[1].taints, None);
        assert_eq!(
            cluster.container_runtime,
            Some(api::ContainerRuntime::Docker)
        );
        assert_eq!(
            cluster.cluster_network.cni,
            Some(api::Cni::WeaveNet { encrypted: true })
        );
    }

    #[test]
    fn network_id_dropped_for_other_providers() {
        let cluster = manifest::from_yaml(indoc! {"
            apiVersion: kubeone.k8c.io/v1alpha1
            kind: KubeOneCluster
            cloudProvider:
              name: aws
            clusterNetwork:
              networkID: net-42
        "})
        .expect("manifest must convert");

        assert_eq!(cluster.cloud_provider.provider, CloudProvider::Aws(AwsSpec {}));
    }

    #[test]
    fn populated_hetzner_variant_is_kept() {
        let mut provider = CloudProvider::Hetzner(HetznerSpec {
            network_id: "existing".to_owned(),
        });
        migrate_network_id(&mut provider, "legacy".to_owned());

        assert_eq!(
            provider,
            CloudProvider::Hetzner(HetznerSpec {
                network_id: "existing".to_owned()
            })
        );
    }

    #[rstest]
    #[case("packet", CloudProvider::EquinixMetal(EquinixMetalSpec {}))]
    #[case("digitalocean", CloudProvider::DigitalOcean(DigitalOceanSpec {}))]
    #[case("none", CloudProvider::None(NoneSpec {}))]
    fn provider_names(#[case] name: &str, #[case] expected: CloudProvider) {
        let provider = provider_into_canonical(name).expect("provider name must be known");
        assert_eq!(provider, expected);
        assert_eq!(
            provider_name_from_canonical(&provider)
                .expect("provider must be known")
                .to_string(),
            name
        );
    }

    #[rstest]
    #[case("")]
    #[case("nutanix")]
    #[case("AWS")]
    fn invalid_provider_names(#[case] name: &str) {
        let err = provider_into_canonical(name).expect_err("provider name must be rejected");
        assert!(
            matches!(
                err,
                Error::NoVariantSelected { .. } | Error::UnknownVariantName { .. }
            ),
            "{err:?}"
        );
    }

    #[test]
    fn unknown_cni_provider() {
        let err = cni_into_canonical(&CniConfig {
            provider: "flannel".to_owned(),
            encrypted: false,
        })
        .expect_err("flannel is unknown");

        assert!(
            matches!(&err, Error::UnknownVariantName { name, .. } if name == "flannel"),
            "{err:?}"
        );
    }

    #[test]
    fn canal_encryption_is_dropped() {
        let cni = cni_into_canonical(&CniConfig {
            provider: "canal".to_owned(),
            encrypted: true,
        })
        .expect("canal is known");

        assert_eq!(cni, api::Cni::Canal { mtu: Some(1450) });
    }

    #[rstest]
    #[case(None)]
    #[case(Some(1450))]
    fn legacy_canal_mtu_is_representable(#[case] mtu: Option<u32>) {
        let cni = cni_from_canonical(&api::Cni::Canal { mtu }).expect("legacy MTU is representable");
        assert_eq!(cni.provider, "canal");
    }

    #[test]
    fn provider_canal_mtu_is_unrepresentable() {
        let mut cluster = cluster_with_taints(None);
        cluster.cloud_provider.provider = CloudProvider::Aws(AwsSpec {});
        cluster.cluster_network.cni = Some(api::Cni::Canal { mtu: Some(8951) });

        let err = KubeOneCluster::from_canonical(&cluster)
            .expect_err("the MTU would read back as 1450");
        assert!(
            matches!(err, Error::UnrepresentableField { field: "clusterNetwork.cni.canal.mtu", .. }),
            "{err:?}"
        );
    }

    #[test]
    fn no_taints_project_to_untaint() {
        let manifest = KubeOneCluster::from_canonical(&cluster_with_taints(Some(Vec::new())))
            .expect("empty taints are representable");
        assert!(manifest.hosts[0].untaint);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(vec![no_schedule_taint(MASTER_TAINT_KEY)]))]
    fn default_taints_project_to_tainted(#[case] taints: Option<Vec<Taint>>) {
        let manifest = KubeOneCluster::from_canonical(&cluster_with_taints(taints))
            .expect("default taints are representable");
        assert!(!manifest.hosts[0].untaint);
    }

    #[test]
    fn version_default_taints_project_to_tainted() {
        let mut cluster = cluster_with_taints(Some(vec![no_schedule_taint(CONTROL_PLANE_TAINT_KEY)]));
        cluster.versions.kubernetes = "1.29.0".to_owned();

        let manifest =
            KubeOneCluster::from_canonical(&cluster).expect("default taints are representable");
        assert!(!manifest.hosts[0].untaint);
    }

    #[rstest]
    #[case(vec![no_schedule_taint("dedicated")])]
    #[case(vec![no_schedule_taint(MASTER_TAINT_KEY), no_schedule_taint("dedicated")])]
    fn custom_taints_are_unrepresentable(#[case] taints: Vec<Taint>) {
        let err = KubeOneCluster::from_canonical(&cluster_with_taints(Some(taints)))
            .expect_err("custom taints are not representable");

        assert!(
            matches!(&err, Error::UnsupportedTaints { host, .. } if host == "cp-0"),
            "{err:?}"
        );
    }

    #[test]
    fn static_workers_are_unrepresentable() {
        let mut cluster = cluster_with_taints(None);
        cluster.static_workers.hosts.push(api::HostConfig::default());

        let err = KubeOneCluster::from_canonical(&cluster).expect_err("static workers are unknown");
        assert!(
            matches!(err, Error::UnrepresentableField { field: "staticWorkers", .. }),
            "{err:?}"
        );
    }

    #[test]
    fn custom_core_dns_is_unrepresentable() {
        let mut cluster = cluster_with_taints(None);
        cluster.features.core_dns = Some(CoreDns {
            replicas: Some(5),
            deploy_pod_disruption_budget: None,
        });

        let err = KubeOneCluster::from_canonical(&cluster).expect_err("replicas are unknown");
        assert!(
            matches!(err, Error::UnrepresentableField { field: "features.coreDNS", .. }),
            "{err:?}"
        );
    }

    #[test]
    fn round_trip() {
        let manifest = KubeOneCluster {
            api_version: REVISION.api_version(),
            kind: KIND.to_owned(),
            name: "legacy".to_owned(),
            hosts: vec![HostConfig {
                public_address: "1.1.1.1".to_owned(),
                untaint: true,
                ..Default::default()
            }],
            cloud_provider: CloudProviderSpec {
                name: "hetzner".to_owned(),
                ..Default::default()
            },
            cluster_network: ClusterNetworkConfig {
                network_id: "net-42".to_owned(),
                cni: Some(CniConfig {
                    provider: "canal".to_owned(),
                    encrypted: false,
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let cluster = manifest.clone().into_canonical().expect("manifest must convert");
        assert_eq!(
            KubeOneCluster::from_canonical(&cluster).expect("cluster must convert"),
            manifest
        );
    }
}
