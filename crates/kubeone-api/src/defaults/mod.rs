//! Defaulting of the canonical [`KubeOneCluster`].
//!
//! Defaulting is a fixed, ordered list of [stages](DEFAULTING_STAGES). Every
//! stage only fills fields which are still unset, so applying the whole list
//! again is a no-op. Later stages may depend on values filled in by earlier
//! ones, e.g. the Canal MTU depends on the cloud provider and the proxy
//! exclusions depend on the defaulted subnets.
use tracing::instrument;

use crate::api::KubeOneCluster;

mod cloud_provider;
mod features;
mod hosts;
mod network;

pub use features::{CORE_DNS_REPLICAS, DEFAULT_ADDONS_PATH, DEFAULT_HELM_TIMEOUT};
pub use hosts::{
    DEFAULT_SSH_AGENT_SOCKET, DEFAULT_SSH_PORT, DEFAULT_SSH_USERNAME, assign_host_ids,
    control_plane_taints, elect_leader,
};
pub use network::{
    DEFAULT_API_SERVER_PORT, DEFAULT_CANAL_MTU, NODE_CIDR_MASK_SIZE_IPV4,
    NODE_CIDR_MASK_SIZE_IPV6, canal_mtu,
};

/// A single, named defaulting step.
#[derive(Clone, Copy, Debug)]
pub struct DefaultingStage {
    pub name: &'static str,
    pub apply: fn(&mut KubeOneCluster),
}

/// All defaulting stages, in the order they are applied.
pub const DEFAULTING_STAGES: &[DefaultingStage] = &[
    DefaultingStage {
        name: "hosts",
        apply: hosts::default_hosts,
    },
    DefaultingStage {
        name: "api-endpoint",
        apply: network::default_api_endpoint,
    },
    DefaultingStage {
        name: "kubernetes-version",
        apply: default_kubernetes_version,
    },
    DefaultingStage {
        name: "container-runtime",
        apply: default_container_runtime,
    },
    DefaultingStage {
        name: "cluster-network",
        apply: network::default_cluster_network,
    },
    DefaultingStage {
        name: "proxy",
        apply: network::default_proxy,
    },
    DefaultingStage {
        name: "machine-controller",
        apply: features::default_machine_controller,
    },
    DefaultingStage {
        name: "addons",
        apply: features::default_addons,
    },
    DefaultingStage {
        name: "features",
        apply: features::default_features,
    },
    DefaultingStage {
        name: "cloud-provider",
        apply: cloud_provider::default_cloud_provider,
    },
];

/// Applies all [`DEFAULTING_STAGES`] in order. Never fails and is idempotent.
#[instrument(skip(cluster), fields(cluster.name = %cluster.name))]
pub fn apply_defaults(cluster: &mut KubeOneCluster) {
    for stage in DEFAULTING_STAGES {
        tracing::debug!(stage = stage.name, "Applying defaulting stage");
        (stage.apply)(cluster);
    }
}

fn default_kubernetes_version(cluster: &mut KubeOneCluster) {
    let kubernetes = &mut cluster.versions.kubernetes;
    let trimmed = kubernetes.trim_start_matches('v');
    if trimmed.len() != kubernetes.len() {
        *kubernetes = trimmed.to_owned();
    }
}

fn default_container_runtime(cluster: &mut KubeOneCluster) {
    cluster
        .container_runtime
        .get_or_insert(crate::api::ContainerRuntime::Containerd);
}

/// Sets `field` to `value` if it is still empty.
fn set_if_empty(field: &mut String, value: &str) {
    if field.is_empty() {
        value.clone_into(field);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::api::{
        CloudProvider, CloudProviderSpec, ContainerRuntime, ControlPlaneConfig, GceSpec,
        HelmRelease, HostConfig, OpenIdConnect, ProxyConfig, StaticAuditLog, StaticWorkersConfig,
        VersionConfig,
    };

    fn host(public_address: &str) -> HostConfig {
        HostConfig {
            public_address: public_address.to_owned(),
            ..Default::default()
        }
    }

    fn cluster(control_plane: usize, static_workers: usize) -> KubeOneCluster {
        KubeOneCluster {
            name: "demo".to_owned(),
            versions: VersionConfig {
                kubernetes: "v1.29.3".to_owned(),
            },
            control_plane: ControlPlaneConfig {
                hosts: (0..control_plane)
                    .map(|index| host(&format!("10.0.0.{index}")))
                    .collect(),
            },
            static_workers: StaticWorkersConfig {
                hosts: (0..static_workers)
                    .map(|index| host(&format!("10.0.1.{index}")))
                    .collect(),
            },
            cloud_provider: CloudProviderSpec {
                provider: CloudProvider::Gce(GceSpec {}),
                ..Default::default()
            },
            proxy: ProxyConfig {
                https: "http://proxy:3128".to_owned(),
                no_proxy: "example.com".to_owned(),
                ..Default::default()
            },
            helm_releases: vec![HelmRelease {
                chart: "cert-manager".to_owned(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn stage_order() {
        let names: Vec<_> = DEFAULTING_STAGES.iter().map(|stage| stage.name).collect();
        assert_eq!(
            names,
            [
                "hosts",
                "api-endpoint",
                "kubernetes-version",
                "container-runtime",
                "cluster-network",
                "proxy",
                "machine-controller",
                "addons",
                "features",
                "cloud-provider",
            ]
        );
    }

    #[rstest]
    #[case(cluster(0, 0))]
    #[case(cluster(1, 0))]
    #[case(cluster(3, 2))]
    #[case(KubeOneCluster {
        features: crate::api::Features {
            static_audit_log: Some(StaticAuditLog { enable: true, ..Default::default() }),
            openid_connect: Some(OpenIdConnect { enable: true, ..Default::default() }),
            ..Default::default()
        },
        ..cluster(2, 1)
    })]
    #[case(KubeOneCluster::default())]
    #[case(KubeOneCluster {
        versions: VersionConfig { kubernetes: "vv1.29.0".to_owned() },
        ..cluster(1, 0)
    })]
    fn idempotent(#[case] mut cluster: KubeOneCluster) {
        apply_defaults(&mut cluster);
        let once = cluster.clone();

        apply_defaults(&mut cluster);
        assert_eq!(cluster, once);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 0)]
    #[case(3, 0)]
    #[case(3, 4)]
    fn contiguous_host_ids(#[case] control_plane: usize, #[case] static_workers: usize) {
        let mut cluster = cluster(control_plane, static_workers);
        apply_defaults(&mut cluster);

        let control_plane_ids: Vec<_> = cluster.control_plane.hosts.iter().map(|h| h.id).collect();
        let worker_ids: Vec<_> = cluster.static_workers.hosts.iter().map(|h| h.id).collect();

        assert_eq!(control_plane_ids, (0..control_plane).collect::<Vec<_>>());
        assert_eq!(
            worker_ids,
            (control_plane..control_plane + static_workers).collect::<Vec<_>>()
        );
    }

    #[rstest]
    #[case(None)]
    #[case(Some(2))]
    fn exactly_one_leader(#[case] marked: Option<usize>) {
        let mut cluster = cluster(3, 1);
        if let Some(index) = marked {
            cluster.control_plane.hosts[index].is_leader = true;
        }

        apply_defaults(&mut cluster);

        let leaders: Vec<_> = cluster
            .control_plane
            .hosts
            .iter()
            .filter(|host| host.is_leader)
            .map(|host| host.id)
            .collect();
        assert_eq!(leaders, [marked.unwrap_or(0)]);
    }

    #[test]
    fn version_and_runtime() {
        let mut cluster = cluster(1, 0);
        apply_defaults(&mut cluster);

        assert_eq!(cluster.versions.kubernetes, "1.29.3");
        assert_eq!(cluster.container_runtime, Some(ContainerRuntime::Containerd));

        cluster.versions.kubernetes = "vv1.29.0".to_owned();
        default_kubernetes_version(&mut cluster);
        assert_eq!(cluster.versions.kubernetes, "1.29.0");

        let mut cluster = KubeOneCluster {
            container_runtime: Some(ContainerRuntime::Docker),
            ..Default::default()
        };
        default_container_runtime(&mut cluster);
        assert_eq!(cluster.container_runtime, Some(ContainerRuntime::Docker));
    }
}
