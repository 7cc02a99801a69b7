use itertools::Itertools;

use crate::{
    api::{CloudProvider, Cni, KubeOneCluster, KubeProxyConfig},
    defaults::set_if_empty,
};

pub const DEFAULT_API_SERVER_PORT: u16 = 6443;

pub const DEFAULT_POD_SUBNET: &str = "10.244.0.0/16";
pub const DEFAULT_SERVICE_SUBNET: &str = "10.96.0.0/12";
pub const DEFAULT_POD_SUBNET_IPV6: &str = "fd01::/48";
pub const DEFAULT_SERVICE_SUBNET_IPV6: &str = "fd02::/120";
pub const DEFAULT_SERVICE_DOMAIN_NAME: &str = "cluster.local";
pub const DEFAULT_NODE_PORT_RANGE: &str = "30000-32767";
pub const NODE_CIDR_MASK_SIZE_IPV4: u8 = 24;
pub const NODE_CIDR_MASK_SIZE_IPV6: u8 = 64;

/// The Canal MTU used on providers without a specific value.
pub const DEFAULT_CANAL_MTU: u32 = 1450;

/// Destinations which must never go through the proxy.
const STATIC_NO_PROXY: [&str; 3] = ["127.0.0.1/8", "localhost", ".svc"];

/// The Canal MTU matching the network of the given provider. The VXLAN
/// overhead of 50 bytes is already subtracted.
pub fn canal_mtu(provider: &CloudProvider) -> u32 {
    match provider {
        CloudProvider::Aws(_) => 8951,
        CloudProvider::Gce(_) => 1410,
        CloudProvider::Hetzner(_) | CloudProvider::OpenStack(_) => 1400,
        _ => DEFAULT_CANAL_MTU,
    }
}

pub(super) fn default_api_endpoint(cluster: &mut KubeOneCluster) {
    let api_endpoint = &mut cluster.api_endpoint;

    if api_endpoint.host.is_empty() {
        if let Some(host) = cluster.control_plane.hosts.first() {
            host.reachable_address().clone_into(&mut api_endpoint.host);
        }
    }

    api_endpoint.port.get_or_insert(DEFAULT_API_SERVER_PORT);
}

pub(super) fn default_cluster_network(cluster: &mut KubeOneCluster) {
    let canal_mtu = canal_mtu(&cluster.cloud_provider.provider);
    let network = &mut cluster.cluster_network;

    let ip_family = *network.ip_family.get_or_insert_default();
    if ip_family.has_ipv4() {
        set_if_empty(&mut network.pod_subnet, DEFAULT_POD_SUBNET);
        set_if_empty(&mut network.service_subnet, DEFAULT_SERVICE_SUBNET);
        network
            .node_cidr_mask_size_ipv4
            .get_or_insert(NODE_CIDR_MASK_SIZE_IPV4);
    }
    if ip_family.has_ipv6() {
        set_if_empty(&mut network.pod_subnet_ipv6, DEFAULT_POD_SUBNET_IPV6);
        set_if_empty(&mut network.service_subnet_ipv6, DEFAULT_SERVICE_SUBNET_IPV6);
        network
            .node_cidr_mask_size_ipv6
            .get_or_insert(NODE_CIDR_MASK_SIZE_IPV6);
    }

    set_if_empty(&mut network.service_domain_name, DEFAULT_SERVICE_DOMAIN_NAME);
    set_if_empty(&mut network.node_port_range, DEFAULT_NODE_PORT_RANGE);

    match network.cni.get_or_insert(Cni::Canal { mtu: None }) {
        Cni::Canal { mtu } => {
            mtu.get_or_insert(canal_mtu);
        }
        Cni::Cilium {
            kube_proxy_replacement,
            ..
        } => {
            kube_proxy_replacement.get_or_insert_default();
        }
        Cni::WeaveNet { .. } | Cni::External => {}
    }

    network.kube_proxy.get_or_insert(KubeProxyConfig::Iptables);
}

/// Seeds the proxy exclusion list with everything that has to be reached
/// directly, followed by the user supplied entries.
pub(super) fn default_proxy(cluster: &mut KubeOneCluster) {
    if cluster.proxy.http.is_empty() && cluster.proxy.https.is_empty() {
        return;
    }

    let network = &cluster.cluster_network;
    let cluster_entries = [
        network.service_domain_name.as_str(),
        network.pod_subnet.as_str(),
        network.pod_subnet_ipv6.as_str(),
        network.service_subnet.as_str(),
        network.service_subnet_ipv6.as_str(),
    ];

    let no_proxy = STATIC_NO_PROXY
        .into_iter()
        .chain(cluster_entries)
        .chain(cluster.proxy.no_proxy.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .unique()
        .join(",");

    cluster.proxy.no_proxy = no_proxy;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::api::{
        AwsSpec, ClusterNetworkConfig, ControlPlaneConfig, HetznerSpec, HostConfig, IpFamily,
        KubeProxyReplacement, NoneSpec, ProxyConfig,
    };

    #[rstest]
    #[case(CloudProvider::Aws(AwsSpec {}), 8951)]
    #[case(CloudProvider::Hetzner(HetznerSpec::default()), 1400)]
    #[case(CloudProvider::None(NoneSpec {}), 1450)]
    fn canal_mtu_per_provider(#[case] provider: CloudProvider, #[case] expected: u32) {
        let mut cluster = KubeOneCluster::default();
        cluster.cloud_provider.provider = provider;
        default_cluster_network(&mut cluster);

        assert_eq!(
            cluster.cluster_network.cni,
            Some(Cni::Canal {
                mtu: Some(expected)
            })
        );
    }

    #[test]
    fn ipv4_network() {
        let mut cluster = KubeOneCluster::default();
        default_cluster_network(&mut cluster);

        let network = &cluster.cluster_network;
        assert_eq!(network.ip_family, Some(IpFamily::IPv4));
        assert_eq!(network.pod_subnet, "10.244.0.0/16");
        assert_eq!(network.service_subnet, "10.96.0.0/12");
        assert!(network.pod_subnet_ipv6.is_empty());
        assert_eq!(network.node_cidr_mask_size_ipv4, Some(24));
        assert_eq!(network.node_cidr_mask_size_ipv6, None);
        assert_eq!(network.service_domain_name, "cluster.local");
        assert_eq!(network.node_port_range, "30000-32767");
        assert_eq!(network.kube_proxy, Some(KubeProxyConfig::Iptables));
    }

    #[test]
    fn dual_stack_network() {
        let mut cluster = KubeOneCluster {
            cluster_network: ClusterNetworkConfig {
                ip_family: Some(IpFamily::IPv6IPv4),
                pod_subnet: "192.168.0.0/16".to_owned(),
                cni: Some(Cni::Cilium {
                    kube_proxy_replacement: None,
                    enable_hubble: true,
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        default_cluster_network(&mut cluster);

        let network = &cluster.cluster_network;
        assert_eq!(network.pod_subnet, "192.168.0.0/16");
        assert_eq!(network.pod_subnet_ipv6, "fd01::/48");
        assert_eq!(network.service_subnet_ipv6, "fd02::/120");
        assert_eq!(network.node_cidr_mask_size_ipv6, Some(64));
        assert_eq!(
            network.cni,
            Some(Cni::Cilium {
                kube_proxy_replacement: Some(KubeProxyReplacement::Disabled),
                enable_hubble: true,
            })
        );
    }

    #[test]
    fn api_endpoint_from_first_control_plane_host() {
        let mut cluster = KubeOneCluster {
            control_plane: ControlPlaneConfig {
                hosts: vec![
                    HostConfig {
                        private_address: "10.0.0.1".to_owned(),
                        ..Default::default()
                    },
                    HostConfig {
                        public_address: "1.1.1.2".to_owned(),
                        ..Default::default()
                    },
                ],
            },
            ..Default::default()
        };
        default_api_endpoint(&mut cluster);

        assert_eq!(cluster.api_endpoint.host, "10.0.0.1");
        assert_eq!(cluster.api_endpoint.port, Some(6443));
    }

    #[test]
    fn no_proxy_without_proxy() {
        let mut cluster = KubeOneCluster {
            proxy: ProxyConfig {
                no_proxy: "example.com".to_owned(),
                ..Default::default()
            },
            ..Default::default()
        };
        default_proxy(&mut cluster);

        assert_eq!(cluster.proxy.no_proxy, "example.com");
    }

    #[test]
    fn no_proxy_seeds() {
        let mut cluster = KubeOneCluster {
            proxy: ProxyConfig {
                http: "http://proxy:3128".to_owned(),
                no_proxy: "example.com, localhost".to_owned(),
                ..Default::default()
            },
            ..Default::default()
        };
        default_cluster_network(&mut cluster);
        default_proxy(&mut cluster);

        let expected =
            "127.0.0.1/8,localhost,.svc,cluster.local,10.244.0.0/16,10.96.0.0/12,example.com";
        assert_eq!(cluster.proxy.no_proxy, expected);

        default_proxy(&mut cluster);
        assert_eq!(cluster.proxy.no_proxy, expected);
    }
}
