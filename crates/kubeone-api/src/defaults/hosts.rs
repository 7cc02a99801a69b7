use crate::{
    api::{
        CONTROL_PLANE_TAINT_KEY, HostConfig, KubeOneCluster, MASTER_TAINT_KEY, Taint,
        no_schedule_taint,
    },
    defaults::set_if_empty,
    version::KubernetesVersion,
};

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SSH_USERNAME: &str = "root";

/// Tells the provisioner to use the agent socket from the `SSH_AUTH_SOCK`
/// environment variable.
pub const DEFAULT_SSH_AGENT_SOCKET: &str = "env:SSH_AUTH_SOCK";

pub(super) fn default_hosts(cluster: &mut KubeOneCluster) {
    assign_host_ids(cluster);
    elect_leader(&mut cluster.control_plane.hosts);

    let control_plane_taints = control_plane_taints(&cluster.versions.kubernetes);
    for host in &mut cluster.control_plane.hosts {
        default_host_access(host);
        host.taints
            .get_or_insert_with(|| control_plane_taints.clone());
    }

    for host in &mut cluster.static_workers.hosts {
        default_host_access(host);
        host.taints.get_or_insert_with(Vec::new);
    }
}

/// Numbers all hosts contiguously, control plane hosts first.
pub fn assign_host_ids(cluster: &mut KubeOneCluster) {
    let hosts = cluster
        .control_plane
        .hosts
        .iter_mut()
        .chain(cluster.static_workers.hosts.iter_mut());

    for (id, host) in hosts.enumerate() {
        host.id = id;
    }
}

/// Marks the first control plane host as leader, unless a leader is already
/// marked.
pub fn elect_leader(hosts: &mut [HostConfig]) {
    if hosts.iter().any(|host| host.is_leader) {
        return;
    }

    if let Some(leader) = hosts.first_mut() {
        tracing::info!(
            leader.id = leader.id,
            leader.address = leader.reachable_address(),
            "No leader marked, electing the first control plane host"
        );
        leader.is_leader = true;
    }
}

/// Returns the taints control plane hosts get by default for the given
/// Kubernetes version.
///
/// Kubernetes 1.24 switched from the `master` to the `control-plane` taint and
/// applied both during the transition. A version which cannot be parsed is
/// treated as current.
pub fn control_plane_taints(kubernetes_version: &str) -> Vec<Taint> {
    match kubernetes_version.parse::<KubernetesVersion>() {
        Ok(version) if !version.is_at_least(1, 24) => vec![no_schedule_taint(MASTER_TAINT_KEY)],
        Ok(version) if !version.is_at_least(1, 25) => vec![
            no_schedule_taint(MASTER_TAINT_KEY),
            no_schedule_taint(CONTROL_PLANE_TAINT_KEY),
        ],
        _ => vec![no_schedule_taint(CONTROL_PLANE_TAINT_KEY)],
    }
}

fn default_host_access(host: &mut HostConfig) {
    host.ssh_port.get_or_insert(DEFAULT_SSH_PORT);
    set_if_empty(&mut host.ssh_username, DEFAULT_SSH_USERNAME);

    if host.ssh_private_key_file.is_empty() {
        set_if_empty(&mut host.ssh_agent_socket, DEFAULT_SSH_AGENT_SOCKET);
    }

    if !host.bastion.is_empty() {
        host.bastion_port.get_or_insert(DEFAULT_SSH_PORT);
        if host.bastion_user.is_empty() {
            host.bastion_user.clone_from(&host.ssh_username);
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::api::{ControlPlaneConfig, StaticWorkersConfig, VersionConfig};

    #[rstest]
    #[case("1.23.17", &[MASTER_TAINT_KEY])]
    #[case("v1.24.0", &[MASTER_TAINT_KEY, CONTROL_PLANE_TAINT_KEY])]
    #[case("1.25.2", &[CONTROL_PLANE_TAINT_KEY])]
    #[case("1.30.0", &[CONTROL_PLANE_TAINT_KEY])]
    #[case("", &[CONTROL_PLANE_TAINT_KEY])]
    #[case("latest", &[CONTROL_PLANE_TAINT_KEY])]
    fn taints_per_version(#[case] version: &str, #[case] keys: &[&str]) {
        let taints = control_plane_taints(version);
        let taint_keys: Vec<_> = taints.iter().map(|taint| taint.key.as_str()).collect();

        assert_eq!(taint_keys, keys);
        assert!(taints.iter().all(|taint| taint.effect == "NoSchedule"));
    }

    #[test]
    fn host_access() {
        let mut host = HostConfig {
            bastion: "bastion.example.com".to_owned(),
            ssh_username: "ubuntu".to_owned(),
            ..Default::default()
        };
        default_host_access(&mut host);

        assert_eq!(host.ssh_port, Some(22));
        assert_eq!(host.ssh_agent_socket, "env:SSH_AUTH_SOCK");
        assert_eq!(host.bastion_port, Some(22));
        assert_eq!(host.bastion_user, "ubuntu");

        let mut host = HostConfig {
            ssh_private_key_file: "~/.ssh/id_ed25519".to_owned(),
            ssh_port: Some(2222),
            ..Default::default()
        };
        default_host_access(&mut host);

        assert_eq!(host.ssh_port, Some(2222));
        assert_eq!(host.ssh_username, "root");
        assert!(host.ssh_agent_socket.is_empty());
        assert_eq!(host.bastion_port, None);
        assert!(host.bastion_user.is_empty());
    }

    #[test]
    fn explicit_taints_are_kept() {
        let mut cluster = KubeOneCluster {
            versions: VersionConfig {
                kubernetes: "1.29.0".to_owned(),
            },
            control_plane: ControlPlaneConfig {
                hosts: vec![
                    HostConfig::default(),
                    HostConfig {
                        taints: Some(Vec::new()),
                        ..Default::default()
                    },
                ],
            },
            static_workers: StaticWorkersConfig {
                hosts: vec![HostConfig::default()],
            },
            ..Default::default()
        };
        default_hosts(&mut cluster);

        assert_eq!(
            cluster.control_plane.hosts[0].taints,
            Some(vec![no_schedule_taint(CONTROL_PLANE_TAINT_KEY)])
        );
        assert_eq!(cluster.control_plane.hosts[1].taints, Some(Vec::new()));
        assert_eq!(cluster.static_workers.hosts[0].taints, Some(Vec::new()));
    }

    #[test]
    fn marked_leader_is_kept() {
        let mut hosts = vec![
            HostConfig::default(),
            HostConfig {
                is_leader: true,
                ..Default::default()
            },
        ];
        elect_leader(&mut hosts);

        assert!(!hosts[0].is_leader);
        assert!(hosts[1].is_leader);
    }
}
