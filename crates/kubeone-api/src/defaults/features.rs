use crate::{
    api::{
        KubeOneCluster, MachineControllerConfig, MetricsServer, NodeLocalDns,
        OperatingSystemManagerConfig, SystemPackages,
    },
    defaults::set_if_empty,
};

pub const CORE_DNS_REPLICAS: u32 = 2;
pub const DEFAULT_ADDONS_PATH: &str = "./addons";
pub const DEFAULT_HELM_TIMEOUT: &str = "5m";

const AUDIT_POLICY_FILE_PATH: &str = "/etc/kubernetes/audit/policy.yaml";
const AUDIT_LOG_PATH: &str = "/var/log/kubernetes/audit.log";
const AUDIT_LOG_MAX_AGE: u32 = 30;
const AUDIT_LOG_MAX_BACKUP: u32 = 3;
const AUDIT_LOG_MAX_SIZE: u32 = 100;

const OIDC_USERNAME_CLAIM: &str = "sub";
const OIDC_GROUPS_CLAIM: &str = "groups";
const OIDC_PREFIX: &str = "oidc:";
const OIDC_SIGNING_ALGS: &str = "RS256";

/// The operating-system-manager follows the machine-controller unless it is
/// configured explicitly, it is useless without it.
pub(super) fn default_machine_controller(cluster: &mut KubeOneCluster) {
    let deploy = cluster
        .machine_controller
        .get_or_insert(MachineControllerConfig { deploy: true })
        .deploy;

    cluster
        .operating_system_manager
        .get_or_insert(OperatingSystemManagerConfig { deploy });
}

pub(super) fn default_addons(cluster: &mut KubeOneCluster) {
    if let Some(addons) = &mut cluster.addons {
        if addons.enable {
            set_if_empty(&mut addons.path, DEFAULT_ADDONS_PATH);
        }
    }

    for release in &mut cluster.helm_releases {
        set_if_empty(&mut release.release_name, &release.chart);
        set_if_empty(&mut release.timeout, DEFAULT_HELM_TIMEOUT);
        set_if_empty(&mut release.namespace, &release.release_name);
    }
}

pub(super) fn default_features(cluster: &mut KubeOneCluster) {
    cluster.system_packages.get_or_insert(SystemPackages {
        configure_repositories: true,
    });

    let features = &mut cluster.features;
    features
        .metrics_server
        .get_or_insert(MetricsServer { enable: true });
    features
        .node_local_dns
        .get_or_insert(NodeLocalDns { deploy: true });

    let core_dns = features.core_dns.get_or_insert_default();
    core_dns.replicas.get_or_insert(CORE_DNS_REPLICAS);
    core_dns.deploy_pod_disruption_budget.get_or_insert(true);

    if let Some(audit_log) = features
        .static_audit_log
        .as_mut()
        .filter(|audit_log| audit_log.enable)
    {
        let config = &mut audit_log.config;
        set_if_empty(&mut config.policy_file_path, AUDIT_POLICY_FILE_PATH);
        set_if_empty(&mut config.log_path, AUDIT_LOG_PATH);
        config.log_max_age.get_or_insert(AUDIT_LOG_MAX_AGE);
        config.log_max_backup.get_or_insert(AUDIT_LOG_MAX_BACKUP);
        config.log_max_size.get_or_insert(AUDIT_LOG_MAX_SIZE);
    }

    if let Some(oidc) = features
        .openid_connect
        .as_mut()
        .filter(|oidc| oidc.enable)
    {
        let config = &mut oidc.config;
        set_if_empty(&mut config.username_claim, OIDC_USERNAME_CLAIM);
        set_if_empty(&mut config.username_prefix, OIDC_PREFIX);
        set_if_empty(&mut config.groups_claim, OIDC_GROUPS_CLAIM);
        set_if_empty(&mut config.groups_prefix, OIDC_PREFIX);
        set_if_empty(&mut config.signing_algs, OIDC_SIGNING_ALGS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Addons, CoreDns, HelmRelease, OpenIdConnect, StaticAuditLog};

    #[test]
    fn operating_system_manager_follows_machine_controller() {
        let mut cluster = KubeOneCluster {
            machine_controller: Some(MachineControllerConfig { deploy: false }),
            ..Default::default()
        };
        default_machine_controller(&mut cluster);
        assert_eq!(
            cluster.operating_system_manager,
            Some(OperatingSystemManagerConfig { deploy: false })
        );

        let mut cluster = KubeOneCluster::default();
        default_machine_controller(&mut cluster);
        assert_eq!(
            cluster.machine_controller,
            Some(MachineControllerConfig { deploy: true })
        );
        assert_eq!(
            cluster.operating_system_manager,
            Some(OperatingSystemManagerConfig { deploy: true })
        );
    }

    #[test]
    fn addons_and_helm_releases() {
        let mut cluster = KubeOneCluster {
            addons: Some(Addons {
                enable: true,
                ..Default::default()
            }),
            helm_releases: vec![
                HelmRelease {
                    chart: "cilium".to_owned(),
                    ..Default::default()
                },
                HelmRelease {
                    chart: "cert-manager".to_owned(),
                    release_name: "certs".to_owned(),
                    namespace: "cert-manager".to_owned(),
                    timeout: "10m".to_owned(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        default_addons(&mut cluster);

        assert_eq!(cluster.addons.map(|addons| addons.path).as_deref(), Some("./addons"));

        let (cilium, certs) = (&cluster.helm_releases[0], &cluster.helm_releases[1]);
        assert_eq!(
            (cilium.release_name.as_str(), cilium.namespace.as_str(), cilium.timeout.as_str()),
            ("cilium", "cilium", "5m")
        );
        assert_eq!(
            (certs.release_name.as_str(), certs.namespace.as_str(), certs.timeout.as_str()),
            ("certs", "cert-manager", "10m")
        );
    }

    #[test]
    fn disabled_addons_keep_their_path() {
        let mut cluster = KubeOneCluster {
            addons: Some(Addons::default()),
            ..Default::default()
        };
        default_addons(&mut cluster);

        assert_eq!(cluster.addons.map(|addons| addons.path).as_deref(), Some(""));
    }

    #[test]
    fn features() {
        let mut cluster = KubeOneCluster::default();
        cluster.features.core_dns = Some(CoreDns {
            replicas: Some(3),
            deploy_pod_disruption_budget: None,
        });
        cluster.features.static_audit_log = Some(StaticAuditLog {
            enable: true,
            ..Default::default()
        });
        cluster.features.openid_connect = Some(OpenIdConnect::default());
        default_features(&mut cluster);

        let features = &cluster.features;
        assert_eq!(
            features.core_dns,
            Some(CoreDns {
                replicas: Some(3),
                deploy_pod_disruption_budget: Some(true),
            })
        );
        assert_eq!(features.metrics_server, Some(MetricsServer { enable: true }));
        assert_eq!(features.node_local_dns, Some(NodeLocalDns { deploy: true }));
        assert_eq!(
            cluster.system_packages,
            Some(SystemPackages {
                configure_repositories: true
            })
        );

        let audit_log = features
            .static_audit_log
            .as_ref()
            .map(|audit_log| &audit_log.config)
            .expect("audit log must be set");
        assert_eq!(audit_log.policy_file_path, "/etc/kubernetes/audit/policy.yaml");
        assert_eq!(audit_log.log_path, "/var/log/kubernetes/audit.log");
        assert_eq!(
            (audit_log.log_max_age, audit_log.log_max_backup, audit_log.log_max_size),
            (Some(30), Some(3), Some(100))
        );

        // Disabled OIDC stays untouched.
        assert_eq!(features.openid_connect, Some(OpenIdConnect::default()));
    }

    #[test]
    fn openid_connect() {
        let mut cluster = KubeOneCluster::default();
        cluster.features.openid_connect = Some(OpenIdConnect {
            enable: true,
            ..Default::default()
        });
        default_features(&mut cluster);

        let config = cluster
            .features
            .openid_connect
            .map(|oidc| oidc.config)
            .expect("OIDC must be set");
        assert_eq!(config.username_claim, "sub");
        assert_eq!(config.username_prefix, "oidc:");
        assert_eq!(config.groups_claim, "groups");
        assert_eq!(config.groups_prefix, "oidc:");
        assert_eq!(config.signing_algs, "RS256");
    }
}
