//! Merges facts discovered while provisioning the infrastructure into the
//! canonical cluster configuration.
//!
//! The discovery document is the JSON printed by `terraform output -json` (or
//! the same structure as YAML). Every output is wrapped into an object with a
//! `value` key, additional keys like `sensitive` or `type` are ignored, as
//! are outputs this module does not know about.
//!
//! The merge never overrides what the user wrote: scalars are only filled in
//! while they are still zero (see [`FillIfZero`]). Host lists are the
//! exception, a non-empty host group in the document replaces the hosts of
//! the manifest as a whole.
use std::collections::BTreeMap;

use serde::Deserialize;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::{debug, info, instrument, warn};

use crate::{
    api::{CloudProvider, DynamicWorkerConfig, HostConfig, KubeOneCluster, ProviderSpec, Taint},
    defaults::{assign_host_ids, elect_leader},
    infra::fill::FillIfZero,
};

pub mod fill;
mod provider_spec;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse the discovery document as JSON"))]
    ParseJson { source: serde_json::Error },

    #[snafu(display("failed to parse the discovery document as YAML"))]
    ParseYaml { source: serde_yaml::Error },

    #[snafu(display(
        "host group {group:?} lists {public} public but {private} private addresses"
    ))]
    MismatchedAddressCount {
        group: String,
        public: usize,
        private: usize,
    },

    #[snafu(display(
        "the leader IP {leader_ip:?} does not match any control plane host of the discovery document"
    ))]
    UnknownLeaderIp { leader_ip: String },

    #[snafu(display("failed to merge the instance parameters of worker pool {pool:?}"))]
    MergeWorkerParameters {
        source: provider_spec::Error,
        pool: String,
    },
}

/// A single Terraform output.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct Output<T> {
    pub value: T,
}

/// The infrastructure discovery document.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct InfraDocument {
    pub kubeone_api: Option<Output<ApiOutput>>,
    pub kubeone_hosts: Option<Output<HostsOutput>>,
    pub kubeone_static_workers: Option<Output<BTreeMap<String, HostsSpec>>>,
    pub kubeone_workers: Option<Output<BTreeMap<String, WorkerPoolOutput>>>,
    pub proxy: Option<Output<ProxyOutput>>,
}

impl InfraDocument {
    pub fn from_json(document: &str) -> Result<Self> {
        serde_json::from_str(document).context(ParseJsonSnafu)
    }

    pub fn from_yaml(document: &str) -> Result<Self> {
        serde_yaml::from_str(document).context(ParseYamlSnafu)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ApiOutput {
    pub endpoint: String,
    pub apiserver_alternative_names: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HostsOutput {
    pub control_plane: HostsSpec,
}

/// A group of hosts sharing their access settings. The address lists are
/// positional, the n-th entries of all lists describe the n-th host.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HostsSpec {
    pub public_address: Vec<String>,
    pub private_address: Vec<String>,
    pub ipv6_addresses: Vec<Vec<String>>,
    pub hostnames: Vec<String>,
    pub leader_ip: String,
    pub ssh_user: String,
    pub ssh_port: Option<u16>,
    pub ssh_private_key_file: String,
    pub ssh_agent_socket: String,
    pub bastion: String,
    pub bastion_port: Option<u16>,
    pub bastion_user: String,
    pub cloud_provider: String,
    pub network_id: String,
    pub labels: BTreeMap<String, String>,
    pub untaint: bool,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct WorkerPoolOutput {
    pub replicas: Option<u32>,
    pub provider_spec: WorkerProviderSpec,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct WorkerProviderSpec {
    pub cloud_provider_spec: serde_json::Value,
    pub ssh_public_keys: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub taints: Vec<Taint>,
    pub operating_system: String,
    pub operating_system_spec: serde_json::Value,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ProxyOutput {
    pub http: String,
    pub https: String,
    pub no_proxy: String,
}

/// Completes `cluster` with the facts of the discovery `document`.
///
/// Host IDs and the leader are reassigned whenever a host group was replaced.
#[instrument(skip_all, fields(cluster.name = %cluster.name))]
pub fn merge_infrastructure_state(cluster: &mut KubeOneCluster, document: &InfraDocument) -> Result<()> {
    if let Some(Output { value: api }) = &document.kubeone_api {
        cluster.api_endpoint.host.fill_if_zero(&api.endpoint);
        cluster
            .api_endpoint
            .alternative_names
            .fill_if_zero(&api.apiserver_alternative_names);
    }

    let mut hosts_replaced = false;
    if let Some(Output { value: hosts }) = &document.kubeone_hosts {
        hosts_replaced |= merge_control_plane(cluster, &hosts.control_plane)?;
    }

    if let Some(Output { value: groups }) = &document.kubeone_static_workers {
        hosts_replaced |= merge_static_workers(cluster, groups)?;
    }

    if hosts_replaced {
        assign_host_ids(cluster);
        elect_leader(&mut cluster.control_plane.hosts);
    }

    if let Some(Output { value: pools }) = &document.kubeone_workers {
        merge_dynamic_workers(cluster, pools)?;
    }

    if let Some(Output { value: proxy }) = &document.proxy {
        cluster.proxy.http.fill_if_zero(&proxy.http);
        cluster.proxy.https.fill_if_zero(&proxy.https);
        cluster.proxy.no_proxy.fill_if_zero(&proxy.no_proxy);
    }

    Ok(())
}

fn merge_control_plane(cluster: &mut KubeOneCluster, spec: &HostsSpec) -> Result<bool> {
    merge_network_id(&mut cluster.cloud_provider.provider, spec);
    if !spec.cloud_provider.is_empty()
        && spec.cloud_provider != cluster.cloud_provider.provider.kind().to_string()
    {
        warn!(
            document = %spec.cloud_provider,
            manifest = %cluster.cloud_provider.provider.kind(),
            "The discovery document was generated for another cloud provider"
        );
    }

    let mut hosts = hosts_from_spec("control_plane", spec)?;
    if hosts.is_empty() {
        return Ok(false);
    }

    if !spec.leader_ip.is_empty() {
        let leader = hosts
            .iter_mut()
            .find(|host| host.has_address(&spec.leader_ip))
            .context(UnknownLeaderIpSnafu {
                leader_ip: &spec.leader_ip,
            })?;
        leader.is_leader = true;
    }

    info!(
        hosts = hosts.len(),
        "Replacing the control plane hosts with the discovered ones"
    );
    cluster.control_plane.hosts = hosts;
    Ok(true)
}

fn merge_static_workers(
    cluster: &mut KubeOneCluster,
    groups: &BTreeMap<String, HostsSpec>,
) -> Result<bool> {
    let mut hosts = Vec::new();
    for (group, spec) in groups {
        hosts.extend(hosts_from_spec(group, spec)?);
    }

    if hosts.is_empty() {
        return Ok(false);
    }

    info!(
        hosts = hosts.len(),
        groups = groups.len(),
        "Replacing the static worker hosts with the discovered ones"
    );
    cluster.static_workers.hosts = hosts;
    Ok(true)
}

/// The network ID belongs to Hetzner and is dropped for every other provider.
fn merge_network_id(provider: &mut CloudProvider, spec: &HostsSpec) {
    if spec.network_id.is_empty() {
        return;
    }

    match provider {
        CloudProvider::Hetzner(hetzner) => hetzner.network_id.fill_if_zero(&spec.network_id),
        _ => debug!(
            provider = %provider.kind(),
            "Ignoring the discovered network ID, it is only used by Hetzner"
        ),
    }
}

fn hosts_from_spec(group: &str, spec: &HostsSpec) -> Result<Vec<HostConfig>> {
    let (public, private) = (spec.public_address.len(), spec.private_address.len());
    ensure!(
        public == 0 || private == 0 || public == private,
        MismatchedAddressCountSnafu {
            group,
            public,
            private,
        }
    );

    let at = |list: &[String], index: usize| list.get(index).cloned().unwrap_or_default();
    let hosts = (0..public.max(private))
        .map(|index| HostConfig {
            public_address: at(&spec.public_address, index),
            private_address: at(&spec.private_address, index),
            ipv6_addresses: spec.ipv6_addresses.get(index).cloned().unwrap_or_default(),
            hostname: at(&spec.hostnames, index),
            ssh_port: spec.ssh_port,
            ssh_username: spec.ssh_user.clone(),
            ssh_private_key_file: spec.ssh_private_key_file.clone(),
            ssh_agent_socket: spec.ssh_agent_socket.clone(),
            bastion: spec.bastion.clone(),
            bastion_port: spec.bastion_port,
            bastion_user: spec.bastion_user.clone(),
            taints: spec.untaint.then(Vec::new),
            labels: spec.labels.clone(),
            ..Default::default()
        })
        .collect();

    Ok(hosts)
}

fn merge_dynamic_workers(
    cluster: &mut KubeOneCluster,
    pools: &BTreeMap<String, WorkerPoolOutput>,
) -> Result<()> {
    for (name, discovered) in pools {
        match cluster
            .dynamic_workers
            .iter_mut()
            .find(|pool| pool.name == *name)
        {
            Some(pool) => {
                debug!(pool = %name, "Merging discovered worker pool");
                merge_worker_pool(&cluster.cloud_provider.provider, pool, discovered)?;
            }
            None => {
                info!(pool = %name, "Adding worker pool only present in the discovery document");
                cluster.dynamic_workers.push(worker_pool(name, discovered));
            }
        }
    }

    Ok(())
}

fn merge_worker_pool(
    provider: &CloudProvider,
    pool: &mut DynamicWorkerConfig,
    discovered: &WorkerPoolOutput,
) -> Result<()> {
    pool.replicas.fill_if_zero(&discovered.replicas);

    let spec = &mut pool.provider_spec;
    let discovered = &discovered.provider_spec;
    provider_spec::merge_cloud_provider_spec(
        provider,
        &mut spec.cloud_provider_spec,
        &discovered.cloud_provider_spec,
    )
    .context(MergeWorkerParametersSnafu { pool: &pool.name })?;

    spec.ssh_public_keys.fill_if_zero(&discovered.ssh_public_keys);
    spec.labels.fill_if_zero(&discovered.labels);
    spec.annotations.fill_if_zero(&discovered.annotations);
    spec.taints.fill_if_zero(&discovered.taints);
    spec.operating_system.fill_if_zero(&discovered.operating_system);
    spec.operating_system_spec
        .fill_if_zero(&discovered.operating_system_spec);

    Ok(())
}

fn worker_pool(name: &str, discovered: &WorkerPoolOutput) -> DynamicWorkerConfig {
    let spec = &discovered.provider_spec;
    DynamicWorkerConfig {
        name: name.to_owned(),
        replicas: discovered.replicas,
        provider_spec: ProviderSpec {
            cloud_provider_spec: spec.cloud_provider_spec.clone(),
            labels: spec.labels.clone(),
            annotations: spec.annotations.clone(),
            taints: spec.taints.clone(),
            ssh_public_keys: spec.ssh_public_keys.clone(),
            operating_system: spec.operating_system.clone(),
            operating_system_spec: spec.operating_system_spec.clone(),
        },
    }
}
