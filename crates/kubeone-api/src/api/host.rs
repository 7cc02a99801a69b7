use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::Taint;

/// A single control plane or static worker node.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct HostConfig {
    /// Unique across all hosts of a cluster, assigned during defaulting and
    /// never taken from user input.
    pub id: usize,
    pub public_address: String,
    pub private_address: String,
    #[serde(rename = "ipv6Addresses")]
    pub ipv6_addresses: Vec<String>,
    pub hostname: String,
    pub ssh_port: Option<u16>,
    pub ssh_username: String,
    pub ssh_private_key_file: String,
    pub ssh_agent_socket: String,
    pub bastion: String,
    pub bastion_port: Option<u16>,
    pub bastion_user: String,
    pub is_leader: bool,

    /// [`None`] applies the default taints matching the Kubernetes version
    /// during defaulting, an empty list removes all taints.
    pub taints: Option<Vec<Taint>>,
    pub labels: BTreeMap<String, String>,
}

impl HostConfig {
    /// Returns `true` if `address` is either the public or the private address
    /// of this host.
    pub fn has_address(&self, address: &str) -> bool {
        !address.is_empty() && (self.public_address == address || self.private_address == address)
    }

    /// The address used to reach the host from outside of the cluster. Falls
    /// back to the private address.
    pub fn reachable_address(&self) -> &str {
        if self.public_address.is_empty() {
            &self.private_address
        } else {
            &self.public_address
        }
    }
}
