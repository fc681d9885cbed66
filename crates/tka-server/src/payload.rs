//! The concrete payload carried by this deployment's gossip store.
//!
//! The engine itself (`tka_gossip`) never looks inside a payload; this is
//! just the domain data TKA rides on top of it.

use std::fmt;

use serde::{Deserialize, Serialize};
use tka_gossip::Payload;

/// Everything a node advertises about itself to the rest of the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterNodeInfo {
    /// The node's Tailscale overlay IP, used by peers to reach its API.
    pub tailscale_ip: String,
    /// Kubernetes namespace this node mints ServiceAccounts into.
    pub k8s_namespace: String,
    /// A free-form role label shown in the memberlist and dashboard.
    pub advertised_role: String,
    /// A coarse capacity signal (e.g. free ServiceAccount quota); bumped
    /// whenever `/api/access` mints a grant, as a light illustration of
    /// collaborator -> core data flow.
    pub capacity_hint: u32,
}

impl fmt::Display for ClusterNodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, ns={}, capacity={})",
            self.tailscale_ip, self.advertised_role, self.k8s_namespace, self.capacity_hint
        )
    }
}

impl Payload for ClusterNodeInfo {}
