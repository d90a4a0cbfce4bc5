//! Core types shared by the planner, discovery and orchestration layers

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default host every node binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Position of a node within the cluster, `0..node_count`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(pub usize);

impl NodeIndex {
    /// Get the raw index value
    pub fn raw(&self) -> usize {
        self.0
    }

    /// Listening port of this node given the cluster base port
    pub fn port(&self, base_port: u16) -> u16 {
        // ClusterConfig guarantees base_port + node_count - 1 fits in u16
        base_port + self.0 as u16
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Network address of one node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
        }
    }

    /// `host:port` form suitable for `TcpStream::connect`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A node's self-assigned cluster identifier, keyed by its port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub port: u16,
    pub opaque_id: String,
}

/// Port to opaque id, rebuilt on every discovery pass
pub type NodeIdMap = BTreeMap<u16, String>;

/// Role of a node index in the planned topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Role {
    Master,
    Replica { of: NodeIndex, slot: usize },
}

/// One (replica, master) pair of the topology assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaAssignment {
    pub replica: NodeIndex,
    pub master: NodeIndex,
    /// Replica generation, `0..replica_count`
    pub slot: usize,
}

impl fmt::Display for ReplicaAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "replica {} -> master {} (slot {})",
            self.replica, self.master, self.slot
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_index_port() {
        assert_eq!(NodeIndex(0).port(30000), 30000);
        assert_eq!(NodeIndex(5).port(30000), 30005);
    }

    #[test]
    fn test_endpoint_address() {
        let endpoint = Endpoint::new(DEFAULT_HOST, 30001);
        assert_eq!(endpoint.address(), "127.0.0.1:30001");
        assert_eq!(endpoint.to_string(), "127.0.0.1:30001");
    }
}
