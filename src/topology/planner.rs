//! Master/replica role assignment
//!
//! Masters occupy indices `0..m`. Replica generation `g` (0-based slot)
//! occupies `(g + 1) * m .. (g + 2) * m`, each replica paired with the
//! master at the same offset.

use crate::error::{ClusterError, ClusterResult};
use crate::types::{NodeIndex, ReplicaAssignment, Role};

/// Smallest master count a cluster can be created with
pub const MIN_MASTERS: usize = 3;

/// Number of masters for the given node and replica counts
pub fn master_count(node_count: usize, replica_count: usize) -> usize {
    node_count / (replica_count + 1)
}

/// Check that the node count splits evenly into masters with equal replicas
pub fn validate(node_count: usize, replica_count: usize) -> ClusterResult<usize> {
    let group = replica_count + 1;
    if node_count % group != 0 {
        return Err(ClusterError::Config(format!(
            "{} nodes cannot be split into groups of one master and {} replicas",
            node_count, replica_count
        )));
    }

    let masters = master_count(node_count, replica_count);
    if masters < MIN_MASTERS {
        return Err(ClusterError::Config(format!(
            "there should be at least {} master nodes, got {}",
            MIN_MASTERS, masters
        )));
    }

    Ok(masters)
}

/// Every (replica, master) pair, replica-slot-major
pub fn assign_replicas(node_count: usize, replica_count: usize) -> Vec<ReplicaAssignment> {
    let masters = master_count(node_count, replica_count);
    let mut assignment = Vec::with_capacity(masters * replica_count);

    for slot in 0..replica_count {
        for master in 0..masters {
            assignment.push(ReplicaAssignment {
                replica: NodeIndex(master + (slot + 1) * masters),
                master: NodeIndex(master),
                slot,
            });
        }
    }

    assignment
}

/// Role of a single index; `None` when the index is outside the cluster
pub fn role_of(index: NodeIndex, node_count: usize, replica_count: usize) -> Option<Role> {
    if index.0 >= node_count {
        return None;
    }
    let masters = master_count(node_count, replica_count);
    if masters == 0 {
        return None;
    }
    if index.0 < masters {
        return Some(Role::Master);
    }
    Some(Role::Replica {
        of: NodeIndex(index.0 % masters),
        slot: index.0 / masters - 1,
    })
}
