//! Topology planning and cluster listing parsing
//!
//! Pure functions only: no process, network or filesystem access happens
//! here, so everything in this module is deterministic for a given input.

pub mod planner;
pub mod parser;

pub use planner::{assign_replicas, master_count, role_of, validate, MIN_MASTERS};
pub use parser::{parse_cluster_nodes, parse_cluster_nodes_verbose, ParsedListing};
