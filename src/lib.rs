//! # cluster-bootstrap
//!
//! Launches a set of cluster-enabled key-value server processes on
//! consecutive ports, joins them into one gossip cluster, assigns every
//! replica to its master and tears the whole thing down again.
//!
//! The topology math and the listing parser are pure and live in
//! [`topology`]. Process control and remote commands sit behind the
//! [`lifecycle::ProcessSpawner`] and [`client::AdminClient`] traits so the
//! [`orchestrator::Orchestrator`] can be driven against fakes.

#![warn(clippy::all)]

pub mod error;
pub mod types;
pub mod config;
pub mod topology;
pub mod client;
pub mod discovery;
pub mod lifecycle;
pub mod orchestrator;
/// Command-line interface and argument parsing
pub mod cli;
/// Command execution and reporting
pub mod commands;

pub use client::{AdminClient, RespClient};
pub use config::{CleanupMode, ClusterConfig, ClusterSettings, ReadinessMode, ReadinessPolicy};
pub use discovery::ClusterDiscovery;
pub use error::{ClusterError, ClusterResult, DiscoveryError, Stage, StageFailure, TeardownWarning};
pub use lifecycle::{cleanup_artifacts, NodeLifecycle, ProcessOutput, ProcessSpawner, TokioSpawner};
pub use orchestrator::{BootstrapCommand, Orchestrator, RunFailure, RunReport};
pub use types::{Endpoint, NodeIdMap, NodeIdentity, NodeIndex, ReplicaAssignment, Role};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
