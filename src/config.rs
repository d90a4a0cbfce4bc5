//! Bootstrap configuration
//!
//! `ClusterSettings` holds raw, possibly invalid input as it arrives from a
//! TOML file or the command line. `ClusterConfig` is the validated,
//! immutable value every component borrows for the lifetime of a run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, ClusterResult};
use crate::topology::planner;
use crate::types::{Endpoint, NodeIndex, DEFAULT_HOST};

/// Raw configuration values, defaults match a six node, one replica cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    /// Path to the server binary
    pub server: PathBuf,
    pub host: String,
    /// Port of node 0
    pub port: u32,
    /// Gossip failure-detector timeout in milliseconds
    pub timeout: u64,
    pub nodes: usize,
    pub replicas: usize,
    /// Directory the nodes write their artifacts into
    pub work_dir: PathBuf,
    /// Deadline for each launch and each remote call
    pub call_timeout_secs: u64,
    pub readiness: ReadinessMode,
    pub launch_delay_ms: u64,
    pub converge_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_deadline_ms: u64,
    pub keep_nodes: bool,
    pub cleanup: CleanupMode,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        ClusterSettings {
            server: PathBuf::from("redis-server"),
            host: DEFAULT_HOST.to_string(),
            port: 30000,
            timeout: 2000,
            nodes: 6,
            replicas: 1,
            work_dir: PathBuf::from("."),
            call_timeout_secs: 10,
            readiness: ReadinessMode::Fixed,
            launch_delay_ms: 1000,
            converge_delay_ms: 3000,
            poll_interval_ms: 250,
            poll_deadline_ms: 30_000,
            keep_nodes: false,
            cleanup: CleanupMode::All,
        }
    }
}

impl ClusterSettings {
    /// Load settings from a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> ClusterResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ClusterError::Settings(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ClusterResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Validate into an immutable config
    pub fn validate(self) -> ClusterResult<ClusterConfig> {
        ClusterConfig::from_settings(self)
    }
}

/// How the orchestrator waits for the gossip layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessMode {
    /// Sleep for fixed delays after launch and after meeting
    Fixed,
    /// Poll the listing until every node is visible
    Poll,
}

/// Which generated files are removed during teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CleanupMode {
    All,
    Logs,
    None,
}

/// Validated readiness contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessPolicy {
    FixedDelay {
        after_launch: Duration,
        after_meet: Duration,
    },
    Poll {
        interval: Duration,
        deadline: Duration,
    },
}

/// What happens to nodes and artifacts once the run ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownPolicy {
    /// Leave nodes running for inspection
    pub keep_nodes: bool,
    pub cleanup: CleanupMode,
}

/// Validated, immutable configuration for one run
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    pub server: PathBuf,
    pub host: String,
    pub base_port: u16,
    pub node_count: usize,
    pub replica_count: usize,
    pub node_timeout_ms: u64,
    pub working_dir: PathBuf,
    pub call_timeout: Duration,
    pub readiness: ReadinessPolicy,
    pub teardown: TeardownPolicy,
}

impl ClusterConfig {
    pub fn from_settings(settings: ClusterSettings) -> ClusterResult<Self> {
        if settings.port == 0 || settings.port > u16::MAX as u32 {
            return Err(ClusterError::Config(format!(
                "port is invalid: {}",
                settings.port
            )));
        }
        if settings.timeout == 0 {
            return Err(ClusterError::Config(format!(
                "timeout is invalid: {}",
                settings.timeout
            )));
        }
        if settings.host.trim().is_empty() {
            return Err(ClusterError::Config("host must not be empty".to_string()));
        }
        if settings.call_timeout_secs == 0 {
            return Err(ClusterError::Config(
                "call timeout must be at least one second".to_string(),
            ));
        }

        planner::validate(settings.nodes, settings.replicas)?;

        let last_port = settings.port as u64 + settings.nodes as u64 - 1;
        if last_port > u16::MAX as u64 {
            return Err(ClusterError::Config(format!(
                "nodes is invalid: {} nodes from port {} exceed port {}",
                settings.nodes,
                settings.port,
                u16::MAX
            )));
        }

        let readiness = match settings.readiness {
            ReadinessMode::Fixed => ReadinessPolicy::FixedDelay {
                after_launch: Duration::from_millis(settings.launch_delay_ms),
                after_meet: Duration::from_millis(settings.converge_delay_ms),
            },
            ReadinessMode::Poll => {
                if settings.poll_interval_ms == 0 || settings.poll_deadline_ms == 0 {
                    return Err(ClusterError::Config(
                        "poll interval and deadline must be positive".to_string(),
                    ));
                }
                ReadinessPolicy::Poll {
                    interval: Duration::from_millis(settings.poll_interval_ms),
                    deadline: Duration::from_millis(settings.poll_deadline_ms),
                }
            }
        };

        Ok(ClusterConfig {
            server: settings.server,
            host: settings.host,
            base_port: settings.port as u16,
            node_count: settings.nodes,
            replica_count: settings.replicas,
            node_timeout_ms: settings.timeout,
            working_dir: settings.work_dir,
            call_timeout: Duration::from_secs(settings.call_timeout_secs),
            readiness,
            teardown: TeardownPolicy {
                keep_nodes: settings.keep_nodes,
                cleanup: settings.cleanup,
            },
        })
    }

    pub fn master_count(&self) -> usize {
        planner::master_count(self.node_count, self.replica_count)
    }

    /// All node indices in ascending order
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> {
        (0..self.node_count).map(NodeIndex)
    }

    pub fn port_of(&self, index: NodeIndex) -> u16 {
        index.port(self.base_port)
    }

    pub fn endpoint(&self, index: NodeIndex) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port_of(index))
    }

    /// Node 0, against which every join is issued
    pub fn coordinator(&self) -> Endpoint {
        self.endpoint(NodeIndex(0))
    }
}
