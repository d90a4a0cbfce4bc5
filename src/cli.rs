use clap::Parser;
use std::path::PathBuf;

use crate::config::{CleanupMode, ClusterSettings, ReadinessMode};
use crate::error::ClusterResult;

/// cluster-bootstrap - launch, join and replicate a local Redis Cluster
#[derive(Parser, Debug)]
#[command(name = "cluster-bootstrap")]
#[command(version)]
#[command(about = "Bootstrap a local multi-node Redis Cluster for testing")]
#[command(long_about = "
Launches N cluster-enabled server processes on consecutive ports, joins them
into one cluster, assigns replicas to masters and tears everything down.

Usage examples:
  cluster-bootstrap                                   # 6 nodes, 1 replica each
  cluster-bootstrap --nodes 9 --replicas 2            # 3 masters, 2 replicas each
  cluster-bootstrap --command meeting --keep-nodes    # join only, leave running
")]
pub struct Cli {
    /// Path to the server binary
    #[arg(long = "redis-server", value_name = "PATH")]
    pub redis_server: Option<PathBuf>,

    /// Port of the first node
    #[arg(short, long)]
    pub port: Option<u32>,

    /// Cluster node timeout in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Number of nodes (at least 3 masters)
    #[arg(short, long)]
    pub nodes: Option<usize>,

    /// Replicas per master
    #[arg(short, long)]
    pub replicas: Option<usize>,

    /// Last stage to run: start, meeting or replicate
    ///
    /// `start` stops once the nodes are up, `meeting` once they have joined
    /// one cluster, `replicate` runs the whole protocol. Earlier releases
    /// accepted the name and always ran the whole protocol. Teardown runs
    /// after the selected stage either way.
    #[arg(short, long, default_value = "replicate")]
    pub command: String,

    /// TOML file with default settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host the nodes listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Directory for node files
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Deadline for each launch and remote call, in seconds
    #[arg(long, value_name = "SECS")]
    pub call_timeout: Option<u64>,

    /// How to wait for the gossip layer
    #[arg(long, value_enum)]
    pub readiness: Option<ReadinessMode>,

    /// Fixed delay after launching, in milliseconds
    #[arg(long, value_name = "MS")]
    pub launch_delay: Option<u64>,

    /// Fixed delay after meeting, in milliseconds
    #[arg(long, value_name = "MS")]
    pub converge_delay: Option<u64>,

    /// Interval between readiness polls, in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Overall readiness deadline when polling, in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_deadline: Option<u64>,

    /// Leave the nodes running instead of shutting them down
    #[arg(long)]
    pub keep_nodes: bool,

    /// Which generated files to remove at teardown
    #[arg(long, value_enum)]
    pub cleanup: Option<CleanupMode>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Settings from the config file (or defaults) with flags applied on top
    pub fn settings(&self) -> ClusterResult<ClusterSettings> {
        let mut settings = match &self.config {
            Some(path) => ClusterSettings::from_file(path)?,
            None => ClusterSettings::default(),
        };

        if let Some(server) = &self.redis_server {
            settings.server = server.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(timeout) = self.timeout {
            settings.timeout = timeout;
        }
        if let Some(nodes) = self.nodes {
            settings.nodes = nodes;
        }
        if let Some(replicas) = self.replicas {
            settings.replicas = replicas;
        }
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(dir) = &self.work_dir {
            settings.work_dir = dir.clone();
        }
        if let Some(secs) = self.call_timeout {
            settings.call_timeout_secs = secs;
        }
        if let Some(mode) = self.readiness {
            settings.readiness = mode;
        }
        if let Some(ms) = self.launch_delay {
            settings.launch_delay_ms = ms;
        }
        if let Some(ms) = self.converge_delay {
            settings.converge_delay_ms = ms;
        }
        if let Some(ms) = self.poll_interval {
            settings.poll_interval_ms = ms;
        }
        if let Some(ms) = self.poll_deadline {
            settings.poll_deadline_ms = ms;
        }
        if self.keep_nodes {
            settings.keep_nodes = true;
        }
        if let Some(mode) = self.cleanup {
            settings.cleanup = mode;
        }

        Ok(settings)
    }
}
