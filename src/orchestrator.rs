//! Staged bootstrap protocol
//!
//! launch → ready → meet → converge → discover → replicate → shutdown → cleanup
//!
//! Once any node has been launched, shutdown and cleanup run on every exit
//! path unless the teardown policy asks to keep the nodes running.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::client::AdminClient;
use crate::config::{ClusterConfig, ReadinessPolicy};
use crate::discovery::ClusterDiscovery;
use crate::error::{ClusterError, DiscoveryError, ParseSkip, Stage, StageFailure, TeardownWarning};
use crate::lifecycle::{cleanup_artifacts, NodeLifecycle, ProcessSpawner};
use crate::topology::{parse_cluster_nodes, planner};
use crate::types::{NodeIdentity, ReplicaAssignment};

/// Last stage to run before teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapCommand {
    /// Launch the nodes only
    Start,
    /// Launch and join them into one cluster
    Meeting,
    /// Full protocol including replica assignment
    Replicate,
}

impl BootstrapCommand {
    /// Allowed command names, sorted for binary search
    pub const NAMES: [&'static str; 3] = ["meeting", "replicate", "start"];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES.binary_search(&name).ok().map(|idx| match Self::NAMES[idx] {
            "meeting" => BootstrapCommand::Meeting,
            "start" => BootstrapCommand::Start,
            _ => BootstrapCommand::Replicate,
        })
    }

    pub fn last_stage(&self) -> Stage {
        match self {
            BootstrapCommand::Start => Stage::Ready,
            BootstrapCommand::Meeting => Stage::Converge,
            BootstrapCommand::Replicate => Stage::Replicate,
        }
    }
}

impl fmt::Display for BootstrapCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapCommand::Start => "start",
            BootstrapCommand::Meeting => "meeting",
            BootstrapCommand::Replicate => "replicate",
        };
        f.write_str(name)
    }
}

/// Everything observed during one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub command: BootstrapCommand,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Last stage that completed successfully
    pub stage_reached: Option<Stage>,
    pub nodes_launched: usize,
    pub nodes_joined: usize,
    pub identities: Vec<NodeIdentity>,
    pub skipped_lines: Vec<ParseSkip>,
    pub assignment: Vec<ReplicaAssignment>,
    pub replicas_assigned: usize,
    pub nodes_left_running: bool,
    pub removed_artifacts: Vec<String>,
    pub warnings: Vec<TeardownWarning>,
}

impl RunReport {
    fn new(command: BootstrapCommand) -> Self {
        RunReport {
            command,
            started_at: Utc::now(),
            finished_at: None,
            stage_reached: None,
            nodes_launched: 0,
            nodes_joined: 0,
            identities: Vec::new(),
            skipped_lines: Vec::new(),
            assignment: Vec::new(),
            replicas_assigned: 0,
            nodes_left_running: false,
            removed_artifacts: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn reached(&mut self, stage: Stage) {
        debug!(%stage, "stage complete");
        self.stage_reached = Some(stage);
    }
}

/// A failed run: the fatal error plus what teardown observed
#[derive(Error, Debug)]
#[error("{failure}")]
pub struct RunFailure {
    #[source]
    pub failure: StageFailure,
    pub report: RunReport,
}

impl RunFailure {
    pub fn stage(&self) -> Stage {
        self.failure.stage
    }
}

/// Sequences lifecycle, discovery and planning for one cluster
pub struct Orchestrator<'a, S: ProcessSpawner + ?Sized, C: AdminClient + ?Sized> {
    config: &'a ClusterConfig,
    spawner: &'a S,
    client: &'a C,
}

impl<'a, S: ProcessSpawner + ?Sized, C: AdminClient + ?Sized> Orchestrator<'a, S, C> {
    pub fn new(config: &'a ClusterConfig, spawner: &'a S, client: &'a C) -> Self {
        Orchestrator {
            config,
            spawner,
            client,
        }
    }

    /// Run the protocol up to `command`, then tear down
    pub async fn run(&self, command: BootstrapCommand) -> Result<RunReport, RunFailure> {
        let mut report = RunReport::new(command);
        let lifecycle = NodeLifecycle::new(self.spawner, self.client);

        info!(
            nodes = self.config.node_count,
            replicas = self.config.replica_count,
            base_port = self.config.base_port,
            %command,
            "bootstrapping cluster"
        );

        if let Err(e) = lifecycle.launch(self.config).await {
            // only nodes whose launcher succeeded are ours to stop
            let started = match &e {
                ClusterError::Launch { port, .. } => (port - self.config.base_port) as usize,
                _ => 0,
            };
            report.nodes_launched = started;
            self.teardown(&lifecycle, &mut report, started).await;
            return Err(RunFailure {
                failure: StageFailure::new(Stage::Launch, e),
                report,
            });
        }
        report.nodes_launched = self.config.node_count;
        report.reached(Stage::Launch);

        let result = self.bootstrap(command, &mut report).await;
        self.teardown(&lifecycle, &mut report, self.config.node_count)
            .await;

        match result {
            Ok(()) => Ok(report),
            Err(failure) => Err(RunFailure { failure, report }),
        }
    }

    async fn bootstrap(&self, command: BootstrapCommand, report: &mut RunReport) -> Result<(), StageFailure> {
        let discovery = ClusterDiscovery::new(self.client);
        let config = self.config;

        self.wait_ready()
            .await
            .map_err(|e| StageFailure::new(Stage::Ready, e))?;
        report.reached(Stage::Ready);
        if command == BootstrapCommand::Start {
            return Ok(());
        }

        report.nodes_joined = discovery
            .join_all(config)
            .await
            .map_err(|e| StageFailure::new(Stage::Meet, e))?;
        report.reached(Stage::Meet);

        self.wait_converged()
            .await
            .map_err(|e| StageFailure::new(Stage::Converge, e))?;
        report.reached(Stage::Converge);
        if command == BootstrapCommand::Meeting {
            return Ok(());
        }

        if config.replica_count == 0 {
            info!("no replicas requested, skipping replica assignment");
            report.reached(Stage::Replicate);
            return Ok(());
        }

        let parsed = discovery
            .discover(&config.coordinator())
            .await
            .map_err(|e| StageFailure::new(Stage::Discover, e))?;
        report.identities = parsed.identities();
        report.skipped_lines = parsed.skipped.clone();
        report.reached(Stage::Discover);

        let assignment = planner::assign_replicas(config.node_count, config.replica_count);
        for pair in &assignment {
            debug!(%pair, "planned");
        }
        report.assignment = assignment.clone();

        report.replicas_assigned = discovery
            .replicate_all(config, &parsed.ids, &assignment)
            .await
            .map_err(|e| StageFailure::new(Stage::Replicate, e))?;
        report.reached(Stage::Replicate);

        Ok(())
    }

    /// Wait until every launched node accepts commands
    async fn wait_ready(&self) -> Result<(), DiscoveryError> {
        match self.config.readiness {
            ReadinessPolicy::FixedDelay { after_launch, .. } => {
                debug!(delay = ?after_launch, "waiting for nodes to start");
                sleep(after_launch).await;
                Ok(())
            }
            ReadinessPolicy::Poll { interval, deadline } => {
                let give_up = Instant::now() + deadline;
                for (ready, index) in self.config.indices().enumerate() {
                    let endpoint = self.config.endpoint(index);
                    loop {
                        match self.client.cluster_nodes(&endpoint).await {
                            Ok(_) => break,
                            Err(e) => {
                                if Instant::now() >= give_up {
                                    return Err(DiscoveryError::NotConverged {
                                        expected: self.config.node_count,
                                        seen: ready,
                                        deadline,
                                    });
                                }
                                debug!(%endpoint, error = %e, "node not ready yet");
                                sleep(interval).await;
                            }
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Wait until the coordinator's listing shows every node
    async fn wait_converged(&self) -> Result<(), DiscoveryError> {
        match self.config.readiness {
            ReadinessPolicy::FixedDelay { after_meet, .. } => {
                debug!(delay = ?after_meet, "waiting for gossip convergence");
                sleep(after_meet).await;
                Ok(())
            }
            ReadinessPolicy::Poll { interval, deadline } => {
                let give_up = Instant::now() + deadline;
                let coordinator = self.config.coordinator();
                loop {
                    let seen = match self.client.cluster_nodes(&coordinator).await {
                        Ok(listing) => self.known_nodes(&listing),
                        Err(e) => {
                            debug!(error = %e, "listing unavailable");
                            0
                        }
                    };
                    if seen == self.config.node_count {
                        info!(nodes = seen, "cluster converged");
                        return Ok(());
                    }
                    if Instant::now() >= give_up {
                        return Err(DiscoveryError::NotConverged {
                            expected: self.config.node_count,
                            seen,
                            deadline,
                        });
                    }
                    sleep(interval).await;
                }
            }
        }
    }

    /// Number of this cluster's ports present in a listing
    fn known_nodes(&self, listing: &str) -> usize {
        let ids = parse_cluster_nodes(listing);
        self.config
            .indices()
            .filter(|index| ids.contains_key(&self.config.port_of(*index)))
            .count()
    }

    async fn teardown(&self, lifecycle: &NodeLifecycle<'_, S, C>, report: &mut RunReport, started: usize) {
        let policy = self.config.teardown;
        if policy.keep_nodes {
            info!(nodes = started, "leaving nodes running");
            report.nodes_left_running = started > 0;
            report.finished_at = Some(Utc::now());
            return;
        }

        let mut warnings = lifecycle.shutdown_first(self.config, started).await;
        debug!(nodes = started, "shutdown pass complete");

        match cleanup_artifacts(&self.config.working_dir, policy.cleanup) {
            Ok(outcome) => {
                report.removed_artifacts = outcome.removed;
                warnings.extend(outcome.warnings);
            }
            Err(e) => {
                warn!(dir = %self.config.working_dir.display(), error = %e, "cleanup failed");
                warnings.push(TeardownWarning::Cleanup {
                    target: self.config.working_dir.display().to_string(),
                    message: e.to_string(),
                });
            }
        }

        for warning in &warnings {
            warn!(%warning, "teardown warning");
        }
        report.warnings.extend(warnings);
        report.finished_at = Some(Utc::now());
    }
}
