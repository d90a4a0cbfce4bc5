//! Node process lifecycle: launch, shutdown and artifact cleanup

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::client::AdminClient;
use crate::config::{CleanupMode, ClusterConfig};
use crate::error::{ClusterError, ClusterResult, TeardownWarning};
use crate::types::NodeIndex;

/// Captured result of one launcher process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    /// stdout followed by stderr
    pub output: String,
}

/// Runs a program to completion and captures its output
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn run(&self, program: &Path, args: &[String], dir: &Path) -> io::Result<ProcessOutput>;
}

/// Spawns real processes through `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

#[async_trait]
impl ProcessSpawner for TokioSpawner {
    async fn run(&self, program: &Path, args: &[String], dir: &Path) -> io::Result<ProcessOutput> {
        let output = Command::new(program)
            .args(args)
            .current_dir(dir)
            .kill_on_drop(true)
            .output()
            .await?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            output: text,
        })
    }
}

/// Server flags for the node at `index`
pub fn launch_args(config: &ClusterConfig, index: NodeIndex) -> Vec<String> {
    let port = config.port_of(index).to_string();
    vec![
        "--port".to_string(),
        port.clone(),
        "--cluster-enabled".to_string(),
        "yes".to_string(),
        "--cluster-config-file".to_string(),
        format!("nodes-{}.conf", port),
        "--cluster-node-timeout".to_string(),
        config.node_timeout_ms.to_string(),
        "--appendonly".to_string(),
        "yes".to_string(),
        "--appendfilename".to_string(),
        format!("appendonly-{}.aof", port),
        "--dbfilename".to_string(),
        format!("dump-{}.rdb", port),
        "--logfile".to_string(),
        format!("nodes-{}.log", port),
        "--daemonize".to_string(),
        "yes".to_string(),
    ]
}

/// Starts and stops the node processes of one cluster
pub struct NodeLifecycle<'a, S: ProcessSpawner + ?Sized, C: AdminClient + ?Sized> {
    spawner: &'a S,
    client: &'a C,
}

impl<'a, S: ProcessSpawner + ?Sized, C: AdminClient + ?Sized> NodeLifecycle<'a, S, C> {
    pub fn new(spawner: &'a S, client: &'a C) -> Self {
        NodeLifecycle { spawner, client }
    }

    /// Start every node in ascending index order
    ///
    /// Nodes daemonize themselves, so this returns as soon as each launcher
    /// exits. The first failure aborts with `ClusterError::Launch`.
    pub async fn launch(&self, config: &ClusterConfig) -> ClusterResult<usize> {
        for index in config.indices() {
            self.launch_node(config, index).await?;
        }
        Ok(config.node_count)
    }

    pub async fn launch_node(&self, config: &ClusterConfig, index: NodeIndex) -> ClusterResult<()> {
        let port = config.port_of(index);
        let args = launch_args(config, index);
        info!(
            node = %index,
            port,
            cmd = %format!("{} {}", config.server.display(), args.join(" ")),
            "launching node"
        );

        let run = self.spawner.run(&config.server, &args, &config.working_dir);
        let output = match timeout(config.call_timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ClusterError::Launch {
                    port,
                    reason: e.to_string(),
                    output: String::new(),
                })
            }
            Err(_) => {
                return Err(ClusterError::Launch {
                    port,
                    reason: format!("launcher did not exit within {:?}", config.call_timeout),
                    output: String::new(),
                })
            }
        };

        if !output.success {
            let reason = match output.code {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            };
            return Err(ClusterError::Launch {
                port,
                reason,
                output: output.output,
            });
        }

        debug!(port, output = %output.output.trim(), "node launcher exited");
        Ok(())
    }

    /// Shut down every node; failures become warnings
    pub async fn shutdown(&self, config: &ClusterConfig) -> Vec<TeardownWarning> {
        self.shutdown_first(config, config.node_count).await
    }

    /// Shut down nodes `0..count` in ascending order, best effort
    pub async fn shutdown_first(&self, config: &ClusterConfig, count: usize) -> Vec<TeardownWarning> {
        let mut warnings = Vec::new();
        for index in config.indices().take(count) {
            let endpoint = config.endpoint(index);
            match self.client.shutdown(&endpoint).await {
                Ok(()) => info!(%endpoint, "node shut down"),
                Err(e) => {
                    warn!(%endpoint, error = %e, "node shutdown failed");
                    warnings.push(TeardownWarning::Shutdown {
                        port: endpoint.port,
                        message: e.to_string(),
                    });
                }
            }
        }
        warnings
    }
}

/// Files generated by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// `nodes-*.conf`
    NodeState,
    /// `nodes-*.log`
    Log,
    /// `appendonly*.aof`
    AppendLog,
    /// `dump*.rdb`
    Snapshot,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::NodeState,
        ArtifactKind::Log,
        ArtifactKind::AppendLog,
        ArtifactKind::Snapshot,
    ];

    fn prefix_suffix(&self) -> (&'static str, &'static str) {
        match self {
            ArtifactKind::NodeState => ("nodes-", ".conf"),
            ArtifactKind::Log => ("nodes-", ".log"),
            ArtifactKind::AppendLog => ("appendonly", ".aof"),
            ArtifactKind::Snapshot => ("dump", ".rdb"),
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        let (prefix, suffix) = self.prefix_suffix();
        file_name.starts_with(prefix) && file_name.ends_with(suffix)
    }

    /// Classify a file name, if it is a node artifact
    pub fn classify(file_name: &str) -> Option<ArtifactKind> {
        Self::ALL.into_iter().find(|kind| kind.matches(file_name))
    }
}

impl CleanupMode {
    /// Whether files of `kind` are removed under this mode
    pub fn includes(&self, kind: ArtifactKind) -> bool {
        match self {
            CleanupMode::All => true,
            CleanupMode::Logs => kind == ArtifactKind::Log,
            CleanupMode::None => false,
        }
    }
}

/// Files removed by a cleanup pass and the removals that failed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub removed: Vec<String>,
    pub warnings: Vec<TeardownWarning>,
}

/// Names of the regular files directly inside `dir`
pub fn regular_file_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Remove node artifacts in `dir` selected by `mode`
///
/// Failing to list `dir` is an error. A file that cannot be removed is
/// recorded as a warning and the pass continues.
pub fn cleanup_artifacts(dir: &Path, mode: CleanupMode) -> io::Result<CleanupOutcome> {
    let mut outcome = CleanupOutcome::default();
    if mode == CleanupMode::None {
        return Ok(outcome);
    }

    for name in regular_file_names(dir)? {
        let selected = ArtifactKind::classify(&name).map_or(false, |kind| mode.includes(kind));
        if !selected {
            continue;
        }

        let path: PathBuf = dir.join(&name);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(file = %path.display(), "removed artifact");
                outcome.removed.push(name);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "artifact removal failed");
                outcome.warnings.push(TeardownWarning::Cleanup {
                    target: name,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(outcome)
}
