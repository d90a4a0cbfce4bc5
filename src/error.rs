//! Error types for cluster bootstrap

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Endpoint;

/// Main error type for bootstrap operations
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Invalid node/replica/port/timeout combination
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file could not be read or parsed
    #[error("Settings error: {0}")]
    Settings(String),

    /// A node process failed to start or exited non-zero
    #[error("Launch failed for port {port}: {reason}, output: {output}")]
    Launch {
        port: u16,
        reason: String,
        output: String,
    },

    /// Join, fetch or replicate call failed
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by remote administrative calls
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// TCP connection could not be opened
    #[error("cannot connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    /// The node answered with an error reply
    #[error("{endpoint} rejected `{command}`: {message}")]
    Remote {
        endpoint: Endpoint,
        command: String,
        message: String,
    },

    /// The call exceeded its deadline
    #[error("`{command}` against {endpoint} timed out after {after:?}")]
    Timeout {
        endpoint: Endpoint,
        command: String,
        after: Duration,
    },

    /// Malformed or unexpected reply
    #[error("protocol error from {endpoint}: {message}")]
    Protocol { endpoint: Endpoint, message: String },

    /// No identifier was discovered for a master port
    #[error("no node id discovered for master port {port}")]
    UnknownMaster { port: u16 },

    /// Readiness polling gave up
    #[error("cluster did not converge within {deadline:?}: saw {seen} of {expected} nodes")]
    NotConverged {
        expected: usize,
        seen: usize,
        deadline: Duration,
    },
}

impl From<toml::de::Error> for ClusterError {
    fn from(err: toml::de::Error) -> Self {
        ClusterError::Settings(err.to_string())
    }
}

/// Result type for bootstrap operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Result type for remote calls
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Orchestration stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Validate,
    Launch,
    Ready,
    Meet,
    Converge,
    Discover,
    Replicate,
    Shutdown,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Launch => "start",
            Stage::Ready => "ready",
            Stage::Meet => "meeting",
            Stage::Converge => "converge",
            Stage::Discover => "discover",
            Stage::Replicate => "replicate",
            Stage::Shutdown => "shutdown",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// A fatal error tagged with the stage that produced it
#[derive(Error, Debug)]
#[error("cluster {stage} failed: {source}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub source: ClusterError,
}

impl StageFailure {
    pub fn new(stage: Stage, source: impl Into<ClusterError>) -> Self {
        StageFailure {
            stage,
            source: source.into(),
        }
    }
}

/// One listing line that could not be mapped to a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseSkip {
    /// 1-based line number within the listing
    pub line_number: usize,
    pub line: String,
    pub reason: String,
}

/// Best-effort teardown problems; never abort the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TeardownWarning {
    Shutdown { port: u16, message: String },
    Cleanup { target: String, message: String },
}

impl fmt::Display for TeardownWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownWarning::Shutdown { port, message } => {
                write!(f, "shutdown of port {} failed: {}", port, message)
            }
            TeardownWarning::Cleanup { target, message } => {
                write!(f, "cleanup of {} failed: {}", target, message)
            }
        }
    }
}
