//! In-memory stand-ins for server processes and cluster nodes

#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::Path;

use async_trait::async_trait;
use cluster_bootstrap::*;
use parking_lot::Mutex;

/// One administrative call as observed by `FakeCluster`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Meet { on: u16, host: String, port: u16 },
    Nodes { on: u16 },
    Replicate { on: u16, master_id: String },
    Shutdown { on: u16 },
}

/// Simulates a set of cluster nodes that learn about each other via MEET
#[derive(Default)]
pub struct FakeCluster {
    calls: Mutex<Vec<Call>>,
    known: Mutex<BTreeSet<u16>>,
    /// Extra lines appended to every listing
    pub extra_listing: Mutex<String>,
    pub fail_meet: Mutex<HashSet<u16>>,
    pub fail_replicate: Mutex<HashSet<u16>>,
    pub fail_shutdown: Mutex<HashSet<u16>>,
    /// Ports that refuse CLUSTER NODES for this many calls
    pub unready_polls: Mutex<usize>,
    /// When false, MEET succeeds without the node showing up in listings
    pub gossip_works: Mutex<bool>,
}

impl FakeCluster {
    pub fn new() -> Self {
        let cluster = FakeCluster::default();
        *cluster.gossip_works.lock() = true;
        cluster
    }

    pub fn node_id(port: u16) -> String {
        format!("{:040x}", port as u128 * 7919)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn meets(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Meet { .. }))
            .collect()
    }

    pub fn replicates(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Replicate { .. }))
            .collect()
    }

    pub fn shutdowns(&self) -> Vec<u16> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Shutdown { on } => Some(on),
                _ => None,
            })
            .collect()
    }

    fn listing(&self, me: u16) -> String {
        let mut known = self.known.lock().clone();
        known.insert(me);
        let mut text = String::new();
        for port in known {
            let flags = if port == me { "myself,master" } else { "master" };
            text.push_str(&format!(
                "{} 127.0.0.1:{}@{} {} - 0 0 0 connected\n",
                Self::node_id(port),
                port,
                port as u32 + 10000,
                flags
            ));
        }
        text.push_str(&self.extra_listing.lock());
        text
    }

    fn remote_error(endpoint: &Endpoint, command: &str) -> DiscoveryError {
        DiscoveryError::Remote {
            endpoint: endpoint.clone(),
            command: command.to_string(),
            message: "ERR injected failure".to_string(),
        }
    }
}

#[async_trait]
impl AdminClient for FakeCluster {
    async fn meet(&self, endpoint: &Endpoint, host: &str, port: u16) -> Result<String, DiscoveryError> {
        self.calls.lock().push(Call::Meet {
            on: endpoint.port,
            host: host.to_string(),
            port,
        });
        if self.fail_meet.lock().contains(&port) {
            return Err(Self::remote_error(endpoint, "CLUSTER MEET"));
        }
        if *self.gossip_works.lock() {
            let mut known = self.known.lock();
            known.insert(endpoint.port);
            known.insert(port);
        }
        Ok("OK".to_string())
    }

    async fn cluster_nodes(&self, endpoint: &Endpoint) -> Result<String, DiscoveryError> {
        self.calls.lock().push(Call::Nodes { on: endpoint.port });
        {
            let mut unready = self.unready_polls.lock();
            if *unready > 0 {
                *unready -= 1;
                return Err(DiscoveryError::Connect {
                    endpoint: endpoint.clone(),
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "not listening"),
                });
            }
        }
        Ok(self.listing(endpoint.port))
    }

    async fn replicate(&self, endpoint: &Endpoint, master_id: &str) -> Result<String, DiscoveryError> {
        self.calls.lock().push(Call::Replicate {
            on: endpoint.port,
            master_id: master_id.to_string(),
        });
        if self.fail_replicate.lock().contains(&endpoint.port) {
            return Err(Self::remote_error(endpoint, "CLUSTER REPLICATE"));
        }
        Ok("OK".to_string())
    }

    async fn shutdown(&self, endpoint: &Endpoint) -> Result<(), DiscoveryError> {
        self.calls.lock().push(Call::Shutdown { on: endpoint.port });
        if self.fail_shutdown.lock().contains(&endpoint.port) {
            return Err(Self::remote_error(endpoint, "SHUTDOWN"));
        }
        Ok(())
    }
}

/// Records launches instead of spawning processes
#[derive(Default)]
pub struct FakeSpawner {
    launched: Mutex<Vec<Vec<String>>>,
    /// `--port` value whose launcher exits non-zero
    pub fail_port: Mutex<Option<u16>>,
    /// Create the node's artifacts in the working directory
    pub touch_files: bool,
}

impl FakeSpawner {
    pub fn new() -> Self {
        FakeSpawner::default()
    }

    pub fn touching_files() -> Self {
        FakeSpawner {
            touch_files: true,
            ..FakeSpawner::default()
        }
    }

    pub fn launched_ports(&self) -> Vec<u16> {
        self.launched
            .lock()
            .iter()
            .filter_map(|args| args.get(1).and_then(|p| p.parse().ok()))
            .collect()
    }

    pub fn launches(&self) -> Vec<Vec<String>> {
        self.launched.lock().clone()
    }
}

#[async_trait]
impl ProcessSpawner for FakeSpawner {
    async fn run(&self, _program: &Path, args: &[String], dir: &Path) -> io::Result<ProcessOutput> {
        self.launched.lock().push(args.to_vec());
        let port: u16 = args[1].parse().unwrap();

        if *self.fail_port.lock() == Some(port) {
            return Ok(ProcessOutput {
                success: false,
                code: Some(1),
                output: format!("Could not create server TCP listening socket *:{}", port),
            });
        }

        if self.touch_files {
            for name in [
                format!("nodes-{}.conf", port),
                format!("nodes-{}.log", port),
                format!("appendonly-{}.aof", port),
                format!("dump-{}.rdb", port),
            ] {
                std::fs::write(dir.join(name), b"")?;
            }
        }

        Ok(ProcessOutput {
            success: true,
            code: Some(0),
            output: String::new(),
        })
    }
}

/// Settings tuned for tests: no fixed delays, short deadlines
pub fn test_settings(nodes: usize, replicas: usize, work_dir: &Path) -> ClusterSettings {
    ClusterSettings {
        server: "redis-server".into(),
        nodes,
        replicas,
        work_dir: work_dir.to_path_buf(),
        call_timeout_secs: 1,
        launch_delay_ms: 0,
        converge_delay_ms: 0,
        poll_interval_ms: 1,
        poll_deadline_ms: 200,
        ..ClusterSettings::default()
    }
}
