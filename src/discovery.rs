//! Cluster discovery: join, topology fetch and replica assignment
//!
//! Every call is a single request/response exchange. Nothing is retried;
//! the first failed call aborts the phase.

use tracing::{debug, info, warn};

use crate::client::AdminClient;
use crate::config::ClusterConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::topology::{parse_cluster_nodes_verbose, ParsedListing};
use crate::types::{Endpoint, NodeIdMap, NodeIndex, ReplicaAssignment};

/// Drives join and replicate commands through an `AdminClient`
pub struct ClusterDiscovery<'a, C: AdminClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: AdminClient + ?Sized> ClusterDiscovery<'a, C> {
    pub fn new(client: &'a C) -> Self {
        ClusterDiscovery { client }
    }

    /// Ask `coordinator` to meet `target`
    pub async fn join(&self, coordinator: &Endpoint, target: &Endpoint) -> DiscoveryResult<String> {
        let ack = self
            .client
            .meet(coordinator, &target.host, target.port)
            .await?;
        info!(%coordinator, %target, %ack, "cluster meet");
        Ok(ack)
    }

    /// Raw `CLUSTER NODES` listing as seen by `coordinator`
    pub async fn fetch_topology(&self, coordinator: &Endpoint) -> DiscoveryResult<String> {
        let listing = self.client.cluster_nodes(coordinator).await?;
        debug!(%coordinator, lines = listing.lines().count(), "fetched cluster listing");
        Ok(listing)
    }

    /// Fetch and parse the listing, logging any skipped lines
    pub async fn discover(&self, coordinator: &Endpoint) -> DiscoveryResult<ParsedListing> {
        let listing = self.fetch_topology(coordinator).await?;
        let parsed = parse_cluster_nodes_verbose(&listing);
        for skip in &parsed.skipped {
            warn!(
                line = skip.line_number,
                reason = %skip.reason,
                "skipping cluster listing line"
            );
        }
        info!(nodes = parsed.ids.len(), "discovered node ids");
        Ok(parsed)
    }

    /// Make `replica` follow the master identified by `master_id`
    pub async fn replicate(&self, replica: &Endpoint, master_id: &str) -> DiscoveryResult<String> {
        let ack = self.client.replicate(replica, master_id).await?;
        info!(%replica, master = master_id, %ack, "cluster replicate");
        Ok(ack)
    }

    /// Join every node `1..node_count` against node 0, in ascending order
    pub async fn join_all(&self, config: &ClusterConfig) -> DiscoveryResult<usize> {
        let coordinator = config.coordinator();
        let mut joined = 0;
        for index in config.indices().skip(1) {
            self.join(&coordinator, &config.endpoint(index)).await?;
            joined += 1;
        }
        Ok(joined)
    }

    /// Issue one replicate command per pair, in assignment order
    pub async fn replicate_all(
        &self,
        config: &ClusterConfig,
        ids: &NodeIdMap,
        assignment: &[ReplicaAssignment],
    ) -> DiscoveryResult<usize> {
        for pair in assignment {
            let master_id = master_id(config, ids, pair.master)?;
            self.replicate(&config.endpoint(pair.replica), master_id).await?;
        }
        Ok(assignment.len())
    }
}

fn master_id<'m>(config: &ClusterConfig, ids: &'m NodeIdMap, master: NodeIndex) -> DiscoveryResult<&'m str> {
    let port = config.port_of(master);
    ids.get(&port)
        .map(String::as_str)
        .ok_or(DiscoveryError::UnknownMaster { port })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterSettings;
    use crate::topology::assign_replicas;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records calls and answers every command with OK
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        listing: String,
    }

    #[async_trait]
    impl AdminClient for Recorder {
        async fn meet(&self, endpoint: &Endpoint, host: &str, port: u16) -> DiscoveryResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} MEET {} {}", endpoint.port, host, port));
            Ok("OK".to_string())
        }

        async fn cluster_nodes(&self, _endpoint: &Endpoint) -> DiscoveryResult<String> {
            Ok(self.listing.clone())
        }

        async fn replicate(&self, endpoint: &Endpoint, master_id: &str) -> DiscoveryResult<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} REPLICATE {}", endpoint.port, master_id));
            Ok("OK".to_string())
        }

        async fn shutdown(&self, _endpoint: &Endpoint) -> DiscoveryResult<()> {
            Ok(())
        }
    }

    fn config() -> ClusterConfig {
        ClusterSettings::default().validate().unwrap()
    }

    #[tokio::test]
    async fn test_join_all_meets_against_node_zero() {
        let client = Recorder::default();
        let joined = ClusterDiscovery::new(&client).join_all(&config()).await.unwrap();

        assert_eq!(joined, 5);
        let calls = client.calls.lock().unwrap().clone();
        assert_eq!(calls[0], "30000 MEET 127.0.0.1 30001");
        assert_eq!(calls[4], "30000 MEET 127.0.0.1 30005");
    }

    #[tokio::test]
    async fn test_discover_reports_skipped_lines() {
        let client = Recorder {
            listing: "aaa 127.0.0.1:30000@40000 myself,master - 0 0 1 connected\n\
                      broken-line\n\
                      bbb 127.0.0.1:30001@40001 master - 0 0 2 connected\n"
                .to_string(),
            ..Recorder::default()
        };
        let parsed = ClusterDiscovery::new(&client)
            .discover(&Endpoint::new("127.0.0.1", 30000))
            .await
            .unwrap();

        assert_eq!(parsed.ids.len(), 2);
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].line_number, 2);
    }

    #[tokio::test]
    async fn test_replicate_all_sends_master_ids() {
        let client = Recorder::default();
        let config = config();
        let ids: NodeIdMap = [(30000, "m0"), (30001, "m1"), (30002, "m2")]
            .into_iter()
            .map(|(port, id)| (port, id.to_string()))
            .collect();

        let assigned = ClusterDiscovery::new(&client)
            .replicate_all(&config, &ids, &assign_replicas(6, 1))
            .await
            .unwrap();

        assert_eq!(assigned, 3);
        assert_eq!(
            client.calls.lock().unwrap().clone(),
            vec!["30003 REPLICATE m0", "30004 REPLICATE m1", "30005 REPLICATE m2"]
        );
    }

    #[tokio::test]
    async fn test_missing_master_id_stops_before_sending() {
        let client = Recorder::default();
        let config = config();
        let ids: NodeIdMap = [(30000, "m0".to_string()), (30002, "m2".to_string())]
            .into_iter()
            .collect();

        let err = ClusterDiscovery::new(&client)
            .replicate_all(&config, &ids, &assign_replicas(6, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, DiscoveryError::UnknownMaster { port: 30001 }));
        assert_eq!(client.calls.lock().unwrap().clone(), vec!["30003 REPLICATE m0"]);
    }
}
