//! Administrative client for cluster nodes
//!
//! `AdminClient` is the seam between the orchestration logic and the wire.
//! `RespClient` speaks RESP2 over TCP, opening one connection per call and
//! bounding the whole exchange by a single deadline.

pub mod resp;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::types::Endpoint;
pub use resp::Frame;

/// Cluster administration commands used during bootstrap
#[async_trait]
pub trait AdminClient: Send + Sync {
    /// `CLUSTER MEET host port` against `endpoint`
    async fn meet(&self, endpoint: &Endpoint, host: &str, port: u16) -> DiscoveryResult<String>;

    /// `CLUSTER NODES` against `endpoint`
    async fn cluster_nodes(&self, endpoint: &Endpoint) -> DiscoveryResult<String>;

    /// `CLUSTER REPLICATE master_id` against the replica's own endpoint
    async fn replicate(&self, endpoint: &Endpoint, master_id: &str) -> DiscoveryResult<String>;

    /// `SHUTDOWN`; the node closes the connection instead of replying
    async fn shutdown(&self, endpoint: &Endpoint) -> DiscoveryResult<()>;
}

/// RESP2 client with a per-call deadline
#[derive(Debug, Clone)]
pub struct RespClient {
    call_timeout: Duration,
    max_reply_size: usize,
}

impl RespClient {
    pub fn new(call_timeout: Duration) -> Self {
        RespClient {
            call_timeout,
            max_reply_size: 16 * 1024 * 1024,
        }
    }

    /// Send one command and wait for one reply
    ///
    /// `Ok(None)` means the peer closed the connection before replying.
    pub async fn call(&self, endpoint: &Endpoint, args: &[&str]) -> DiscoveryResult<Option<Frame>> {
        let command = args.join(" ");
        debug!(%endpoint, %command, "sending command");

        match timeout(self.call_timeout, self.exchange(endpoint, args)).await {
            Ok(result) => result,
            Err(_) => Err(DiscoveryError::Timeout {
                endpoint: endpoint.clone(),
                command,
                after: self.call_timeout,
            }),
        }
    }

    async fn exchange(&self, endpoint: &Endpoint, args: &[&str]) -> DiscoveryResult<Option<Frame>> {
        let mut stream = TcpStream::connect(endpoint.address())
            .await
            .map_err(|source| DiscoveryError::Connect {
                endpoint: endpoint.clone(),
                source,
            })?;

        let mut request = BytesMut::new();
        resp::encode_command(args, &mut request);
        stream
            .write_all(&request)
            .await
            .map_err(|e| protocol(endpoint, format!("write failed: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| protocol(endpoint, format!("flush failed: {}", e)))?;

        let mut buffer = BytesMut::with_capacity(4096);
        loop {
            if !buffer.is_empty() {
                if let Some((frame, _used)) =
                    resp::decode(&buffer).map_err(|message| protocol(endpoint, message))?
                {
                    return Ok(Some(frame));
                }
            }
            if buffer.len() > self.max_reply_size {
                return Err(protocol(
                    endpoint,
                    format!("reply larger than {} bytes", self.max_reply_size),
                ));
            }

            let read = match stream.read_buf(&mut buffer).await {
                Ok(read) => read,
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => 0,
                Err(e) => return Err(protocol(endpoint, format!("read failed: {}", e))),
            };
            if read == 0 {
                if buffer.is_empty() {
                    return Ok(None);
                }
                return Err(protocol(endpoint, "connection closed mid-reply".to_string()));
            }
        }
    }

    /// Call and turn error or missing replies into `DiscoveryError`
    async fn expect_reply(&self, endpoint: &Endpoint, args: &[&str]) -> DiscoveryResult<Frame> {
        match self.call(endpoint, args).await? {
            Some(Frame::Error(message)) => Err(DiscoveryError::Remote {
                endpoint: endpoint.clone(),
                command: args.join(" "),
                message,
            }),
            Some(frame) => Ok(frame),
            None => Err(protocol(endpoint, "connection closed without reply".to_string())),
        }
    }
}

#[async_trait]
impl AdminClient for RespClient {
    async fn meet(&self, endpoint: &Endpoint, host: &str, port: u16) -> DiscoveryResult<String> {
        let port = port.to_string();
        let reply = self
            .expect_reply(endpoint, &["CLUSTER", "MEET", host, &port])
            .await?;
        Ok(reply.to_text())
    }

    async fn cluster_nodes(&self, endpoint: &Endpoint) -> DiscoveryResult<String> {
        match self.expect_reply(endpoint, &["CLUSTER", "NODES"]).await? {
            Frame::Bulk(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            Frame::Simple(text) => Ok(text),
            other => Err(protocol(
                endpoint,
                format!("unexpected CLUSTER NODES reply: {:?}", other),
            )),
        }
    }

    async fn replicate(&self, endpoint: &Endpoint, master_id: &str) -> DiscoveryResult<String> {
        let reply = self
            .expect_reply(endpoint, &["CLUSTER", "REPLICATE", master_id])
            .await?;
        Ok(reply.to_text())
    }

    async fn shutdown(&self, endpoint: &Endpoint) -> DiscoveryResult<()> {
        match self.call(endpoint, &["SHUTDOWN"]).await? {
            Some(Frame::Error(message)) => Err(DiscoveryError::Remote {
                endpoint: endpoint.clone(),
                command: "SHUTDOWN".to_string(),
                message,
            }),
            _ => Ok(()),
        }
    }
}

fn protocol(endpoint: &Endpoint, message: String) -> DiscoveryError {
    DiscoveryError::Protocol {
        endpoint: endpoint.clone(),
        message,
    }
}
