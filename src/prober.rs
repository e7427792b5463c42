//! Liveness Prober
//!
//! Decides which storage nodes take part in a PUT by trying to connect to
//! each of them, right now, with a bounded timeout.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::{NodeConfig, NodeRegistry};
use crate::error::{Result, ShardError};

/// A node that answered, with the connection it answered on
#[derive(Debug)]
pub struct LiveNode {
    pub node: NodeConfig,
    pub stream: TcpStream,
}

/// Probes the registry with a connect timeout
#[derive(Debug, Clone, Copy)]
pub struct Prober {
    connect_timeout: Duration,
}

impl Prober {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Connect to every node in registry order
    ///
    /// Nodes that do not answer are left out, with a log line and nothing
    /// else. The survivors keep registry order; that order, not the node id,
    /// decides which part each one receives.
    pub fn probe(&self, registry: &NodeRegistry) -> Vec<LiveNode> {
        let mut live = Vec::with_capacity(registry.len());
        for node in registry {
            match connect(node, self.connect_timeout) {
                Ok(stream) => {
                    tracing::debug!("{} is reachable", node);
                    live.push(LiveNode {
                        node: node.clone(),
                        stream,
                    });
                }
                Err(e) => tracing::warn!("Probe skipped: {}", e),
            }
        }
        tracing::info!("Probe found {}/{} storage nodes reachable", live.len(), registry.len());
        live
    }
}

/// Open a connection to `node`, trying each resolved address in turn
pub fn connect(node: &NodeConfig, timeout: Duration) -> Result<TcpStream> {
    let unreachable = |reason: String| ShardError::NodeUnreachable {
        node: node.id,
        addr: node.addr.clone(),
        reason,
    };

    let addrs = node
        .addr
        .to_socket_addrs()
        .map_err(|e| unreachable(format!("cannot resolve: {}", e)))?;

    let mut last_error = String::from("address resolves to nothing");
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(unreachable(last_error))
}
