//! Configuration for ShardFS
//!
//! Explicit configuration structs with sensible defaults, built once at
//! startup and handed to each service.

use std::fmt;
use std::net::ToSocketAddrs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, ShardError};

// =============================================================================
// Node Registry
// =============================================================================

/// One configured storage node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// 1-based position in the registry
    pub id: u32,

    /// `host:port` of the node's listener
    pub addr: String,

    /// Directory the node serves, informational only
    pub directory: Option<PathBuf>,
}

impl fmt::Display for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} ({})", self.id, self.addr)
    }
}

/// A node address as given on the command line: `HOST:PORT[=DIR]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub addr: String,
    pub directory: Option<PathBuf>,
}

impl FromStr for NodeSpec {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, directory) = match s.split_once('=') {
            Some((addr, dir)) if !dir.is_empty() => (addr, Some(PathBuf::from(dir))),
            Some((addr, _)) => (addr, None),
            None => (s, None),
        };

        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| ShardError::Config(format!("node address {:?} has no port", addr)))?;
        if host.is_empty() {
            return Err(ShardError::Config(format!("node address {:?} has no host", addr)));
        }
        port.parse::<u16>()
            .map_err(|_| ShardError::Config(format!("node address {:?} has a bad port", addr)))?;

        Ok(Self {
            addr: addr.to_string(),
            directory,
        })
    }
}

/// Ordered, immutable list of storage nodes
///
/// Registry order is the only link between a part index and the node that
/// holds it, so it never changes after startup. Clones share the same list.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: Arc<[NodeConfig]>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self {
            nodes: Arc::from(Vec::new()),
        }
    }
}

impl NodeRegistry {
    /// Build a registry, numbering nodes from 1 in the given order
    pub fn new(specs: impl IntoIterator<Item = NodeSpec>) -> Self {
        let nodes: Vec<NodeConfig> = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| NodeConfig {
                id: i as u32 + 1,
                addr: spec.addr,
                directory: spec.directory,
            })
            .collect();
        Self {
            nodes: nodes.into(),
        }
    }

    /// Build a registry from bare `host:port` addresses
    pub fn from_addrs<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(addrs.into_iter().map(|addr| NodeSpec {
            addr: addr.into(),
            directory: None,
        }))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeConfig> {
        self.nodes.iter()
    }

    /// Look up a node by its id
    pub fn get(&self, id: u32) -> Option<&NodeConfig> {
        id.checked_sub(1)
            .and_then(|i| self.nodes.get(i as usize))
    }
}

impl<'a> IntoIterator for &'a NodeRegistry {
    type Item = &'a NodeConfig;
    type IntoIter = std::slice::Iter<'a, NodeConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Coordinator Configuration
// =============================================================================

/// How GET and RM locate the parts of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMode {
    /// Node at registry position `i` holds part `i`
    Positional,

    /// Use the shard manifest written at PUT time, positional if absent
    Manifest,
}

/// How per-node transfers are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanoutMode {
    /// One node after another, in registry order
    Sequential,

    /// One scoped thread per node; results still collected in part order
    Parallel,
}

/// Main configuration for the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory for stored files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── received_<name>    (full copies)
    ///     └── manifests/         (shard manifests)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connect timeout for probing and node connections (milliseconds)
    pub probe_timeout_ms: u64,

    /// Read/write timeout once connected (milliseconds, 0 = none)
    pub transfer_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Sharding Configuration
    // -------------------------------------------------------------------------
    /// Storage nodes in registry order
    pub registry: NodeRegistry,

    pub placement: PlacementMode,

    pub fanout: FanoutMode,

    /// Serialize PUT/RM on the same file name
    pub serialize_same_name: bool,

    /// Follow RM's index sweep with a cascade delete on every node
    pub cascade_delete: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./shardfs_coordinator"),
            listen_addr: "127.0.0.1:12345".to_string(),
            max_connections: 1024,
            probe_timeout_ms: 2000,
            transfer_timeout_ms: 0,
            registry: NodeRegistry::default(),
            placement: PlacementMode::Positional,
            fanout: FanoutMode::Sequential,
            serialize_same_name: false,
            cascade_delete: true,
        }
    }
}

impl CoordinatorConfig {
    /// Create a new config builder
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }

    pub fn transfer_timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.transfer_timeout_ms)
    }

    /// Check the settings that would otherwise fail late
    pub fn validate(&self) -> Result<()> {
        validate_listen_addr(&self.listen_addr)?;
        for node in &self.registry {
            NodeSpec::from_str(&node.addr)?;
        }
        if self.max_connections == 0 {
            return Err(ShardError::Config("max_connections must be positive".into()));
        }
        Ok(())
    }
}

/// Builder for CoordinatorConfig
#[derive(Default)]
pub struct CoordinatorConfigBuilder {
    config: CoordinatorConfig,
}

impl CoordinatorConfigBuilder {
    /// Set the coordinator's storage directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the node registry
    pub fn registry(mut self, registry: NodeRegistry) -> Self {
        self.config.registry = registry;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn probe_timeout_ms(mut self, ms: u64) -> Self {
        self.config.probe_timeout_ms = ms;
        self
    }

    /// Set the transfer timeout (in milliseconds, 0 disables it)
    pub fn transfer_timeout_ms(mut self, ms: u64) -> Self {
        self.config.transfer_timeout_ms = ms;
        self
    }

    pub fn placement(mut self, placement: PlacementMode) -> Self {
        self.config.placement = placement;
        self
    }

    pub fn fanout(mut self, fanout: FanoutMode) -> Self {
        self.config.fanout = fanout;
        self
    }

    pub fn serialize_same_name(mut self, enabled: bool) -> Self {
        self.config.serialize_same_name = enabled;
        self
    }

    pub fn cascade_delete(mut self, enabled: bool) -> Self {
        self.config.cascade_delete = enabled;
        self
    }

    pub fn build(self) -> CoordinatorConfig {
        self.config
    }
}

// =============================================================================
// Storage Node Configuration
// =============================================================================

/// Configuration for one storage node process
#[derive(Debug, Clone)]
pub struct NodeServiceConfig {
    /// Directory holding this node's parts
    pub data_dir: PathBuf,

    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent connections
    pub max_connections: usize,

    /// Read/write timeout per connection (milliseconds, 0 = none)
    pub transfer_timeout_ms: u64,
}

impl Default for NodeServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./shardfs_node"),
            listen_addr: "127.0.0.1:12346".to_string(),
            max_connections: 1024,
            transfer_timeout_ms: 0,
        }
    }
}

impl NodeServiceConfig {
    /// Create a new config builder
    pub fn builder() -> NodeServiceConfigBuilder {
        NodeServiceConfigBuilder::default()
    }

    pub fn transfer_timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.transfer_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        validate_listen_addr(&self.listen_addr)?;
        if self.max_connections == 0 {
            return Err(ShardError::Config("max_connections must be positive".into()));
        }
        Ok(())
    }
}

/// Builder for NodeServiceConfig
#[derive(Default)]
pub struct NodeServiceConfigBuilder {
    config: NodeServiceConfig,
}

impl NodeServiceConfigBuilder {
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    pub fn transfer_timeout_ms(mut self, ms: u64) -> Self {
        self.config.transfer_timeout_ms = ms;
        self
    }

    pub fn build(self) -> NodeServiceConfig {
        self.config
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn validate_listen_addr(addr: &str) -> Result<()> {
    let mut resolved = addr
        .to_socket_addrs()
        .map_err(|e| ShardError::Config(format!("bad listen address {:?}: {}", addr, e)))?;
    match resolved.next() {
        Some(_) => Ok(()),
        None => Err(ShardError::Config(format!("listen address {:?} resolves to nothing", addr))),
    }
}
