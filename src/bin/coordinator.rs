//! ShardFS Coordinator Binary
//!
//! Accepts client files and shards them over the configured storage nodes.

use clap::{Parser, ValueEnum};
use shardfs::config::{FanoutMode, NodeSpec, PlacementMode};
use shardfs::network::{Server, ServerOptions};
use shardfs::{Coordinator, CoordinatorConfig, NodeRegistry};
use tracing_subscriber::{fmt, EnvFilter};

/// ShardFS Coordinator
#[derive(Parser, Debug)]
#[command(name = "shardfs-coordinator")]
#[command(about = "Sharded file store coordinator")]
#[command(version)]
struct Args {
    /// Directory for full copies and manifests
    #[arg(short, long, default_value = "./shardfs_coordinator")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    listen: String,

    /// Storage node as HOST:PORT[=DIR]; repeat in registry order
    #[arg(short, long = "node")]
    nodes: Vec<NodeSpec>,

    /// Connect timeout for probes and node connections, in milliseconds
    #[arg(long, default_value = "2000")]
    probe_timeout_ms: u64,

    /// Read/write timeout on node transfers, in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    transfer_timeout_ms: u64,

    /// How GET and RM locate parts
    #[arg(long, value_enum, default_value = "positional")]
    placement: Placement,

    /// Talk to all nodes at once instead of one after another
    #[arg(long)]
    parallel: bool,

    /// Serialize PUT and RM on the same file name
    #[arg(long)]
    serialize_names: bool,

    /// Only sweep part indices on RM, skip the per-node cascade delete
    #[arg(long)]
    no_cascade: bool,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Placement {
    Positional,
    Manifest,
}

impl From<Placement> for PlacementMode {
    fn from(p: Placement) -> Self {
        match p {
            Placement::Positional => PlacementMode::Positional,
            Placement::Manifest => PlacementMode::Manifest,
        }
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shardfs=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("ShardFS Coordinator v{}", shardfs::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let registry = NodeRegistry::new(args.nodes);
    for node in &registry {
        tracing::info!("Registered {}", node);
    }

    let config = CoordinatorConfig::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .registry(registry)
        .probe_timeout_ms(args.probe_timeout_ms)
        .transfer_timeout_ms(args.transfer_timeout_ms)
        .placement(args.placement.into())
        .fanout(if args.parallel {
            FanoutMode::Parallel
        } else {
            FanoutMode::Sequential
        })
        .serialize_same_name(args.serialize_names)
        .cascade_delete(!args.no_cascade)
        .build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let coordinator = match Coordinator::open(config.clone()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to open coordinator: {}", e);
            std::process::exit(1);
        }
    };

    let options = ServerOptions {
        max_connections: config.max_connections,
        timeout: config.transfer_timeout(),
    };
    let server = match Server::bind(&config.listen_addr, coordinator, options) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Coordinator stopped");
}
