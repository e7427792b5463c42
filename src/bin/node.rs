//! ShardFS Storage Node Binary
//!
//! Serves one directory of parts to the coordinator.

use clap::Parser;
use shardfs::network::{Server, ServerOptions};
use shardfs::{NodeServiceConfig, StorageNode};
use tracing_subscriber::{fmt, EnvFilter};

/// ShardFS Storage Node
#[derive(Parser, Debug)]
#[command(name = "shardfs-node")]
#[command(about = "Sharded file store storage node")]
#[command(version)]
struct Args {
    /// Directory holding this node's files
    #[arg(short, long, default_value = "./shardfs_node")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:12346")]
    listen: String,

    /// Read/write timeout per connection, in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    transfer_timeout_ms: u64,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shardfs=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("ShardFS Storage Node v{}", shardfs::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let config = NodeServiceConfig::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .transfer_timeout_ms(args.transfer_timeout_ms)
        .build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let node = match StorageNode::open(&config) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!("Failed to open storage directory: {}", e);
            std::process::exit(1);
        }
    };

    let options = ServerOptions {
        max_connections: config.max_connections,
        timeout: config.transfer_timeout(),
    };
    let server = match Server::bind(&config.listen_addr, node, options) {
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

    tracing::info!("Storage node stopped");
}
