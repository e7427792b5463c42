//! Prober Tests

#[path = "../common/mod.rs"]
mod common;

use std::time::{Duration, Instant};

use common::{dead_addr, node_config, spawn_nodes};
use shardfs::prober::{connect, Prober};
use shardfs::{NodeRegistry, ShardError};

#[test]
fn test_probe_keeps_registry_order_and_skips_dead() {
    let nodes = spawn_nodes(2);
    let registry = NodeRegistry::from_addrs(vec![nodes[0].addr(), dead_addr(), nodes[1].addr()]);

    let live = Prober::new(Duration::from_millis(500)).probe(&registry);
    let ids: Vec<u32> = live.iter().map(|l| l.node.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn test_probe_all_dead() {
    let registry = NodeRegistry::from_addrs(vec![dead_addr(), dead_addr()]);

    let started = Instant::now();
    let live = Prober::new(Duration::from_millis(300)).probe(&registry);

    assert!(live.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_probe_empty_registry() {
    let live = Prober::new(Duration::from_millis(100)).probe(&NodeRegistry::default());
    assert!(live.is_empty());
}

#[test]
fn test_connect_reports_node() {
    let config = node_config(4, &dead_addr());

    match connect(&config, Duration::from_millis(300)) {
        Err(ShardError::NodeUnreachable { node, addr, .. }) => {
            assert_eq!(node, 4);
            assert_eq!(addr, config.addr);
        }
        other => panic!("Expected NodeUnreachable, got {:?}", other),
    }
}
