//! Storage Node Tests
//!
//! Runs a real node on an ephemeral port and drives it through NodeClient
//! and, where the client would hide the reply, raw frames.

#[path = "../common/mod.rs"]
mod common;

use std::io::Cursor;
use std::net::TcpStream;

use common::{dead_addr, list_node, node_client, node_config, spawn_node};
use shardfs::node::{DeleteReply, FetchReply};
use shardfs::protocol::{read_i64, read_string, write_command, write_string, Command};
use shardfs::ShardError;

// =============================================================================
// PUT/GET Tests
// =============================================================================

#[test]
fn test_store_then_fetch() {
    let node = spawn_node();
    let config = node_config(1, &node.addr());
    let client = node_client();

    let data = common::pattern(4096);
    let ack = client
        .store(&config, "part_1_received_f", &mut Cursor::new(data.clone()), data.len() as u64)
        .unwrap();
    assert_eq!(ack, "STORED part_1_received_f (4096 bytes)");

    // Stored under exactly the name sent
    let on_disk = std::fs::read(node.path().join("part_1_received_f")).unwrap();
    assert_eq!(on_disk, data);

    let mut fetched = Vec::new();
    let reply = client.fetch(&config, "part_1_received_f", &mut fetched).unwrap();
    assert_eq!(reply, FetchReply::Complete(4096));
    assert_eq!(fetched, data);
}

#[test]
fn test_store_empty_part() {
    let node = spawn_node();
    let config = node_config(1, &node.addr());
    let client = node_client();

    client
        .store(&config, "part_1_received_e", &mut Cursor::new(Vec::new()), 0)
        .unwrap();

    let mut fetched = Vec::new();
    let reply = client.fetch(&config, "part_1_received_e", &mut fetched).unwrap();
    assert_eq!(reply, FetchReply::Complete(0));
    assert!(fetched.is_empty());
}

#[test]
fn test_fetch_missing_is_not_found() {
    let node = spawn_node();
    let config = node_config(1, &node.addr());

    let mut fetched = Vec::new();
    let reply = node_client().fetch(&config, "nope", &mut fetched).unwrap();
    assert_eq!(reply, FetchReply::NotFound);
    assert!(fetched.is_empty());
}

#[test]
fn test_get_missing_sends_minus_one() {
    let node = spawn_node();
    let mut stream = TcpStream::connect(node.addr()).unwrap();
    write_command(&mut stream, Command::Get).unwrap();
    write_string(&mut stream, "nope").unwrap();

    assert_eq!(read_i64(&mut stream).unwrap(), -1);
}

#[test]
fn test_store_invalid_name_is_refused() {
    let node = spawn_node();
    let config = node_config(1, &node.addr());

    let result = node_client().store(&config, "../evil", &mut Cursor::new(vec![1, 2]), 2);
    match result {
        Err(ShardError::Network(ack)) => assert!(ack.starts_with("ERROR:")),
        other => panic!("Expected refusal, got {:?}", other),
    }
    assert!(node.node.store().list().unwrap().is_empty());
}

#[test]
fn test_store_short_source_is_partial_transfer() {
    let node = spawn_node();
    let config = node_config(1, &node.addr());

    let result = node_client().store(&config, "part_1_received_s", &mut Cursor::new(vec![7; 10]), 50);
    assert!(matches!(
        result,
        Err(ShardError::PartialTransfer {
            expected: 50,
            received: 10,
            ..
        })
    ));
}

// =============================================================================
// RM/PURGE Tests
// =============================================================================

#[test]
fn test_delete_reports_deleted_then_not_found() {
    let node = spawn_node();
    let config = node_config(1, &node.addr());
    let client = node_client();

    client
        .store(&config, "part_1_received_d", &mut Cursor::new(vec![1; 3]), 3)
        .unwrap();

    let first = client.delete(&config, "part_1_received_d").unwrap();
    assert_eq!(first, DeleteReply::Deleted("DELETED part_1_received_d".to_string()));

    let second = client.delete(&config, "part_1_received_d").unwrap();
    assert_eq!(second, DeleteReply::NotFound);
}

#[test]
fn test_purge_removes_every_part() {
    let node = spawn_node();
    let config = node_config(1, &node.addr());
    let client = node_client();

    for name in ["part_1_received_p", "part_4_received_p", "part_1_received_q"] {
        client.store(&config, name, &mut Cursor::new(vec![0; 2]), 2).unwrap();
    }

    assert_eq!(client.purge(&config, "p").unwrap(), 2);
    assert_eq!(list_node(&node.addr()), vec!["part_1_received_q".to_string()]);
    assert_eq!(client.purge(&config, "p").unwrap(), 0);
}

// =============================================================================
// LS / Framing Tests
// =============================================================================

#[test]
fn test_list_counts_regular_files() {
    let node = spawn_node();
    let config = node_config(1, &node.addr());
    let client = node_client();

    assert!(list_node(&node.addr()).is_empty());

    client.store(&config, "a", &mut Cursor::new(vec![1]), 1).unwrap();
    client.store(&config, "b", &mut Cursor::new(vec![2]), 1).unwrap();
    std::fs::create_dir(node.path().join("dir")).unwrap();

    let mut names = list_node(&node.addr());
    names.sort();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_unknown_command_gets_error_reply() {
    let node = spawn_node();
    let mut stream = TcpStream::connect(node.addr()).unwrap();
    write_string(&mut stream, "FROB").unwrap();

    let reply = read_string(&mut stream).unwrap();
    assert_eq!(reply, "ERROR: unknown command FROB");
}

#[test]
fn test_silent_connection_is_harmless() {
    let node = spawn_node();
    drop(TcpStream::connect(node.addr()).unwrap());

    // Still serving afterwards
    assert!(list_node(&node.addr()).is_empty());
}

#[test]
fn test_unreachable_node() {
    let config = node_config(7, &dead_addr());

    let result = node_client().fetch(&config, "part_1_received_x", &mut Vec::new());
    match result {
        Err(ShardError::NodeUnreachable { node, .. }) => assert_eq!(node, 7),
        other => panic!("Expected NodeUnreachable, got {:?}", other),
    }
}
