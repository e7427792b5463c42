//! Tests for LocalStore
//!
//! These tests verify:
//! - Storing exactly the declared byte count
//! - Short sources and PartialTransfer
//! - Range reads, listing and deletion
//! - Cascade delete of parts

use std::io::{Cursor, Read};

use shardfs::storage::LocalStore;
use shardfs::ShardError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_store() -> (TempDir, LocalStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = LocalStore::open(temp_dir.path()).unwrap();
    (temp_dir, store)
}

fn put(store: &LocalStore, name: &str, data: &[u8]) {
    let outcome = store
        .store(name, data.len() as u64, &mut Cursor::new(data.to_vec()))
        .unwrap();
    assert!(outcome.is_complete());
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("store");

    assert!(!path.exists());
    let store = LocalStore::open(&path).unwrap();

    assert!(path.is_dir());
    assert_eq!(store.dir(), path.as_path());
}

// =============================================================================
// Store Tests
// =============================================================================

#[test]
fn test_store_exact_size() {
    let (_dir, store) = setup_store();
    put(&store, "a.bin", b"hello world");

    assert_eq!(store.len_of("a.bin").unwrap(), Some(11));
    let bytes = std::fs::read(store.path_of("a.bin").unwrap()).unwrap();
    assert_eq!(bytes, b"hello world");
}

#[test]
fn test_store_reads_no_more_than_declared() {
    let (_dir, store) = setup_store();
    let mut src = Cursor::new(b"0123456789".to_vec());

    let outcome = store.store("a.bin", 4, &mut src).unwrap();
    assert_eq!(outcome.written, 4);

    let mut rest = String::new();
    src.read_to_string(&mut rest).unwrap();
    assert_eq!(rest, "456789");
}

#[test]
fn test_store_zero_bytes_creates_empty_file() {
    let (_dir, store) = setup_store();
    put(&store, "empty", b"");

    assert_eq!(store.len_of("empty").unwrap(), Some(0));
}

#[test]
fn test_store_overwrites() {
    let (_dir, store) = setup_store();
    put(&store, "a.bin", b"a much longer first version");
    put(&store, "a.bin", b"short");

    assert_eq!(store.len_of("a.bin").unwrap(), Some(5));
}

#[test]
fn test_short_source_keeps_partial_file() {
    let (_dir, store) = setup_store();

    let outcome = store
        .store("a.bin", 100, &mut Cursor::new(b"only ten b".to_vec()))
        .unwrap();
    assert!(!outcome.is_complete());
    assert_eq!(outcome.written, 10);
    assert_eq!(store.len_of("a.bin").unwrap(), Some(10));

    match outcome.into_result() {
        Err(ShardError::PartialTransfer {
            name,
            expected,
            received,
        }) => {
            assert_eq!(name, "a.bin");
            assert_eq!(expected, 100);
            assert_eq!(received, 10);
        }
        other => panic!("Expected PartialTransfer, got {:?}", other),
    }
}

#[test]
fn test_store_rejects_path_traversal() {
    let (_dir, store) = setup_store();
    let result = store.store("../escape", 1, &mut Cursor::new(vec![1]));

    assert!(matches!(result, Err(ShardError::InvalidName(_))));
}

// =============================================================================
// Read Tests
// =============================================================================

#[test]
fn test_fetch_missing_is_none() {
    let (_dir, store) = setup_store();
    assert!(store.fetch("nope").unwrap().is_none());
    assert!(!store.exists("nope").unwrap());
}

#[test]
fn test_read_range() {
    let (_dir, store) = setup_store();
    put(&store, "a.bin", b"abcdefghijk");

    let mut out = Vec::new();
    store.read_range("a.bin", 5, 6).unwrap().read_to_end(&mut out).unwrap();
    assert_eq!(out, b"fghijk");

    let mut out = Vec::new();
    store.read_range("a.bin", 0, 0).unwrap().read_to_end(&mut out).unwrap();
    assert!(out.is_empty());
}

#[test]
fn test_read_range_missing_file() {
    let (_dir, store) = setup_store();
    assert!(matches!(store.read_range("nope", 0, 1), Err(ShardError::NotFound(_))));
}

// =============================================================================
// List/Delete Tests
// =============================================================================

#[test]
fn test_list_skips_directories() {
    let (dir, store) = setup_store();
    put(&store, "one", b"1");
    put(&store, "two", b"22");
    std::fs::create_dir(dir.path().join("subdir")).unwrap();

    let mut names = store.list().unwrap();
    names.sort();
    assert_eq!(names, vec!["one", "two"]);
}

#[test]
fn test_list_empty() {
    let (_dir, store) = setup_store();
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_delete() {
    let (_dir, store) = setup_store();
    put(&store, "a.bin", b"x");

    assert!(store.delete("a.bin").unwrap());
    assert!(!store.exists("a.bin").unwrap());
    assert!(!store.delete("a.bin").unwrap());
}

#[test]
fn test_delete_cascade_only_touches_matching_parts() {
    let (_dir, store) = setup_store();
    put(&store, "part_1_received_a.txt", b"1");
    put(&store, "part_3_received_a.txt", b"3");
    put(&store, "part_2_received_a.txt.bak", b"keep");
    put(&store, "part_1_received_b.txt", b"keep");
    put(&store, "received_a.txt", b"keep");

    assert_eq!(store.delete_cascade("a.txt").unwrap(), 2);

    let mut names = store.list().unwrap();
    names.sort();
    assert_eq!(
        names,
        vec!["part_1_received_b.txt", "part_2_received_a.txt.bak", "received_a.txt"]
    );
    assert_eq!(store.delete_cascade("a.txt").unwrap(), 0);
}
