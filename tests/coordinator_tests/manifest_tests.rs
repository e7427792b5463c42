//! Manifest Tests
//!
//! These tests verify:
//! - Manifests built from a PUT report
//! - Checksum and header validation
//! - Persistence through ManifestStore

use shardfs::coordinator::{
    Delivery, ManifestPart, ManifestStore, PartDelivery, PutReport, ShardManifest,
};
use shardfs::planner::ShardPlan;
use shardfs::ShardError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_report() -> PutReport {
    let plan = ShardPlan::for_nodes(11, &[1, 3]).unwrap();
    let deliveries = plan
        .shards()
        .iter()
        .enumerate()
        .map(|(i, shard)| PartDelivery {
            shard: *shard,
            delivery: if i == 0 {
                Delivery::Delivered {
                    ack: "STORED part_1_received_f (5 bytes)".to_string(),
                }
            } else {
                Delivery::Failed {
                    reason: "connection reset".to_string(),
                }
            },
        })
        .collect();

    PutReport {
        name: "f".to_string(),
        file_size: 11,
        deliveries,
    }
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_from_report() {
    let manifest = ShardManifest::from_report(&sample_report());

    assert_eq!(manifest.file_name, "f");
    assert_eq!(manifest.file_size, 11);
    assert_eq!(
        manifest.parts,
        vec![
            ManifestPart {
                part_index: 1,
                node_id: 1,
                offset: 0,
                length: 5,
                delivered: true,
            },
            ManifestPart {
                part_index: 2,
                node_id: 3,
                offset: 5,
                length: 6,
                delivered: false,
            },
        ]
    );
}

#[test]
fn test_parts_on_node() {
    let manifest = ShardManifest::from_report(&sample_report());

    let on_three: Vec<u32> = manifest.parts_on(3).map(|p| p.part_index).collect();
    assert_eq!(on_three, vec![2]);
    assert_eq!(manifest.parts_on(2).count(), 0);
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_serialize_deserialize() {
    let manifest = ShardManifest::from_report(&sample_report());
    let bytes = manifest.serialize().unwrap();

    assert_eq!(&bytes[..4], b"SHMF");
    assert_eq!(ShardManifest::deserialize(&bytes).unwrap(), manifest);
}

#[test]
fn test_corrupted_payload_fails_checksum() {
    let mut bytes = ShardManifest::from_report(&sample_report()).serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    match ShardManifest::deserialize(&bytes) {
        Err(ShardError::Manifest(msg)) => assert!(msg.contains("checksum")),
        other => panic!("Expected checksum failure, got {:?}", other),
    }
}

#[test]
fn test_bad_magic() {
    let mut bytes = ShardManifest::from_report(&sample_report()).serialize().unwrap();
    bytes[0] = b'X';

    assert!(matches!(ShardManifest::deserialize(&bytes), Err(ShardError::Manifest(_))));
}

#[test]
fn test_truncated() {
    let bytes = ShardManifest::from_report(&sample_report()).serialize().unwrap();

    assert!(matches!(ShardManifest::deserialize(&bytes[..8]), Err(ShardError::Manifest(_))));
    assert!(matches!(
        ShardManifest::deserialize(&bytes[..bytes.len() - 1]),
        Err(ShardError::Manifest(_))
    ));
}

// =============================================================================
// Store Tests
// =============================================================================

#[test]
fn test_store_save_load_remove() {
    let dir = TempDir::new().unwrap();
    let store = ManifestStore::open(dir.path()).unwrap();
    assert!(store.dir().ends_with(ManifestStore::DIR_NAME));

    let manifest = ShardManifest::from_report(&sample_report());
    store.save(&manifest).unwrap();

    assert_eq!(store.load("f").unwrap(), Some(manifest));
    assert!(store.remove("f").unwrap());
    assert_eq!(store.load("f").unwrap(), None);
    assert!(!store.remove("f").unwrap());
}

#[test]
fn test_store_rejects_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let store = ManifestStore::open(dir.path()).unwrap();
    std::fs::write(store.dir().join("f.manifest"), b"garbage").unwrap();

    assert!(matches!(store.load("f"), Err(ShardError::Manifest(_))));
}

#[test]
fn test_save_overwrites() {
    let dir = TempDir::new().unwrap();
    let store = ManifestStore::open(dir.path()).unwrap();

    let mut manifest = ShardManifest::from_report(&sample_report());
    store.save(&manifest).unwrap();
    manifest.file_size = 99;
    store.save(&manifest).unwrap();

    assert_eq!(store.load("f").unwrap().unwrap().file_size, 99);
}
