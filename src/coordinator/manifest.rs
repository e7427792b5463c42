//! Shard Manifest
//!
//! Records where each part of a file went, so GET and RM do not have to
//! guess from registry order.
//!
//! ## File Format
//! ```text
//! ┌───────────┬──────────┬──────────┬─────────────────────┐
//! │ Magic (4) │ CRC (4)  │ Len (4)  │ bincode payload     │
//! └───────────┴──────────┴──────────┴─────────────────────┘
//! ```

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShardError};
use crate::storage::naming;

use super::outcome::PutReport;

const MAGIC: &[u8; 4] = b"SHMF";
const HEADER_SIZE: usize = 12;

/// One part as placed at PUT time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPart {
    pub part_index: u32,
    pub node_id: u32,
    pub offset: u64,
    pub length: u64,

    /// Whether the node acknowledged the part
    pub delivered: bool,
}

/// Placement of every part of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardManifest {
    pub file_name: String,
    pub file_size: u64,

    /// Unix millis when the PUT finished
    pub created_at_ms: u64,

    /// In part order
    pub parts: Vec<ManifestPart>,
}

impl ShardManifest {
    pub fn from_report(report: &PutReport) -> Self {
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            file_name: report.name.clone(),
            file_size: report.file_size,
            created_at_ms,
            parts: report
                .deliveries
                .iter()
                .map(|d| ManifestPart {
                    part_index: d.shard.span.index,
                    node_id: d.shard.node_id,
                    offset: d.shard.span.offset,
                    length: d.shard.span.length,
                    delivered: d.is_delivered(),
                })
                .collect(),
        }
    }

    /// Parts placed on `node_id`
    pub fn parts_on(&self, node_id: u32) -> impl Iterator<Item = &ManifestPart> {
        self.parts.iter().filter(move |p| p.node_id == node_id)
    }

    /// Encode with header and checksum
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)
            .map_err(|e| ShardError::Manifest(format!("encode failed: {}", e)))?;
        let crc = crc32fast::hash(&payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&crc.to_be_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode and verify
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ShardError::Manifest(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(ShardError::Manifest("bad magic".to_string()));
        }

        let crc = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let len = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let payload = bytes
            .get(HEADER_SIZE..HEADER_SIZE + len)
            .ok_or_else(|| ShardError::Manifest(format!("truncated payload: expected {} bytes", len)))?;

        if crc32fast::hash(payload) != crc {
            return Err(ShardError::Manifest("checksum mismatch".to_string()));
        }

        bincode::deserialize(payload)
            .map_err(|e| ShardError::Manifest(format!("decode failed: {}", e)))
    }
}

/// Directory of manifests, one file per logical name
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub const DIR_NAME: &'static str = "manifests";
    const EXTENSION: &'static str = "manifest";

    /// Open `<data_dir>/manifests`, creating it if needed
    pub fn open(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join(Self::DIR_NAME);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        naming::validate_name(name)?;
        Ok(self.dir.join(format!("{}.{}", name, Self::EXTENSION)))
    }

    /// Write atomically: temp file, fsync, rename
    pub fn save(&self, manifest: &ShardManifest) -> Result<()> {
        let path = self.path_for(&manifest.file_name)?;
        let tmp = path.with_extension("tmp");

        let bytes = manifest.serialize()?;
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Option<ShardManifest>> {
        let path = self.path_for(name)?;
        match fs::read(&path) {
            Ok(bytes) => ShardManifest::deserialize(&bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop the manifest for `name`; `false` if there was none
    pub fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
