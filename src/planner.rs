//! Shard Planner
//!
//! Splits a file of `S` bytes across `N` nodes: every part gets `S / N`
//! bytes and the last one also takes the `S % N` remainder.
//!
//! ```text
//! S = 11, N = 2
//! ┌───────────────┬──────────────────┐
//! │ part 1: 0..5  │ part 2: 5..11    │
//! └───────────────┴──────────────────┘
//! ```

use crate::error::{Result, ShardError};

/// One contiguous byte range of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSpan {
    /// 1-based position in the file
    pub index: u32,

    pub offset: u64,

    pub length: u64,
}

impl PartSpan {
    /// One past the last byte
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Compute the part layout for `file_size` bytes over `node_count` nodes
pub fn plan(file_size: u64, node_count: usize) -> Result<Vec<PartSpan>> {
    if node_count == 0 {
        return Err(ShardError::NoNodesAvailable);
    }

    let count = node_count as u64;
    let base = file_size / count;
    let remainder = file_size % count;

    let mut spans = Vec::with_capacity(node_count);
    let mut offset = 0;
    for i in 0..node_count {
        let length = if i + 1 == node_count { base + remainder } else { base };
        spans.push(PartSpan {
            index: i as u32 + 1,
            offset,
            length,
        });
        offset += length;
    }

    debug_assert_eq!(offset, file_size);
    Ok(spans)
}

/// A part bound to the node that receives it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    pub node_id: u32,
    pub span: PartSpan,
}

/// The ephemeral node → part mapping for one PUT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlan {
    file_size: u64,
    shards: Vec<Shard>,
}

impl ShardPlan {
    /// Plan `file_size` bytes over `node_ids`, in the order given
    pub fn for_nodes(file_size: u64, node_ids: &[u32]) -> Result<Self> {
        let shards = plan(file_size, node_ids.len())?
            .into_iter()
            .zip(node_ids)
            .map(|(span, &node_id)| Shard { node_id, span })
            .collect();
        Ok(Self { file_size, shards })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}
