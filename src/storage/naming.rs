//! File naming
//!
//! The on-disk name of a file is its only address: coordinator and nodes
//! must agree on these exactly.
//!
//! ```text
//! received_<name>             full copy on the coordinator
//! part_<index>_received_<name> one part on a storage node, index from 1
//! ```

use crate::error::{Result, ShardError};
use crate::protocol::MAX_STRING_LEN;

pub const STORED_PREFIX: &str = "received_";
pub const PART_PREFIX: &str = "part_";

/// Reject names that could escape the storage directory or not fit a frame
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name.len() > MAX_STRING_LEN - STORED_PREFIX.len() - PART_PREFIX.len() - 12;
    if bad {
        return Err(ShardError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Name of the coordinator's full copy of `name`
pub fn stored_name(name: &str) -> String {
    format!("{}{}", STORED_PREFIX, name)
}

/// Name of part `index` of `name`
pub fn part_name(index: u32, name: &str) -> String {
    format!("{}{}_{}{}", PART_PREFIX, index, STORED_PREFIX, name)
}

/// Split a part file name into its index and logical name
pub fn parse_part_name(file_name: &str) -> Option<(u32, &str)> {
    let rest = file_name.strip_prefix(PART_PREFIX)?;
    let digits = rest.find(|c: char| !c.is_ascii_digit())?;
    if digits == 0 {
        return None;
    }
    let index = rest[..digits].parse().ok()?;
    let logical = rest[digits..].strip_prefix('_')?.strip_prefix(STORED_PREFIX)?;
    (!logical.is_empty()).then_some((index, logical))
}

/// Whether `file_name` is some part of `logical`
pub fn is_part_of(file_name: &str, logical: &str) -> bool {
    matches!(parse_part_name(file_name), Some((_, name)) if name == logical)
}
