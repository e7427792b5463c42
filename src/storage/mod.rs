//! Storage Module
//!
//! Flat, directory-backed file storage shared by the coordinator (full
//! copies) and the storage nodes (parts).
//!
//! ## Responsibilities
//! - Persist exactly the declared number of bytes, flag short transfers
//! - Serve files by exact name, with a `-1` style "absent" answer
//! - List regular files in directory order
//! - Delete by exact name, or every part of one logical file
//!
//! ## Directory Layout
//! ```text
//! coordinator/                 node_1/                      node_2/
//!   received_report.pdf          part_1_received_report.pdf   part_2_received_report.pdf
//!   manifests/
//! ```

pub mod naming;
mod store;

pub use store::{LocalStore, StoreOutcome};
