//! Storage Node Module
//!
//! The storage node's TCP service and the client the coordinator uses to
//! reach it.
//!
//! A node never interprets part names: it stores, serves and deletes files
//! by the exact names the coordinator sends, plus a PURGE that sweeps every
//! `part_<k>_received_<name>` for one logical name.

mod client;
mod service;

pub use client::{read_listing, DeleteReply, FetchReply, NodeClient};
pub use service::StorageNode;
