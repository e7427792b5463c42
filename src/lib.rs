//! # ShardFS
//!
//! A sharded file store:
//! - A coordinator keeps a full copy of every file it accepts
//! - Each file is split into contiguous parts over the storage nodes that
//!   answer a liveness probe at PUT time
//! - GET reassembles the parts in order, RM chases them down on every node
//! - Per-node failures degrade results instead of failing operations
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                              │
//! │               (one command per connection)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ PUT / GET / LS / RM
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Coordinator                              │
//! │     received_<name>   ·   Prober   ·   Planner   ·  Manifest│
//! └──────┬──────────────────────┬──────────────────────┬────────┘
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//!  ┌───────────┐          ┌───────────┐          ┌───────────┐
//!  │  Node 1   │          │  Node 2   │   ...    │  Node N   │
//!  │ part_1_.. │          │ part_2_.. │          │ part_N_.. │
//!  └───────────┘          └───────────┘          └───────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod storage;
pub mod network;
pub mod prober;
pub mod planner;
pub mod node;
pub mod coordinator;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ShardError, Result};
pub use config::{CoordinatorConfig, NodeRegistry, NodeServiceConfig};
pub use coordinator::Coordinator;
pub use node::StorageNode;
pub use client::Client;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ShardFS
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
