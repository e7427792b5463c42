//! Coordinator Module
//!
//! Accepts whole files, shards them over the storage nodes reachable at that
//! moment, reassembles them on GET and chases their parts down on RM.
//!
//! ## Consistency
//! - Placement is positional by default: part `i` lives on registry node
//!   `i`. If the set of reachable nodes changes between PUT and GET, indices
//!   silently misalign. `PlacementMode::Manifest` reads the recorded
//!   placement instead.
//! - Concurrent PUTs of one name race; last writer wins unless
//!   `serialize_same_name` is set.

mod locks;
mod manifest;
mod outcome;
mod service;

pub use locks::NameLocks;
pub use manifest::{ManifestPart, ManifestStore, ShardManifest};
pub use outcome::{
    Delivery, FetchOutcome, GetReport, LocalRemoval, NodeRemoval, NodeRemovalReport, PartDelivery,
    PartFetch, PutReport, RmReport,
};
pub use service::Coordinator;
