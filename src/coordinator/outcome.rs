//! Operation outcomes
//!
//! Per-node results are values, not errors: a node that fails degrades the
//! result and the operation carries on. These reports are what the wire
//! handlers turn into replies and what tests assert on.

use crate::planner::Shard;

// =============================================================================
// PUT
// =============================================================================

/// What happened to one planned part
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The node acknowledged the part
    Delivered { ack: String },

    /// The node was reachable at probe time but the send failed; not retried
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDelivery {
    pub shard: Shard,
    pub delivery: Delivery,
}

impl PartDelivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self.delivery, Delivery::Delivered { .. })
    }
}

/// Result of a PUT that reached the fan-out stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReport {
    pub name: String,
    pub file_size: u64,

    /// In part order
    pub deliveries: Vec<PartDelivery>,
}

impl PutReport {
    pub fn delivered(&self) -> usize {
        self.deliveries.iter().filter(|d| d.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.deliveries.len() - self.delivered()
    }

    /// Acknowledgment sent to the client; still a success when parts failed
    pub fn ack_message(&self) -> String {
        let total = self.deliveries.len();
        match self.failed() {
            0 => format!(
                "File {} received and distributed to {} storage node(s)",
                self.name, total
            ),
            failed => format!(
                "File {} received and distributed to {} of {} storage node(s); {} part(s) not delivered",
                self.name,
                self.delivered(),
                total,
                failed
            ),
        }
    }
}

// =============================================================================
// GET
// =============================================================================

/// What happened when fetching one part
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// All announced bytes arrived
    Fetched(u64),

    /// The node answered with the -1 sentinel
    NotFound,

    /// Could not connect
    Unreachable(String),

    /// Fewer bytes than announced; what arrived is kept
    Truncated { expected: u64, received: u64 },

    /// Connected, then the exchange broke; nothing is kept
    Failed(String),
}

impl FetchOutcome {
    /// Whether this part put anything into the reassembled file
    pub fn contributed(&self) -> bool {
        matches!(self, FetchOutcome::Fetched(_) | FetchOutcome::Truncated { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartFetch {
    pub node_id: u32,
    pub part_index: u32,
    pub outcome: FetchOutcome,
}

/// Result of a GET
///
/// `data` is every contributing part concatenated in ascending order. It is
/// not checked against the size the file had at PUT time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetReport {
    pub name: String,
    pub data: Vec<u8>,
    pub fetches: Vec<PartFetch>,
}

impl GetReport {
    /// No part answered with data
    pub fn is_total_failure(&self) -> bool {
        !self.fetches.iter().any(|f| f.outcome.contributed())
    }

    /// Parts that left a hole in `data`
    pub fn missing_parts(&self) -> impl Iterator<Item = &PartFetch> {
        self.fetches
            .iter()
            .filter(|f| !matches!(f.outcome, FetchOutcome::Fetched(_)))
    }
}

// =============================================================================
// RM
// =============================================================================

/// Fate of the coordinator's own copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalRemoval {
    Deleted,
    NotFound,
    Failed(String),
}

/// What one storage node did during RM
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRemoval {
    /// Could not talk to the node at all
    Unreachable(String),

    Visited {
        /// Confirmation for the node's full copy, if it had one
        full_copy: Option<String>,

        /// Confirmation line per deleted part
        parts_deleted: Vec<String>,

        /// Error lines from the node or the connection
        errors: Vec<String>,

        /// Parts swept by the cascade delete
        purged: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRemovalReport {
    pub node_id: u32,
    pub removal: NodeRemoval,
}

/// Result of an RM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RmReport {
    pub name: String,
    pub local: LocalRemoval,

    /// In registry order
    pub nodes: Vec<NodeRemovalReport>,
}

impl RmReport {
    /// Total parts removed across all nodes
    pub fn parts_deleted(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| match &n.removal {
                NodeRemoval::Visited {
                    parts_deleted,
                    purged,
                    ..
                } => parts_deleted.len() + *purged as usize,
                NodeRemoval::Unreachable(_) => 0,
            })
            .sum()
    }

    /// Lines relayed to the client, one STRING frame each
    pub fn status_lines(&self) -> Vec<String> {
        let stored = crate::storage::naming::stored_name(&self.name);
        let mut lines = Vec::new();

        lines.push(match &self.local {
            LocalRemoval::Deleted => format!("coordinator: deleted {}", stored),
            LocalRemoval::NotFound => format!("coordinator: {} not found", stored),
            LocalRemoval::Failed(e) => format!("coordinator: cannot delete {}: {}", stored, e),
        });

        for node in &self.nodes {
            let id = node.node_id;
            match &node.removal {
                NodeRemoval::Unreachable(reason) => {
                    lines.push(format!("node {}: inaccessible ({})", id, reason));
                }
                NodeRemoval::Visited {
                    full_copy,
                    parts_deleted,
                    errors,
                    purged,
                } => {
                    if let Some(line) = full_copy {
                        lines.push(format!("node {}: {}", id, line));
                    }
                    for line in parts_deleted {
                        lines.push(format!("node {}: {}", id, line));
                    }
                    for line in errors {
                        lines.push(format!("node {}: {}", id, line));
                    }
                    if *purged > 0 {
                        lines.push(format!("node {}: cascade deleted {} part(s)", id, purged));
                    }
                    if parts_deleted.is_empty() && *purged == 0 {
                        lines.push(format!("node {}: no parts found for {}", id, self.name));
                    }
                }
            }
        }

        lines.push(match &self.local {
            LocalRemoval::Deleted => format!(
                "removal of {} completed on coordinator and storage nodes",
                self.name
            ),
            LocalRemoval::NotFound => format!("{} not found on coordinator", self.name),
            LocalRemoval::Failed(_) => format!("removal of {} failed on coordinator", self.name),
        });
        lines
    }
}
