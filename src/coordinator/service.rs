//! Coordinator Service
//!
//! Orchestrates the four client operations.
//!
//! ## Per-connection state machine
//! ```text
//! AwaitCommand ──► Dispatch ──┬──► Putting  ──┐
//!                             ├──► Getting  ──┤
//!                             ├──► Listing  ──┼──► Closed
//!                             └──► Removing ──┘
//! ```
//!
//! ## PUT
//! 1. Store `received_<name>` locally, exactly `size` bytes
//! 2. Probe the registry
//! 3. Plan the split over the nodes that answered
//! 4. Stream each range from the local copy to its node, in registry order
//! 5. Record the placement in a manifest

use std::io::{Read, Write};
use std::net::TcpStream;

use crate::config::{CoordinatorConfig, FanoutMode, NodeConfig, PlacementMode};
use crate::error::{Result, ShardError};
use crate::network::{Connection, Service};
use crate::node::{DeleteReply, FetchReply, NodeClient};
use crate::planner::{Shard, ShardPlan};
use crate::prober::{LiveNode, Prober};
use crate::protocol::{
    read_size, read_string, skip_raw, write_i32, write_i64, write_string,
    Command, Incoming, ERROR_PREFIX, NOT_FOUND_SIZE,
};
use crate::storage::{naming, LocalStore};

use super::locks::NameLocks;
use super::manifest::{ManifestStore, ShardManifest};
use super::outcome::{
    Delivery, FetchOutcome, GetReport, LocalRemoval, NodeRemoval, NodeRemovalReport, PartDelivery,
    PartFetch, PutReport, RmReport,
};

/// One part to fetch during GET
#[derive(Debug, Clone, Copy)]
struct FetchTarget {
    node_id: u32,
    part_index: u32,
}

/// The coordinator: owns the full copies and drives the storage nodes
pub struct Coordinator {
    config: CoordinatorConfig,
    store: LocalStore,
    manifests: ManifestStore,
    prober: Prober,
    nodes: NodeClient,
    locks: NameLocks,
}

impl Coordinator {
    /// Open the coordinator's directory and wire up its collaborators
    pub fn open(config: CoordinatorConfig) -> Result<Self> {
        let store = LocalStore::open(&config.data_dir)?;
        let manifests = ManifestStore::open(&config.data_dir)?;
        let prober = Prober::new(config.probe_timeout());
        let nodes = NodeClient::new(config.probe_timeout(), config.transfer_timeout());
        let locks = NameLocks::new(config.serialize_same_name);

        if config.registry.is_empty() {
            tracing::warn!("No storage nodes configured; every PUT will be refused");
        }

        Ok(Self {
            config,
            store,
            manifests,
            prober,
            nodes,
            locks,
        })
    }

    // =========================================================================
    // PUT
    // =========================================================================

    /// Accept `size` bytes of `name` from `src` and shard them
    ///
    /// Fails with `PartialTransfer` if `src` ends early (the partial local
    /// copy stays) and with `NoNodesAvailable` if no node answers the probe
    /// (the full local copy stays). Nodes that fail mid-send only show up as
    /// `Delivery::Failed` in the report.
    pub fn put<R: Read>(&self, name: &str, size: u64, src: &mut R) -> Result<PutReport> {
        naming::validate_name(name)?;
        let stored = naming::stored_name(name);

        self.locks.with(name, || {
            let outcome = self.store.store(&stored, size, src)?.into_result()?;
            tracing::info!("Stored {} ({} bytes)", stored, outcome.written);
            self.distribute(name, &stored, outcome.written)
        })
    }

    fn distribute(&self, name: &str, stored: &str, file_size: u64) -> Result<PutReport> {
        let live = self.prober.probe(&self.config.registry);
        if live.is_empty() {
            tracing::warn!("No storage node reachable; {} kept on coordinator only", stored);
            return Err(ShardError::NoNodesAvailable);
        }

        let node_ids: Vec<u32> = live.iter().map(|l| l.node.id).collect();
        let plan = ShardPlan::for_nodes(file_size, &node_ids)?;
        let jobs: Vec<(Shard, LiveNode)> = plan.shards().iter().copied().zip(live).collect();

        let deliveries = match self.config.fanout {
            FanoutMode::Sequential => jobs
                .into_iter()
                .map(|(shard, live)| self.deliver(name, stored, shard, live))
                .collect(),
            FanoutMode::Parallel => self.deliver_parallel(name, stored, jobs),
        };

        let report = PutReport {
            name: name.to_string(),
            file_size,
            deliveries,
        };
        if let Err(e) = self.manifests.save(&ShardManifest::from_report(&report)) {
            tracing::warn!("Cannot write manifest for {}: {}", name, e);
        }

        tracing::info!(
            "{} sharded into {} part(s), {} delivered",
            name,
            report.deliveries.len(),
            report.delivered()
        );
        Ok(report)
    }

    /// Send one planned range over the node's probe connection
    ///
    /// If that connection has gone stale (the node hung up while earlier
    /// parts were sent), the range is sent once more on a fresh connection.
    fn deliver(&self, name: &str, stored: &str, shard: Shard, live: LiveNode) -> PartDelivery {
        let part = naming::part_name(shard.span.index, name);
        let send_range = |over: Option<TcpStream>| -> Result<String> {
            let mut range = self
                .store
                .read_range(stored, shard.span.offset, shard.span.length)?;
            match over {
                Some(stream) => self.nodes.store_over(stream, &part, &mut range, shard.span.length),
                None => self.nodes.store(&live.node, &part, &mut range, shard.span.length),
            }
        };

        let result = match send_range(Some(live.stream)) {
            Err(e) if is_stale_connection(&e) => {
                tracing::debug!("Probe connection to {} went stale ({}); reconnecting", live.node, e);
                send_range(None)
            }
            other => other,
        };

        let delivery = match result {
            Ok(ack) => {
                tracing::debug!("{} -> {}: {}", part, live.node, ack);
                Delivery::Delivered { ack }
            }
            Err(e) => {
                tracing::warn!("Part {} not delivered to {}: {}", part, live.node, e);
                Delivery::Failed {
                    reason: e.to_string(),
                }
            }
        };
        PartDelivery { shard, delivery }
    }

    fn deliver_parallel(&self, name: &str, stored: &str, jobs: Vec<(Shard, LiveNode)>) -> Vec<PartDelivery> {
        let shards: Vec<Shard> = jobs.iter().map(|(shard, _)| *shard).collect();
        let panicked = |shard: &Shard| PartDelivery {
            shard: *shard,
            delivery: Delivery::Failed {
                reason: "delivery thread panicked".to_string(),
            },
        };

        let joined = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|(shard, live)| scope.spawn(move |_| self.deliver(name, stored, shard, live)))
                .collect();
            handles
                .into_iter()
                .zip(&shards)
                .map(|(handle, shard)| handle.join().unwrap_or_else(|_| panicked(shard)))
                .collect::<Vec<_>>()
        });

        joined.unwrap_or_else(|_| shards.iter().map(panicked).collect())
    }

    // =========================================================================
    // GET
    // =========================================================================

    /// Fetch every part of `name` and concatenate them in order
    ///
    /// Missing parts leave holes; the caller checks `is_total_failure`.
    pub fn get(&self, name: &str) -> Result<GetReport> {
        naming::validate_name(name)?;
        let targets = self.fetch_targets(name);

        let results: Vec<(PartFetch, Vec<u8>)> = match self.config.fanout {
            FanoutMode::Sequential => targets.iter().map(|t| self.fetch_part(name, t)).collect(),
            FanoutMode::Parallel => self.fetch_parallel(name, &targets),
        };

        let mut data = Vec::new();
        let mut fetches = Vec::with_capacity(results.len());
        for (fetch, bytes) in results {
            data.extend_from_slice(&bytes);
            fetches.push(fetch);
        }

        let report = GetReport {
            name: name.to_string(),
            data,
            fetches,
        };
        tracing::info!(
            "GET {}: {} bytes from {} part(s), {} missing",
            name,
            report.data.len(),
            report.fetches.len(),
            report.missing_parts().count()
        );
        Ok(report)
    }

    /// Which node holds which part: recorded placement, or registry order
    fn fetch_targets(&self, name: &str) -> Vec<FetchTarget> {
        if self.config.placement == PlacementMode::Manifest {
            if let Some(manifest) = self.load_manifest(name) {
                return manifest
                    .parts
                    .iter()
                    .map(|p| FetchTarget {
                        node_id: p.node_id,
                        part_index: p.part_index,
                    })
                    .collect();
            }
        }

        self.config
            .registry
            .iter()
            .map(|node| FetchTarget {
                node_id: node.id,
                part_index: node.id,
            })
            .collect()
    }

    fn load_manifest(&self, name: &str) -> Option<ShardManifest> {
        match self.manifests.load(name) {
            Ok(Some(manifest)) => Some(manifest),
            Ok(None) => {
                tracing::debug!("No manifest for {}; using registry order", name);
                None
            }
            Err(e) => {
                tracing::warn!("Unreadable manifest for {}: {}; using registry order", name, e);
                None
            }
        }
    }

    fn fetch_part(&self, name: &str, target: &FetchTarget) -> (PartFetch, Vec<u8>) {
        let part = naming::part_name(target.part_index, name);
        let mut bytes = Vec::new();

        let outcome = match self.config.registry.get(target.node_id) {
            None => FetchOutcome::Unreachable(format!("node {} is not configured", target.node_id)),
            Some(node) => match self.nodes.fetch(node, &part, &mut bytes) {
                Ok(FetchReply::Complete(n)) => FetchOutcome::Fetched(n),
                Ok(FetchReply::NotFound) => {
                    tracing::warn!("{} not found on {}", part, node);
                    FetchOutcome::NotFound
                }
                Ok(FetchReply::Truncated { expected, received }) => {
                    tracing::warn!(
                        "{} from {} incomplete: expected {} bytes, received {}",
                        part,
                        node,
                        expected,
                        received
                    );
                    FetchOutcome::Truncated { expected, received }
                }
                Err(e @ ShardError::NodeUnreachable { .. }) => {
                    tracing::warn!("Cannot fetch {}: {}", part, e);
                    FetchOutcome::Unreachable(e.to_string())
                }
                Err(e) => {
                    tracing::warn!("Fetching {} from {} failed: {}", part, node, e);
                    bytes.clear();
                    FetchOutcome::Failed(e.to_string())
                }
            },
        };

        let fetch = PartFetch {
            node_id: target.node_id,
            part_index: target.part_index,
            outcome,
        };
        (fetch, bytes)
    }

    fn fetch_parallel(&self, name: &str, targets: &[FetchTarget]) -> Vec<(PartFetch, Vec<u8>)> {
        let panicked = |target: &FetchTarget| {
            let fetch = PartFetch {
                node_id: target.node_id,
                part_index: target.part_index,
                outcome: FetchOutcome::Failed("fetch thread panicked".to_string()),
            };
            (fetch, Vec::new())
        };

        let joined = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = targets
                .iter()
                .map(|target| scope.spawn(move |_| self.fetch_part(name, target)))
                .collect();
            handles
                .into_iter()
                .zip(targets)
                .map(|(handle, target)| handle.join().unwrap_or_else(|_| panicked(target)))
                .collect::<Vec<_>>()
        });

        joined.unwrap_or_else(|_| targets.iter().map(panicked).collect())
    }

    // =========================================================================
    // LS
    // =========================================================================

    /// Files held by the coordinator itself; node listings are not merged
    pub fn list(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    // =========================================================================
    // RM
    // =========================================================================

    /// Delete the local copy, then every part on every node
    ///
    /// Without a manifest the node's parts are found by asking for indices
    /// 1, 2, ... up to registry size + 1 and stopping at the first miss,
    /// which assumes the indices on a node are contiguous from 1. The cascade
    /// delete that follows picks up whatever that assumption missed.
    pub fn remove(&self, name: &str) -> Result<RmReport> {
        naming::validate_name(name)?;
        let stored = naming::stored_name(name);

        self.locks.with(name, || {
            let local = match self.store.delete(&stored) {
                Ok(true) => {
                    tracing::info!("Deleted {}", stored);
                    LocalRemoval::Deleted
                }
                Ok(false) => {
                    tracing::warn!("{} not found on coordinator", stored);
                    LocalRemoval::NotFound
                }
                Err(e) => {
                    tracing::warn!("Cannot delete {}: {}", stored, e);
                    LocalRemoval::Failed(e.to_string())
                }
            };

            let manifest = match self.config.placement {
                PlacementMode::Manifest => self.load_manifest(name),
                PlacementMode::Positional => None,
            };

            let nodes = self
                .config
                .registry
                .iter()
                .map(|node| self.remove_from_node(name, &stored, node, manifest.as_ref()))
                .collect();

            if let Err(e) = self.manifests.remove(name) {
                tracing::warn!("Cannot remove manifest for {}: {}", name, e);
            }

            Ok(RmReport {
                name: name.to_string(),
                local,
                nodes,
            })
        })
    }

    fn remove_from_node(
        &self,
        name: &str,
        stored: &str,
        node: &NodeConfig,
        manifest: Option<&ShardManifest>,
    ) -> NodeRemovalReport {
        let report = |removal| NodeRemovalReport {
            node_id: node.id,
            removal,
        };
        let mut errors = Vec::new();

        // A node holds a full copy only if a client wrote to it directly
        let full_copy = match self.nodes.delete(node, stored) {
            Ok(DeleteReply::Deleted(line)) => Some(line),
            Ok(DeleteReply::NotFound) => None,
            Ok(DeleteReply::Refused(line)) => {
                errors.push(line);
                None
            }
            Err(e) => {
                tracing::warn!("RM {}: {} inaccessible: {}", name, node, e);
                return report(NodeRemoval::Unreachable(e.to_string()));
            }
        };

        let (candidates, stop_at_gap): (Vec<u32>, bool) = match manifest {
            Some(m) => (m.parts_on(node.id).map(|p| p.part_index).collect(), false),
            None => ((1..=self.config.registry.len() as u32 + 1).collect(), true),
        };

        let mut parts_deleted = Vec::new();
        for index in candidates {
            let part = naming::part_name(index, name);
            match self.nodes.delete(node, &part) {
                Ok(DeleteReply::Deleted(line)) => parts_deleted.push(line),
                Ok(DeleteReply::NotFound) if stop_at_gap => break,
                Ok(DeleteReply::NotFound) => {
                    tracing::debug!("{} already gone from {}", part, node);
                }
                Ok(DeleteReply::Refused(line)) => {
                    errors.push(line);
                    if stop_at_gap {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("RM {} on {} failed: {}", part, node, e);
                    errors.push(e.to_string());
                    break;
                }
            }
        }

        let purged = if self.config.cascade_delete {
            self.nodes.purge(node, name).unwrap_or_else(|e| {
                errors.push(e.to_string());
                0
            })
        } else {
            0
        };

        report(NodeRemoval::Visited {
            full_copy,
            parts_deleted,
            errors,
            purged,
        })
    }

    // =========================================================================
    // Wire handlers
    // =========================================================================

    /// PUT: STRING name, INT64 size, RAW[size] → STRING ack
    fn handle_put(&self, conn: &mut Connection) -> Result<()> {
        let name = read_string(conn.reader())?;
        let size = read_size(conn.reader())?;
        tracing::info!("PUT {} ({} bytes) from {}", name, size, conn.peer_addr());

        let (reader, writer) = conn.split();
        let reply = match self.put(&name, size, reader) {
            Ok(report) => report.ack_message(),
            Err(ShardError::NoNodesAvailable) => format!(
                "{} no storage nodes available; {} kept on coordinator only",
                ERROR_PREFIX, name
            ),
            Err(e @ ShardError::InvalidName(_)) => {
                skip_raw(reader, size)?;
                format!("{} {}", ERROR_PREFIX, e)
            }
            Err(e @ ShardError::PartialTransfer { .. }) => format!("{} {}", ERROR_PREFIX, e),
            Err(e) => {
                let _ = write_string(writer, &format!("{} {}", ERROR_PREFIX, e));
                return Err(e);
            }
        };
        write_string(writer, &reply)
    }

    /// GET: STRING name → INT64 size, RAW[size] | INT64 -1, STRING error
    fn handle_get(&self, conn: &mut Connection) -> Result<()> {
        let name = read_string(conn.reader())?;
        tracing::info!("GET {} from {}", name, conn.peer_addr());

        let report = match self.get(&name) {
            Ok(report) => Some(report),
            Err(ShardError::InvalidName(_)) => None,
            Err(e) => return Err(e),
        };

        match report {
            Some(report) if !report.is_total_failure() => {
                write_i64(conn.writer(), report.data.len() as i64)?;
                conn.writer().write_all(&report.data)?;
            }
            _ => {
                write_i64(conn.writer(), NOT_FOUND_SIZE)?;
                write_string(
                    conn.writer(),
                    &format!("{} unable to retrieve {}", ERROR_PREFIX, name),
                )?;
            }
        }
        Ok(())
    }

    /// LS: → INT32 count, count × STRING
    fn handle_ls(&self, conn: &mut Connection) -> Result<()> {
        let names = self.list()?;
        tracing::info!("LS from {}: {} file(s)", conn.peer_addr(), names.len());
        write_i32(conn.writer(), names.len() as i32)?;
        for name in &names {
            write_string(conn.writer(), name)?;
        }
        Ok(())
    }

    /// RM: STRING name → STRING status lines until close
    fn handle_rm(&self, conn: &mut Connection) -> Result<()> {
        let name = read_string(conn.reader())?;
        tracing::info!("RM {} from {}", name, conn.peer_addr());

        let lines = match self.remove(&name) {
            Ok(report) => report.status_lines(),
            Err(e @ ShardError::InvalidName(_)) => vec![format!("{} {}", ERROR_PREFIX, e)],
            Err(e) => return Err(e),
        };
        for line in &lines {
            write_string(conn.writer(), line)?;
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the coordinator's configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Get the coordinator's local store
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Get the coordinator's manifest store
    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }
}

/// Errors that mean the peer dropped the connection, not that it refused the part
fn is_stale_connection(e: &ShardError) -> bool {
    e.is_disconnect() || e.is_timeout() || matches!(e, ShardError::Protocol(_))
}

impl Service for Coordinator {
    fn name(&self) -> &'static str {
        "coordinator"
    }

    fn serve(&self, mut conn: Connection) -> Result<()> {
        let command = match conn.read_command()? {
            Some(Incoming::Command(command)) => command,
            Some(Incoming::Unknown(verb)) => {
                tracing::info!("Unknown command {:?} from {}", verb, conn.peer_addr());
                write_string(conn.writer(), &format!("{} unknown command {}", ERROR_PREFIX, verb))?;
                return conn.flush();
            }
            None => {
                tracing::debug!("{} closed without a command", conn.peer_addr());
                return Ok(());
            }
        };

        match command {
            Command::Put => self.handle_put(&mut conn)?,
            Command::Get => self.handle_get(&mut conn)?,
            Command::Ls => self.handle_ls(&mut conn)?,
            Command::Rm => self.handle_rm(&mut conn)?,
            Command::Purge => {
                write_string(
                    conn.writer(),
                    &format!("{} PURGE is only served by storage nodes", ERROR_PREFIX),
                )?;
            }
        }
        conn.flush()
    }
}
