//! Storage Node Service
//!
//! Serves one command per connection against the node's local directory.

use crate::config::NodeServiceConfig;
use crate::error::{Result, ShardError};
use crate::network::{Connection, Service};
use crate::protocol::{
    read_size, read_string, skip_raw, write_i32, write_i64, write_raw,
    write_string, Command, Incoming, DELETED_PREFIX, ERROR_PREFIX, NOT_FOUND_REPLY,
    NOT_FOUND_SIZE,
};
use crate::storage::LocalStore;

/// A storage node: durable part storage for one directory
#[derive(Debug, Clone)]
pub struct StorageNode {
    store: LocalStore,
}

impl StorageNode {
    /// Open the node's directory, creating it if needed
    pub fn open(config: &NodeServiceConfig) -> Result<Self> {
        Ok(Self {
            store: LocalStore::open(&config.data_dir)?,
        })
    }

    /// Get the underlying store
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// PUT: STRING name, INT64 size, RAW[size] → STRING ack
    fn handle_put(&self, conn: &mut Connection) -> Result<()> {
        let name = read_string(conn.reader())?;
        let size = read_size(conn.reader())?;

        let (reader, writer) = conn.split();
        let reply = match self.store.store(&name, size, reader) {
            Ok(outcome) if outcome.is_complete() => {
                tracing::info!("Stored {} ({} bytes)", name, outcome.written);
                format!("STORED {} ({} bytes)", name, outcome.written)
            }
            Ok(outcome) => format!(
                "{} incomplete transfer of {}: {} of {} bytes",
                ERROR_PREFIX, name, outcome.written, outcome.declared
            ),
            Err(ShardError::InvalidName(bad)) => {
                tracing::warn!("Rejected PUT for invalid name {:?}", bad);
                skip_raw(reader, size)?;
                format!("{} invalid file name {:?}", ERROR_PREFIX, bad)
            }
            Err(e) => return Err(e),
        };
        write_string(writer, &reply)
    }

    /// GET: STRING name → INT64 size, RAW[size] | INT64 -1
    fn handle_get(&self, conn: &mut Connection) -> Result<()> {
        let name = read_string(conn.reader())?;

        let found = match self.store.fetch(&name) {
            Ok(found) => found,
            Err(ShardError::InvalidName(_)) => None,
            Err(e) => return Err(e),
        };

        let Some((size, mut file)) = found else {
            tracing::debug!("GET {}: not found", name);
            return write_i64(conn.writer(), NOT_FOUND_SIZE);
        };

        write_i64(conn.writer(), size as i64)?;
        let sent = write_raw(conn.writer(), &mut file, size)?;
        if sent < size {
            tracing::warn!("{} shrank while being sent: {} of {} bytes", name, sent, size);
        } else {
            tracing::debug!("Sent {} ({} bytes)", name, sent);
        }
        Ok(())
    }

    /// LS: → INT32 count, count × STRING
    fn handle_ls(&self, conn: &mut Connection) -> Result<()> {
        let names = self.store.list()?;
        write_i32(conn.writer(), names.len() as i32)?;
        for name in &names {
            write_string(conn.writer(), name)?;
        }
        Ok(())
    }

    /// RM: STRING name → STRING "DELETED <name>" | "NOT_FOUND"
    fn handle_rm(&self, conn: &mut Connection) -> Result<()> {
        let name = read_string(conn.reader())?;
        let reply = match self.store.delete(&name) {
            Ok(true) => {
                tracing::info!("Deleted {}", name);
                format!("{} {}", DELETED_PREFIX, name)
            }
            Ok(false) | Err(ShardError::InvalidName(_)) => NOT_FOUND_REPLY.to_string(),
            Err(e) => {
                tracing::warn!("Cannot delete {}: {}", name, e);
                format!("{} cannot delete {}: {}", ERROR_PREFIX, name, e)
            }
        };
        write_string(conn.writer(), &reply)
    }

    /// PURGE: STRING logical name → INT32 parts deleted
    fn handle_purge(&self, conn: &mut Connection) -> Result<()> {
        let logical = read_string(conn.reader())?;
        let deleted = match self.store.delete_cascade(&logical) {
            Ok(count) => count,
            Err(ShardError::InvalidName(_)) => 0,
            Err(e) => return Err(e),
        };
        if deleted > 0 {
            tracing::info!("Purged {} part(s) of {}", deleted, logical);
        }
        write_i32(conn.writer(), deleted as i32)
    }
}

impl Service for StorageNode {
    fn name(&self) -> &'static str {
        "node"
    }

    fn serve(&self, mut conn: Connection) -> Result<()> {
        let command = match conn.read_command()? {
            Some(Incoming::Command(command)) => command,
            Some(Incoming::Unknown(verb)) => {
                tracing::debug!("Unknown command {:?} from {}", verb, conn.peer_addr());
                write_string(conn.writer(), &format!("{} unknown command {}", ERROR_PREFIX, verb))?;
                return conn.flush();
            }
            None => {
                tracing::debug!("{} closed without a command", conn.peer_addr());
                return Ok(());
            }
        };

        tracing::debug!("{} from {}", command, conn.peer_addr());
        match command {
            Command::Put => self.handle_put(&mut conn)?,
            Command::Get => self.handle_get(&mut conn)?,
            Command::Ls => self.handle_ls(&mut conn)?,
            Command::Rm => self.handle_rm(&mut conn)?,
            Command::Purge => self.handle_purge(&mut conn)?,
        }
        conn.flush()
    }
}
