//! Node Client
//!
//! The coordinator's side of the node protocol. Every call opens its own
//! connection, except `store_over`, which reuses the probe connection.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::config::NodeConfig;
use crate::error::{Result, ShardError};
use crate::network::Connection;
use crate::prober;
use crate::protocol::{
    read_i32, read_i64, read_raw, read_string, write_command, write_i64, write_raw,
    write_string, Command, DELETED_PREFIX, ERROR_PREFIX, NOT_FOUND_REPLY, NOT_FOUND_SIZE,
};

/// Answer to a part fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReply {
    /// All `size` bytes arrived
    Complete(u64),

    /// The node answered with the -1 sentinel
    NotFound,

    /// The node announced `expected` bytes and sent `received`
    Truncated { expected: u64, received: u64 },
}

/// Answer to a delete by exact name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteReply {
    /// The node's confirmation line
    Deleted(String),

    NotFound,

    /// The node tried and failed; carries its error line
    Refused(String),
}

/// Talks to storage nodes with fixed timeouts
#[derive(Debug, Clone, Copy)]
pub struct NodeClient {
    connect_timeout: Duration,
    transfer_timeout: Option<Duration>,
}

impl NodeClient {
    pub fn new(connect_timeout: Duration, transfer_timeout: Option<Duration>) -> Self {
        Self {
            connect_timeout,
            transfer_timeout,
        }
    }

    fn open(&self, node: &NodeConfig) -> Result<Connection> {
        let stream = prober::connect(node, self.connect_timeout)?;
        self.wrap(stream)
    }

    fn wrap(&self, stream: TcpStream) -> Result<Connection> {
        let mut conn = Connection::new(stream)?;
        conn.set_timeouts(self.transfer_timeout)?;
        Ok(conn)
    }

    /// Store `length` bytes from `src` as `file_name` on `node`
    pub fn store<R: Read>(&self, node: &NodeConfig, file_name: &str, src: &mut R, length: u64) -> Result<String> {
        let conn = self.open(node)?;
        store_on(conn, file_name, src, length)
    }

    /// Same as `store`, over a connection that is already open
    pub fn store_over<R: Read>(&self, stream: TcpStream, file_name: &str, src: &mut R, length: u64) -> Result<String> {
        let conn = self.wrap(stream)?;
        store_on(conn, file_name, src, length)
    }

    /// Fetch `file_name` from `node`, appending its bytes to `dst`
    pub fn fetch<W: Write>(&self, node: &NodeConfig, file_name: &str, dst: &mut W) -> Result<FetchReply> {
        let mut conn = self.open(node)?;
        write_command(conn.writer(), Command::Get)?;
        write_string(conn.writer(), file_name)?;
        conn.flush()?;

        let size = read_i64(conn.reader())?;
        if size == NOT_FOUND_SIZE {
            return Ok(FetchReply::NotFound);
        }
        let expected = u64::try_from(size)
            .map_err(|_| ShardError::Protocol(format!("bad part size {} from {}", size, node)))?;

        let received = read_raw(conn.reader(), dst, expected)?;
        if received < expected {
            return Ok(FetchReply::Truncated { expected, received });
        }
        Ok(FetchReply::Complete(received))
    }

    /// Delete `file_name` on `node`
    pub fn delete(&self, node: &NodeConfig, file_name: &str) -> Result<DeleteReply> {
        let mut conn = self.open(node)?;
        write_command(conn.writer(), Command::Rm)?;
        write_string(conn.writer(), file_name)?;
        conn.flush()?;

        let reply = read_string(conn.reader())?;
        Ok(if reply == NOT_FOUND_REPLY {
            DeleteReply::NotFound
        } else if reply.starts_with(DELETED_PREFIX) {
            DeleteReply::Deleted(reply)
        } else {
            DeleteReply::Refused(reply)
        })
    }

    /// Delete every part of `logical` on `node`
    pub fn purge(&self, node: &NodeConfig, logical: &str) -> Result<u32> {
        let mut conn = self.open(node)?;
        write_command(conn.writer(), Command::Purge)?;
        write_string(conn.writer(), logical)?;
        conn.flush()?;

        let count = read_i32(conn.reader())?;
        u32::try_from(count)
            .map_err(|_| ShardError::Protocol(format!("bad purge count {} from {}", count, node)))
    }
}

fn store_on<R: Read>(mut conn: Connection, file_name: &str, src: &mut R, length: u64) -> Result<String> {
    write_command(conn.writer(), Command::Put)?;
    write_string(conn.writer(), file_name)?;
    write_i64(conn.writer(), length as i64)?;
    let sent = write_raw(conn.writer(), src, length)?;
    conn.flush()?;

    if sent < length {
        // Let the node see EOF instead of waiting for bytes that never come
        let _ = conn.writer().get_ref().shutdown(Shutdown::Write);
        return Err(ShardError::PartialTransfer {
            name: file_name.to_string(),
            expected: length,
            received: sent,
        });
    }

    let ack = read_string(conn.reader())?;
    if ack.starts_with(ERROR_PREFIX) {
        return Err(ShardError::Network(ack));
    }
    Ok(ack)
}

/// Read an LS reply: INT32 count, then that many STRING frames
pub fn read_listing<R: Read>(reader: &mut R) -> Result<Vec<String>> {
    let count = read_i32(reader)?;
    let count = usize::try_from(count)
        .map_err(|_| ShardError::Protocol(format!("negative file count {}", count)))?;
    let mut names = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        names.push(read_string(reader)?);
    }
    Ok(names)
}
