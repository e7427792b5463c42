//! Client
//!
//! Client side of the coordinator protocol, one connection per call.

use std::fs::File;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, ShardError};
use crate::network::Connection;
use crate::node::read_listing;
use crate::protocol::{
    read_i64, read_raw, read_string, try_read_string, write_command, write_i64, write_raw,
    write_string, Command, NOT_FOUND_SIZE,
};

/// Answer to a GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieved {
    /// The reassembled bytes, possibly shorter than what was stored
    Found(Vec<u8>),

    /// Nothing could be retrieved; carries the coordinator's message
    Missing(String),
}

/// Talks to a coordinator
#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
    timeout: Option<Duration>,
}

impl Client {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: None,
        }
    }

    /// Apply a connect and read/write timeout to every call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn connect(&self) -> Result<Connection> {
        let stream = match self.timeout {
            None => TcpStream::connect(&self.addr)?,
            Some(timeout) => {
                let addr = self
                    .addr
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| ShardError::Network(format!("{} resolves to nothing", self.addr)))?;
                TcpStream::connect_timeout(&addr, timeout)?
            }
        };
        let mut conn = Connection::new(stream)?;
        conn.set_timeouts(self.timeout)?;
        Ok(conn)
    }

    /// Upload `size` bytes from `src` as `name`; returns the coordinator's ack
    ///
    /// A refusal (`ERROR: ...`) is still returned as the ack text.
    pub fn put<R: Read>(&self, name: &str, size: u64, src: &mut R) -> Result<String> {
        let mut conn = self.connect()?;
        write_command(conn.writer(), Command::Put)?;
        write_string(conn.writer(), name)?;
        write_i64(conn.writer(), size as i64)?;
        let sent = write_raw(conn.writer(), src, size)?;
        conn.flush()?;

        if sent < size {
            return Err(ShardError::PartialTransfer {
                name: name.to_string(),
                expected: size,
                received: sent,
            });
        }
        read_string(conn.reader())
    }

    /// Upload a local file under its own file name, or `name` if given
    pub fn put_file(&self, path: &Path, name: Option<&str>) -> Result<String> {
        let name = match name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| ShardError::InvalidName(path.display().to_string()))?,
        };
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();
        self.put(&name, size, &mut file)
    }

    /// Download `name`
    pub fn get(&self, name: &str) -> Result<Retrieved> {
        let mut conn = self.connect()?;
        write_command(conn.writer(), Command::Get)?;
        write_string(conn.writer(), name)?;
        conn.flush()?;

        let size = read_i64(conn.reader())?;
        if size == NOT_FOUND_SIZE {
            let message = try_read_string(conn.reader())?
                .unwrap_or_else(|| format!("{} not found", name));
            return Ok(Retrieved::Missing(message));
        }
        let size = u64::try_from(size)
            .map_err(|_| ShardError::Protocol(format!("bad file size {}", size)))?;

        let mut data = Vec::with_capacity(size.min(64 * 1024 * 1024) as usize);
        let received = read_raw(conn.reader(), &mut data, size)?;
        if received < size {
            return Err(ShardError::PartialTransfer {
                name: name.to_string(),
                expected: size,
                received,
            });
        }
        Ok(Retrieved::Found(data))
    }

    /// Download `name` into `dst`, returning the byte count
    pub fn get_to<W: Write>(&self, name: &str, dst: &mut W) -> Result<u64> {
        match self.get(name)? {
            Retrieved::Found(data) => {
                dst.write_all(&data)?;
                Ok(data.len() as u64)
            }
            Retrieved::Missing(message) => Err(ShardError::NotFound(message)),
        }
    }

    /// Files held by the coordinator
    pub fn list(&self) -> Result<Vec<String>> {
        let mut conn = self.connect()?;
        write_command(conn.writer(), Command::Ls)?;
        conn.flush()?;
        read_listing(conn.reader())
    }

    /// Delete `name` everywhere; returns the status lines
    pub fn remove(&self, name: &str) -> Result<Vec<String>> {
        let mut conn = self.connect()?;
        write_command(conn.writer(), Command::Rm)?;
        write_string(conn.writer(), name)?;
        conn.flush()?;

        let mut lines = Vec::new();
        while let Some(line) = try_read_string(conn.reader())? {
            lines.push(line);
        }
        Ok(lines)
    }
}
