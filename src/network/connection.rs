//! Connection Handler
//!
//! Buffered read/write halves of one accepted or outgoing TCP stream.

use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::Result;
use crate::protocol::{self, Incoming};

/// A single TCP connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Peer address for logging
    peer_addr: String,

    /// Read timeout held back until the first command arrives
    pending_read_timeout: Option<Duration>,
}

impl Connection {
    /// Wrap a connected stream
    pub fn new(stream: TcpStream) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            peer_addr,
            pending_read_timeout: None,
        })
    }

    /// Configure read and write timeouts; `None` blocks forever
    pub fn set_timeouts(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        self.writer.get_ref().set_write_timeout(timeout)?;
        Ok(())
    }

    /// Arm the write timeout now and the read timeout once a command is read
    ///
    /// A peer may open a connection and stay silent until its turn comes,
    /// so the wait for the verb itself is unbounded.
    pub fn set_timeouts_after_command(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.writer.get_ref().set_write_timeout(timeout)?;
        self.pending_read_timeout = timeout;
        Ok(())
    }

    /// Read the command verb, then apply any held-back read timeout
    pub fn read_command(&mut self) -> Result<Option<Incoming>> {
        let incoming = protocol::read_command(&mut self.reader)?;
        if let Some(timeout) = self.pending_read_timeout.take() {
            self.reader.get_ref().set_read_timeout(Some(timeout))?;
        }
        Ok(incoming)
    }

    pub fn reader(&mut self) -> &mut BufReader<TcpStream> {
        &mut self.reader
    }

    pub fn writer(&mut self) -> &mut BufWriter<TcpStream> {
        &mut self.writer
    }

    /// Both halves at once, for copying from one to the other
    pub fn split(&mut self) -> (&mut BufReader<TcpStream>, &mut BufWriter<TcpStream>) {
        (&mut self.reader, &mut self.writer)
    }

    /// Push buffered output onto the wire
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
