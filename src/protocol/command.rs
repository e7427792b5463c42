//! Command definitions
//!
//! The verb that opens every connection.

use std::fmt;
use std::io::{Read, Write};

use crate::error::Result;
use super::frame::{try_read_string, write_string};

/// Command verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Store a file (client → coordinator) or a part (coordinator → node)
    Put,

    /// Fetch a file or a part
    Get,

    /// List the receiver's directory
    Ls,

    /// Delete by exact name
    Rm,

    /// Delete every part of a logical file (storage nodes only)
    Purge,
}

impl Command {
    /// Wire spelling of the verb
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Put => "PUT",
            Command::Get => "GET",
            Command::Ls => "LS",
            Command::Rm => "RM",
            Command::Purge => "PURGE",
        }
    }

    /// Parse a verb, ignoring case
    pub fn parse(verb: &str) -> Option<Self> {
        match verb.to_ascii_uppercase().as_str() {
            "PUT" => Some(Command::Put),
            "GET" => Some(Command::Get),
            "LS" => Some(Command::Ls),
            "RM" => Some(Command::Rm),
            "PURGE" => Some(Command::Purge),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What opened a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Command(Command),

    /// A verb nobody understands, kept for the error reply
    Unknown(String),
}

/// Read the verb that opens a connection
///
/// `Ok(None)` means the peer connected and closed without a word, which is
/// what a probed-but-unused connection looks like.
pub fn read_command<R: Read>(reader: &mut R) -> Result<Option<Incoming>> {
    Ok(try_read_string(reader)?.map(|verb| match Command::parse(&verb) {
        Some(command) => Incoming::Command(command),
        None => Incoming::Unknown(verb),
    }))
}

/// Write a command verb
pub fn write_command<W: Write>(writer: &mut W, command: Command) -> Result<()> {
    write_string(writer, command.as_str())
}
