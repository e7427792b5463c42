//! Protocol Module
//!
//! Defines the wire protocol shared by clients, the coordinator and storage
//! nodes. One command per connection; there is no message envelope, so each
//! side knows from position which frame comes next.
//!
//! ## Client ↔ Coordinator
//! ```text
//! PUT  → STRING "PUT", STRING name, INT64 size, RAW[size]   ← STRING ack
//! GET  → STRING "GET", STRING name                          ← INT64 size, RAW[size]
//!                                                            | INT64 -1, STRING error
//! LS   → STRING "LS"                                        ← INT32 n, n × STRING
//! RM   → STRING "RM", STRING name                           ← STRING lines until close
//! ```
//!
//! ## Coordinator ↔ Storage Node
//! ```text
//! PUT   → STRING "PUT", STRING part, INT64 size, RAW[size]  ← STRING ack
//! GET   → STRING "GET", STRING part                         ← INT64 size, RAW | INT64 -1
//! LS    → STRING "LS"                                       ← INT32 n, n × STRING
//! RM    → STRING "RM", STRING part                          ← STRING "DELETED .." | "NOT_FOUND"
//! PURGE → STRING "PURGE", STRING name                       ← INT32 deleted
//! ```

mod command;
mod frame;

pub use command::{read_command, write_command, Command, Incoming};
pub use frame::{
    encode_string, read_i32, read_i64, read_raw, read_size, read_string, skip_raw,
    try_read_string, write_i32, write_i64, write_raw, write_string, MAX_STRING_LEN,
    NOT_FOUND_SIZE,
};

/// Reply to a node RM when the file existed
pub const DELETED_PREFIX: &str = "DELETED";

/// Reply to a node RM when the file did not exist
pub const NOT_FOUND_REPLY: &str = "NOT_FOUND";

/// Prefix of every failure message sent as a STRING
pub const ERROR_PREFIX: &str = "ERROR:";
