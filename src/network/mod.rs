//! Network Module
//!
//! TCP server and connection handling.
//!
//! ## Architecture
//! - Single acceptor thread, polling so shutdown is noticed
//! - One thread per accepted connection, one command per connection
//! - Commands routed through a `Service` (coordinator or storage node)

mod server;
mod connection;

pub use server::{Server, ServerHandle, ServerOptions, Service};
pub use connection::Connection;
