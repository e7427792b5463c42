//! TCP Server
//!
//! Accepts connections and hands each one to its own thread.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Result, ShardError};

use super::Connection;

/// How long the accept loop sleeps when nobody is knocking
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Something that serves one connection to completion
pub trait Service: Send + Sync + 'static {
    /// Short name used in thread names and logs
    fn name(&self) -> &'static str;

    /// Serve a single connection; the connection closes when this returns
    fn serve(&self, conn: Connection) -> Result<()>;
}

/// Listener settings shared by both server kinds
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub max_connections: usize,

    /// Read/write timeout for accepted connections; reads are bounded only
    /// after the command verb arrives
    pub timeout: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_connections: 1024,
            timeout: None,
        }
    }
}

/// Thread-per-connection TCP server
pub struct Server<S: Service> {
    listener: TcpListener,
    local_addr: SocketAddr,
    service: Arc<S>,
    options: ServerOptions,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl<S: Service> Server<S> {
    /// Bind the listener; the service is shared by every connection thread
    pub fn bind(listen_addr: &str, service: S, options: ServerOptions) -> Result<Self> {
        let listener = TcpListener::bind(listen_addr).map_err(|e| {
            ShardError::Network(format!("cannot listen on {}: {}", listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            service: Arc::new(service),
            options,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Flag that stops the accept loop once set
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signal the server to stop accepting
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Run the accept loop on the calling thread until shutdown
    ///
    /// In-flight connections keep their threads and finish on their own.
    pub fn run(&self) -> Result<()> {
        tracing::info!("{} listening on {}", self.service.name(), self.local_addr);

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("{} accept failed: {}", self.service.name(), e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("{} on {} stopped accepting", self.service.name(), self.local_addr);
        Ok(())
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self) -> Result<ServerHandle> {
        let addr = self.local_addr;
        let shutdown = self.shutdown_flag();
        let name = format!("{}-accept", self.service.name());
        let join = thread::Builder::new().name(name).spawn(move || {
            if let Err(e) = self.run() {
                tracing::error!("Server on {} failed: {}", addr, e);
            }
        })?;

        Ok(ServerHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        if self.active.load(Ordering::Acquire) >= self.options.max_connections {
            tracing::warn!(
                "Refusing {}: {} connections already open",
                peer,
                self.options.max_connections
            );
            return;
        }

        let service = Arc::clone(&self.service);
        let active = Arc::clone(&self.active);
        let timeout = self.options.timeout;
        active.fetch_add(1, Ordering::AcqRel);

        let spawned = thread::Builder::new()
            .name(format!("{}-conn", service.name()))
            .spawn(move || {
                let _guard = ActiveGuard(active);
                if let Err(e) = serve_stream(&*service, stream, timeout) {
                    if e.is_disconnect() || e.is_timeout() {
                        tracing::debug!("Connection from {} ended: {}", peer, e);
                    } else {
                        tracing::warn!("Connection from {} failed: {}", peer, e);
                    }
                }
            });

        if let Err(e) = spawned {
            self.active.fetch_sub(1, Ordering::AcqRel);
            tracing::error!("Cannot spawn handler for {}: {}", peer, e);
        }
    }
}

fn serve_stream<S: Service>(service: &S, stream: TcpStream, timeout: Option<Duration>) -> Result<()> {
    // Accepted sockets inherit non-blocking mode on some platforms
    stream.set_nonblocking(false)?;
    let mut conn = Connection::new(stream)?;
    conn.set_timeouts_after_command(timeout)?;
    tracing::debug!("Connection established from {}", conn.peer_addr());
    service.serve(conn)
}

/// Decrements the live connection count when a handler thread exits
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Handle to a server running on a background thread
///
/// Dropping the handle stops the accept loop.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and wait for the accept loop to exit
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
