//! Network module - Handles TCP communication with the hash server
//!
//! Provides:
//! - All-or-nothing send/receive over a byte stream
//! - A per-line connection wrapper
//! - The session state machine that drives one Init/Ack/Request/Response exchange

mod connection;
mod session;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::*;
pub use session::*;
pub use transport::*;

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Address of the hash server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Host name or IP address
    pub host: String,
    /// Port to connect to
    pub port: u16,
}

impl NetworkConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", crate::protocol::DEFAULT_PORT)
    }
}

/// Resolve a hostname to a socket address
pub async fn resolve_host(host: &str, port: u16) -> io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let mut addrs = lookup_host((host, port)).await?;

    addrs.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}

/// Opens a fresh byte stream to the hash server.
///
/// Called once per line; the stream is dropped when that line's session ends.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Open a new connection. A single attempt, no retry.
    async fn connect(&self) -> io::Result<Self::Stream>;

    /// Human-readable description of the remote end
    fn peer(&self) -> String;
}

/// Connects over TCP
#[derive(Debug, Clone)]
pub struct TcpConnector {
    config: NetworkConfig,
}

impl TcpConnector {
    pub fn new(config: NetworkConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        let addr = resolve_host(&self.config.host, self.config.port).await?;
        tracing::debug!("Connecting to {}", addr);
        TcpStream::connect(addr).await
    }

    fn peer(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}
