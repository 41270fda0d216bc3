//! Connection handling
//!
//! Wraps one open stream to the hash server for the lifetime of a single
//! line's session:
//! - Message encoding before send
//! - Exact-length receives
//! - Byte/message statistics

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::transport::{receive_all, send_all, TransportError};
use crate::protocol::{encode, CodecError, Message};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Encoding error: {0}")]
    Codec(#[from] CodecError),

    #[error("Connection already closed")]
    Closed,
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// State of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Stream is open and usable
    Open,
    /// Stream has been shut down
    Closed,
}

/// Connection statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Messages sent
    pub messages_sent: u64,
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
}

/// An open connection to the hash server
pub struct Connection<S> {
    /// Remote peer description, for logging
    peer: String,
    /// The underlying stream
    stream: S,
    /// Write buffer
    write_buf: BytesMut,
    /// Connection state
    state: ConnectionState,
    /// Statistics
    stats: ConnectionStats,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established stream
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            stream,
            write_buf: BytesMut::with_capacity(64),
            state: ConnectionState::Open,
            stats: ConnectionStats::default(),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    #[cfg(test)]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[cfg(test)]
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Encode and send a message in full
    pub async fn send(&mut self, message: &Message) -> ConnectionResult<()> {
        if self.state == ConnectionState::Closed {
            return Err(ConnectionError::Closed);
        }

        self.write_buf.clear();
        encode(message, &mut self.write_buf)?;

        send_all(&mut self.stream, &self.write_buf).await?;

        self.stats.messages_sent += 1;
        self.stats.bytes_sent += self.write_buf.len() as u64;
        tracing::debug!(
            "Sent {} bytes ({}) to {}",
            self.write_buf.len(),
            message.message_type(),
            self.peer
        );

        Ok(())
    }

    /// Receive exactly `len` bytes
    pub async fn receive_exact(&mut self, len: usize) -> ConnectionResult<BytesMut> {
        if self.state == ConnectionState::Closed {
            return Err(ConnectionError::Closed);
        }

        let buf = receive_all(&mut self.stream, len).await?;
        self.stats.bytes_received += len as u64;
        tracing::debug!("Received {} bytes from {}", len, self.peer);

        Ok(buf)
    }

    /// Shut the stream down. Safe to call more than once.
    pub async fn close(&mut self) -> std::io::Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;

        tracing::debug!(
            "Closing connection to {} (sent {} messages / {} bytes, received {} bytes)",
            self.peer,
            self.stats.messages_sent,
            self.stats.bytes_sent,
            self.stats.bytes_received
        );

        self.stream.shutdown().await
    }
}
