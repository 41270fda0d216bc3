//! All-or-nothing stream transfers
//!
//! `send_all` and `receive_all` either move the full requested byte count or
//! fail. Short transfers from the underlying stream are continued in a loop;
//! a transfer of zero bytes ends the exchange immediately, whether the peer
//! closed cleanly or not.

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed after {transferred} of {expected} bytes")]
    Closed { transferred: usize, expected: usize },
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Write all of `buf` to the stream
pub async fn send_all<W>(writer: &mut W, buf: &[u8]) -> TransportResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut sent = 0;
    while sent < buf.len() {
        let n = writer.write(&buf[sent..]).await?;
        if n == 0 {
            return Err(TransportError::Closed {
                transferred: sent,
                expected: buf.len(),
            });
        }
        sent += n;
    }

    writer.flush().await?;
    Ok(())
}

/// Read exactly `len` bytes from the stream
pub async fn receive_all<R>(reader: &mut R, len: usize) -> TransportResult<BytesMut>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = BytesMut::zeroed(len);
    let mut received = 0;
    while received < len {
        let n = reader.read(&mut buf[received..]).await?;
        if n == 0 {
            return Err(TransportError::Closed {
                transferred: received,
                expected: len,
            });
        }
        received += n;
    }

    Ok(buf)
}
