//! Status reporting
//!
//! The client reports progress and failures as typed `Status` events to a
//! `StatusSink`. Sinks are write-only and must keep events in the order they
//! were emitted.

use std::fmt;

use tracing::Level;

use crate::network::SessionError;
use crate::protocol::{HashHex, ValidationError};

/// Progress and error events produced while processing lines
#[derive(Debug)]
pub enum Status {
    /// Line failed validation; no connection was opened
    LineRejected { line_no: usize, reason: ValidationError },
    /// Connection to the server is open
    Connected { peer: String },
    /// Init message sent
    InitSent { count: u32 },
    /// Ack received and accepted
    AckReceived { expected_bytes: u32 },
    /// One HashRequest sent
    RequestSent { index: u32, segment: String },
    /// One 38-byte HashResponse record decoded
    ResponseReceived { record: usize, index: u32 },
    /// One slot of a completed ResultSet
    HashResult { index: usize, hash: Option<HashHex> },
    /// Session for a line aborted
    SessionFailed { line_no: usize, error: SessionError },
    /// Session for a line completed and its connection was closed
    SessionClosed { line_no: usize },
}

impl Status {
    /// Severity used when forwarding to `tracing`
    pub fn level(&self) -> Level {
        match self {
            Status::LineRejected { .. } => Level::WARN,
            Status::SessionFailed { .. } => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::LineRejected { line_no, reason } => {
                write!(f, "Line {} skipped: {}", line_no, reason)
            }
            Status::Connected { peer } => write!(f, "Connected to server {}", peer),
            Status::InitSent { count } => {
                write!(f, "Sent initialization message ({} hash requests)", count)
            }
            Status::AckReceived { expected_bytes } => write!(
                f,
                "Received acknowledgement. Expecting {} total bytes in response",
                expected_bytes
            ),
            Status::RequestSent { index, segment } => write!(
                f,
                "Sent hash request #{} for segment '{}' of length {} bytes",
                index,
                segment,
                segment.len()
            ),
            Status::ResponseReceived { record, index } => {
                write!(f, "Received hash response #{} (index {})", record, index)
            }
            Status::HashResult { index, hash } => match hash {
                Some(hash) => write!(f, "{}: 0x{}", index, hash),
                None => write!(f, "{}: Invalid Response", index),
            },
            Status::SessionFailed { line_no, error } => {
                write!(f, "Line {} failed: {}", line_no, error)
            }
            Status::SessionClosed { line_no } => {
                write!(f, "Line {} done, connection closed", line_no)
            }
        }
    }
}

/// Receives status events in order
pub trait StatusSink {
    fn emit(&mut self, status: Status);
}

impl StatusSink for Vec<Status> {
    fn emit(&mut self, status: Status) {
        self.push(status);
    }
}

/// Forwards status events to `tracing`, which fans them out to the
/// console and the log file
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn emit(&mut self, status: Status) {
        let level = status.level();
        if level == Level::ERROR {
            tracing::error!("{}", status);
        } else if level == Level::WARN {
            tracing::warn!("{}", status);
        } else {
            tracing::info!("{}", status);
        }
    }
}
