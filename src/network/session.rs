//! Session orchestration
//!
//! A session owns one fresh connection for one validated line and drives it
//! through the exchange:
//!
//! ```text
//! Idle -> Connected -> InitSent -> AckReceived -> RequestsSent
//!      -> ResponsesReceived -> Done
//! ```
//!
//! Any failure moves the session to `Failed`. Nothing is retried; the
//! connection is closed on every exit path once it was opened.

use std::fmt;
use std::io;

use bytes::Bytes;
use thiserror::Error;

use super::connection::{Connection, ConnectionError};
use super::transport::TransportError;
use super::Connector;
use crate::protocol::{
    decode_frame, peek_type, segments, CodecError, HashHex, Line, Message, MessageType, Segment,
    HASH_RESPONSE_SIZE, HEADER_SIZE,
};
use crate::status::{Status, StatusSink};

/// Protocol violations reported by the server side of the exchange
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("Expected {expected}, received type {got} instead")]
    UnexpectedType { expected: MessageType, got: u16 },

    #[error(
        "{expected} bytes expected in response to {count} requests, server wants to send {got} instead"
    )]
    AckLengthMismatch { count: u32, expected: u32, got: u32 },

    #[error("Malformed message: {0}")]
    Malformed(#[from] CodecError),
}

/// Step of the exchange a transport failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Ack,
    Request { index: u32 },
    Responses,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Init => f.write_str("sending initialization message"),
            Stage::Ack => f.write_str("receiving acknowledgement"),
            Stage::Request { index } => write!(f, "sending hash request #{}", index),
            Stage::Responses => f.write_str("receiving hash responses"),
        }
    }
}

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Could not connect to server {peer}: {source}")]
    Connect {
        peer: String,
        #[source]
        source: io::Error,
    },

    #[error("Transport failure while {stage}: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: TransportError,
    },

    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Turns a connection error at `stage` into a session error
fn at(stage: Stage) -> impl FnOnce(ConnectionError) -> SessionError {
    move |error| match error {
        ConnectionError::Transport(source) => SessionError::Transport { stage, source },
        ConnectionError::Codec(e) => ProtocolViolation::Malformed(e).into(),
        ConnectionError::Closed => SessionError::Transport {
            stage,
            source: TransportError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection already closed",
            )),
        },
    }
}

/// State of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    InitSent,
    AckReceived,
    RequestsSent,
    ResponsesReceived,
    Done,
    Failed,
}

/// Hash results for one line, ordered by segment index.
///
/// A slot stays empty when no in-range response carried its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    slots: Vec<Option<HashHex>>,
}

impl ResultSet {
    /// Create a result set with `count` empty slots
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    /// Store a hash at `index`. Returns false, storing nothing, if out of range.
    /// A later hash for the same index replaces the earlier one.
    pub fn insert(&mut self, index: u32, hash: HashHex) -> bool {
        match self.slots.get_mut(index as usize) {
            Some(slot) => {
                *slot = Some(hash);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn get(&self, index: usize) -> Option<&HashHex> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when every slot holds a hash
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&HashHex>> {
        self.slots.iter().map(Option::as_ref)
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, slot) in self.iter().enumerate() {
            match slot {
                Some(hash) => writeln!(f, "{}: 0x{}", i, hash)?,
                None => writeln!(f, "{}: Invalid Response", i)?,
            }
        }
        Ok(())
    }
}

/// One protocol exchange for one line
pub struct Session<'a> {
    segments: Vec<Segment<'a>>,
    state: SessionState,
}

impl<'a> Session<'a> {
    pub fn new(line: &'a Line) -> Self {
        Self {
            segments: segments(line),
            state: SessionState::Idle,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[cfg(test)]
    pub fn segments(&self) -> &[Segment<'a>] {
        &self.segments
    }

    /// Number of HashRequests this session sends
    pub fn segment_count(&self) -> u32 {
        self.segments.len() as u32
    }

    /// Response length the server must commit to in its Ack
    pub fn expected_response_bytes(&self) -> u32 {
        // Line validation bounds the length so this cannot overflow
        self.segment_count() * HASH_RESPONSE_SIZE as u32
    }

    /// Run the whole exchange over a new connection from `connector`
    pub async fn run<C, K>(&mut self, connector: &C, sink: &mut K) -> SessionResult<ResultSet>
    where
        C: Connector + ?Sized,
        K: StatusSink + ?Sized,
    {
        let peer = connector.peer();
        let stream = match connector.connect().await {
            Ok(stream) => stream,
            Err(source) => {
                self.transition(SessionState::Failed);
                return Err(SessionError::Connect { peer, source });
            }
        };

        let mut conn = Connection::new(stream, peer.clone());
        self.transition(SessionState::Connected);
        sink.emit(Status::Connected { peer });

        let result = self.exchange(&mut conn, sink).await;

        if let Err(e) = conn.close().await {
            tracing::debug!("Error while closing connection to {}: {}", conn.peer(), e);
        }

        self.transition(if result.is_ok() {
            SessionState::Done
        } else {
            SessionState::Failed
        });
        result
    }

    async fn exchange<S, K>(
        &mut self,
        conn: &mut Connection<S>,
        sink: &mut K,
    ) -> SessionResult<ResultSet>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
        K: StatusSink + ?Sized,
    {
        let count = self.segment_count();

        conn.send(&Message::Init { count }).await.map_err(at(Stage::Init))?;
        self.transition(SessionState::InitSent);
        sink.emit(Status::InitSent { count });

        let ack = conn.receive_exact(HEADER_SIZE).await.map_err(at(Stage::Ack))?;
        let expected_bytes = decode_ack(&ack)?;
        let expected = self.expected_response_bytes();
        if expected_bytes != expected {
            return Err(ProtocolViolation::AckLengthMismatch {
                count,
                expected,
                got: expected_bytes,
            }
            .into());
        }
        self.transition(SessionState::AckReceived);
        sink.emit(Status::AckReceived { expected_bytes });

        for segment in &self.segments {
            let request = Message::HashRequest {
                payload: Bytes::copy_from_slice(segment.as_bytes()),
            };
            conn.send(&request)
                .await
                .map_err(at(Stage::Request { index: segment.index }))?;
            sink.emit(Status::RequestSent {
                index: segment.index,
                segment: segment.text.to_string(),
            });
        }
        self.transition(SessionState::RequestsSent);

        let body = conn
            .receive_exact(expected_bytes as usize)
            .await
            .map_err(at(Stage::Responses))?;

        let mut results = ResultSet::new(count as usize);
        for (record, chunk) in body.chunks_exact(HASH_RESPONSE_SIZE).enumerate() {
            let (index, hash) = decode_hash_response(chunk)?;
            sink.emit(Status::ResponseReceived { record, index });

            if !results.insert(index, hash) {
                tracing::debug!(
                    "Dropping hash response with index {} outside 0..{}",
                    index,
                    count
                );
            }
        }
        self.transition(SessionState::ResponsesReceived);

        Ok(results)
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!("Session state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Fail unless the frame in `buf` carries the `expected` type tag
fn expect_type(buf: &[u8], expected: MessageType) -> Result<(), ProtocolViolation> {
    let got = peek_type(buf).ok_or(ProtocolViolation::Malformed(CodecError::Incomplete))?;
    if got != expected.tag() {
        return Err(ProtocolViolation::UnexpectedType { expected, got });
    }
    Ok(())
}

fn decode_ack(buf: &[u8]) -> Result<u32, ProtocolViolation> {
    expect_type(buf, MessageType::Ack)?;
    match decode_frame(buf)? {
        Message::Ack { expected_bytes } => Ok(expected_bytes),
        other => Err(ProtocolViolation::UnexpectedType {
            expected: MessageType::Ack,
            got: other.message_type().tag(),
        }),
    }
}

fn decode_hash_response(buf: &[u8]) -> Result<(u32, HashHex), ProtocolViolation> {
    expect_type(buf, MessageType::HashResponse)?;
    match decode_frame(buf)? {
        Message::HashResponse { index, hex } => Ok((index, hex)),
        other => Err(ProtocolViolation::UnexpectedType {
            expected: MessageType::HashResponse,
            got: other.message_type().tag(),
        }),
    }
}
