//! Protocol message definitions
//!
//! Defines the four message types exchanged with the hash server.

use std::fmt;

use bytes::Bytes;

use super::HASH_HEX_LEN;

/// Message type tags as they appear on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    Init = 1,
    Ack = 2,
    HashRequest = 3,
    HashResponse = 4,
}

impl MessageType {
    /// Map a raw tag to a known type
    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            1 => Some(Self::Init),
            2 => Some(Self::Ack),
            3 => Some(Self::HashRequest),
            4 => Some(Self::HashResponse),
            _ => None,
        }
    }

    pub fn tag(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Init => "Init",
            MessageType::Ack => "Acknowledgement",
            MessageType::HashRequest => "HashRequest",
            MessageType::HashResponse => "HashResponse",
        };
        write!(f, "{} (type {})", name, self.tag())
    }
}

/// The 32 hex digits of a HashResponse.
///
/// The bytes are kept exactly as received; nothing checks that they are
/// valid hex digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashHex([u8; HASH_HEX_LEN]);

impl HashHex {
    #[cfg(test)]
    pub fn new(bytes: [u8; HASH_HEX_LEN]) -> Self {
        Self(bytes)
    }

    /// Build from a slice, returning `None` unless it is exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; HASH_HEX_LEN]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_HEX_LEN] {
        &self.0
    }
}

impl fmt::Display for HashHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.escape_ascii())
    }
}

impl fmt::Debug for HashHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashHex({})", self)
    }
}

/// All protocol messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Announces how many HashRequests follow
    Init { count: u32 },

    /// Server's commitment to the total byte length of all responses
    Ack { expected_bytes: u32 },

    /// One segment of a line; the wire length field is `payload.len()`
    HashRequest { payload: Bytes },

    /// Hash of the segment at `index`
    HashResponse { index: u32, hex: HashHex },
}

impl Message {
    /// Get the message type
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Init { .. } => MessageType::Init,
            Message::Ack { .. } => MessageType::Ack,
            Message::HashRequest { .. } => MessageType::HashRequest,
            Message::HashResponse { .. } => MessageType::HashResponse,
        }
    }

    /// Number of bytes this message occupies on the wire
    pub fn encoded_len(&self) -> usize {
        match self {
            Message::Init { .. } | Message::Ack { .. } => super::HEADER_SIZE,
            Message::HashRequest { payload } => super::HEADER_SIZE + payload.len(),
            Message::HashResponse { .. } => super::HASH_RESPONSE_SIZE,
        }
    }
}
