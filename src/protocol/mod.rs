//! Protocol module - Defines the wire protocol spoken with the hash server
//!
//! Every message starts with the same 6-byte header:
//! - 2 bytes message type (big-endian)
//! - 4 bytes type-specific field (big-endian)
//!
//! `HashRequest` is followed by `length` payload bytes and `HashResponse`
//! by 32 bytes of hex-encoded hash. `Init` and `Ack` are header-only.

mod message;
mod codec;
mod segment;
mod validate;

pub use message::*;
pub use codec::*;
pub use segment::*;
pub use validate::*;

/// Default port of the hash server
pub const DEFAULT_PORT: u16 = 5050;

/// Header size: type(2) + field(4) = 6 bytes
pub const HEADER_SIZE: usize = 6;

/// Number of hex digits carried by a HashResponse
pub const HASH_HEX_LEN: usize = 32;

/// Wire size of one HashResponse record
pub const HASH_RESPONSE_SIZE: usize = HEADER_SIZE + HASH_HEX_LEN;

/// Maximum characters of a line carried by one HashRequest
pub const SEGMENT_LEN: usize = 16;

/// Upper bound accepted for a HashRequest payload when decoding (64 KiB)
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;
