//! Protocol codec for encoding/decoding messages
//!
//! Handles the fixed-width, big-endian framing of protocol messages.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use super::{HashHex, Message, MessageType, HASH_HEX_LEN, HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unexpected message type {0}")]
    UnexpectedType(u16),

    #[error("Payload too large: {0} bytes (max: {1})")]
    PayloadTooLarge(usize, usize),

    #[error("Incomplete message")]
    Incomplete,

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

/// Encode a message into a buffer
pub fn encode(message: &Message, buf: &mut BytesMut) -> Result<(), CodecError> {
    buf.reserve(message.encoded_len());
    buf.put_u16(message.message_type().tag());

    match message {
        Message::Init { count } => buf.put_u32(*count),
        Message::Ack { expected_bytes } => buf.put_u32(*expected_bytes),
        Message::HashRequest { payload } => {
            if payload.len() > MAX_PAYLOAD_SIZE {
                return Err(CodecError::PayloadTooLarge(payload.len(), MAX_PAYLOAD_SIZE));
            }
            buf.put_u32(payload.len() as u32);
            buf.put_slice(payload);
        }
        Message::HashResponse { index, hex } => {
            buf.put_u32(*index);
            buf.put_slice(hex.as_bytes());
        }
    }

    Ok(())
}

/// Read the type tag at the front of a buffer without consuming it
pub fn peek_type(buf: &[u8]) -> Option<u16> {
    match buf {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

/// Decode exactly one complete message from `bytes`
pub fn decode_frame(bytes: &[u8]) -> Result<Message, CodecError> {
    let mut buf = BytesMut::from(bytes);
    let message = Decoder::new().decode(&mut buf)?.ok_or(CodecError::Incomplete)?;

    if !buf.is_empty() {
        return Err(CodecError::TrailingBytes(buf.len()));
    }
    Ok(message)
}

/// Decodes messages from a byte stream
pub struct Decoder {
    state: DecodeState,
}

#[derive(Default)]
enum DecodeState {
    #[default]
    Header,
    Body {
        message_type: MessageType,
        field: u32,
        length: usize,
    },
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::Header,
        }
    }

    /// Attempt to decode a message from the buffer
    /// Returns Ok(None) if more data is needed
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        loop {
            match &self.state {
                DecodeState::Header => {
                    if buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    let tag = u16::from_be_bytes([buf[0], buf[1]]);
                    let field = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
                    let message_type =
                        MessageType::from_tag(tag).ok_or(CodecError::UnexpectedType(tag))?;

                    let length = match message_type {
                        MessageType::Init => {
                            buf.advance(HEADER_SIZE);
                            return Ok(Some(Message::Init { count: field }));
                        }
                        MessageType::Ack => {
                            buf.advance(HEADER_SIZE);
                            return Ok(Some(Message::Ack {
                                expected_bytes: field,
                            }));
                        }
                        MessageType::HashRequest => {
                            let length = field as usize;
                            if length > MAX_PAYLOAD_SIZE {
                                return Err(CodecError::PayloadTooLarge(length, MAX_PAYLOAD_SIZE));
                            }
                            length
                        }
                        MessageType::HashResponse => HASH_HEX_LEN,
                    };

                    buf.advance(HEADER_SIZE);

                    self.state = DecodeState::Body {
                        message_type,
                        field,
                        length,
                    };
                }
                DecodeState::Body {
                    message_type,
                    field,
                    length,
                } => {
                    if buf.len() < *length {
                        return Ok(None);
                    }

                    let body = buf.split_to(*length).freeze();
                    let message = match message_type {
                        MessageType::HashResponse => Message::HashResponse {
                            index: *field,
                            hex: HashHex::from_slice(&body).ok_or(CodecError::Incomplete)?,
                        },
                        _ => Message::HashRequest { payload: body },
                    };

                    self.state = DecodeState::Header;

                    return Ok(Some(message));
                }
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
