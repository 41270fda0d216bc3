//! Input line validation
//!
//! A line may only be hashed if it is non-empty and every byte is printable
//! ASCII (0x20..=0x7E). Validation happens before any connection is opened.

use std::fmt;

use thiserror::Error;

use super::{HASH_RESPONSE_SIZE, SEGMENT_LEN};

/// Longest line whose response length still fits the u32 `expected_bytes` field
pub const MAX_LINE_LEN: usize = (u32::MAX as usize / HASH_RESPONSE_SIZE) * SEGMENT_LEN;

/// Validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Line was empty")]
    Empty,

    #[error("Line contains byte 0x{byte:02X} at position {position}, outside the printable ASCII range")]
    NonPrintable { position: usize, byte: u8 },

    #[error("Line is {0} characters long (max: {max})", max = MAX_LINE_LEN)]
    TooLong(usize),
}

/// Returns true for bytes in the printable ASCII range 0x20..=0x7E
pub fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte)
}

/// A validated input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line(String);

impl Line {
    /// Validate raw bytes as a line
    pub fn parse(raw: &[u8]) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::Empty);
        }

        if let Some(position) = raw.iter().position(|&b| !is_printable(b)) {
            return Err(ValidationError::NonPrintable {
                position,
                byte: raw[position],
            });
        }

        if raw.len() > MAX_LINE_LEN {
            return Err(ValidationError::TooLong(raw.len()));
        }

        // Printable ASCII is always valid UTF-8
        let text = raw.iter().map(|&b| b as char).collect();
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl TryFrom<&str> for Line {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value.as_bytes())
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
