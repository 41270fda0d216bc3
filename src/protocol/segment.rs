//! Splitting lines into protocol-sized segments

use super::{Line, SEGMENT_LEN};

/// One slice of a line, sent as a single HashRequest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Position of the segment within its line
    pub index: u32,
    /// At most `SEGMENT_LEN` characters
    pub text: &'a str,
}

impl<'a> Segment<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.text.as_bytes()
    }
}

/// Number of segments needed for a line of `len` characters
pub fn segment_count(len: usize) -> usize {
    len.div_ceil(SEGMENT_LEN)
}

/// Split a line at `SEGMENT_LEN` boundaries, in request order
pub fn segments(line: &Line) -> Vec<Segment<'_>> {
    let text = line.as_str();
    (0..segment_count(text.len()))
        .map(|i| {
            let start = i * SEGMENT_LEN;
            let end = (start + SEGMENT_LEN).min(text.len());
            Segment {
                index: i as u32,
                text: &text[start..end],
            }
        })
        .collect()
}
