//! Line input
//!
//! Reads raw byte lines lazily. Bytes are not decoded here; deciding what a
//! valid line is belongs to `protocol::Line`.

use std::io;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Yields newline-separated lines from a buffered reader
pub struct LineReader<R> {
    reader: R,
    line_no: usize,
}

impl LineReader<BufReader<File>> {
    /// Open a file for line-by-line reading
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R> LineReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self { reader, line_no: 0 }
    }

    /// Number of lines yielded so far
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Read the next line without its terminator.
    ///
    /// Strips `\n` and, if present, one `\r` before it. Returns `None` at end
    /// of input. A final line with no terminator is still returned.
    pub async fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(None);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }

        self.line_no += 1;
        Ok(Some(line))
    }
}
