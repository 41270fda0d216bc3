//! Hash client
//!
//! Drives lines through validation, one session each, and reporting.
//! Lines are handled strictly one after another: a line's connection is
//! closed before the next line is read.

use std::fmt;
use std::io;

use tokio::io::AsyncBufRead;
use tracing::Instrument;

use crate::input::LineReader;
use crate::network::{Connector, ResultSet, Session};
use crate::protocol::Line;
use crate::status::{Status, StatusSink};

/// Outcome of one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Failed validation, never sent
    Rejected,
    /// Session aborted
    Failed,
    /// Session completed
    Completed(ResultSet),
}

/// Counters over a whole input
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub lines: usize,
    pub rejected: usize,
    pub failed: usize,
    pub completed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines read: {} completed, {} failed, {} rejected",
            self.lines, self.completed, self.failed, self.rejected
        )
    }
}

/// Sends lines to the hash server and reports the results
pub struct HashClient<C, S> {
    connector: C,
    sink: S,
    summary: RunSummary,
}

impl<C, S> HashClient<C, S>
where
    C: Connector,
    S: StatusSink,
{
    pub fn new(connector: C, sink: S) -> Self {
        Self {
            connector,
            sink,
            summary: RunSummary::default(),
        }
    }

    #[cfg(test)]
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    #[cfg(test)]
    pub fn connector(&self) -> &C {
        &self.connector
    }

    #[cfg(test)]
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Process every line from `reader`.
    ///
    /// Only a read error on the input ends the run early; per-line failures
    /// are reported and skipped.
    pub async fn run<R>(&mut self, reader: &mut LineReader<R>) -> io::Result<RunSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        while let Some(raw) = reader.next_line().await? {
            let line_no = reader.line_no();
            if let LineOutcome::Completed(results) = self.process_line(line_no, &raw).await {
                if !results.is_complete() {
                    tracing::warn!("Line {} is missing hash responses", line_no);
                }
            }
        }

        Ok(self.summary)
    }

    /// Validate one raw line and, if valid, run its session
    pub async fn process_line(&mut self, line_no: usize, raw: &[u8]) -> LineOutcome {
        let span = tracing::info_span!("line", line_no);
        self.process(line_no, raw).instrument(span).await
    }

    async fn process(&mut self, line_no: usize, raw: &[u8]) -> LineOutcome {
        self.summary.lines += 1;

        let line = match Line::parse(raw) {
            Ok(line) => line,
            Err(reason) => {
                self.summary.rejected += 1;
                self.sink.emit(Status::LineRejected { line_no, reason });
                return LineOutcome::Rejected;
            }
        };

        let mut session = Session::new(&line);
        tracing::debug!(
            "Processing {} characters in {} segments",
            line.len(),
            session.segment_count()
        );

        match session.run(&self.connector, &mut self.sink).await {
            Ok(results) => {
                for (index, hash) in results.iter().enumerate() {
                    self.sink.emit(Status::HashResult {
                        index,
                        hash: hash.copied(),
                    });
                }
                self.sink.emit(Status::SessionClosed { line_no });
                self.summary.completed += 1;
                LineOutcome::Completed(results)
            }
            Err(error) => {
                self.summary.failed += 1;
                self.sink.emit(Status::SessionFailed { line_no, error });
                LineOutcome::Failed
            }
        }
    }
}
