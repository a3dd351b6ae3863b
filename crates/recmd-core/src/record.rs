//! The record data model.
//!
//! A [`Record`] is the complete timed interaction of one child process: the
//! command line it was started with, its exit code, and three time-indexed
//! chunk buffers for stdout, stdin and stderr.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::format::Format;

/// Chunks of one stream, keyed by elapsed time since the session start.
///
/// Keys are unique per stream; a chunk is exactly what one read or write call
/// carried.
pub type Chunks = BTreeMap<Duration, Vec<u8>>;

/// Which I/O role a chunk belongs to.
///
/// The declaration order is the tie-break order used when chunks of two
/// different streams share a timestamp: out, then in, then err.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    /// Child standard output
    Out,
    /// Child standard input
    In,
    /// Child standard error
    Err,
}

impl Stream {
    /// All streams in tie-break order.
    pub const ALL: [Stream; 3] = [Stream::Out, Stream::In, Stream::Err];

    /// Field name used in the persisted artifact.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Out => "out",
            Stream::In => "in",
            Stream::Err => "err",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chunk placed on the merged timeline of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedChunk<'a> {
    /// Elapsed time since the session start
    pub at: Duration,
    /// Stream the chunk was captured on
    pub stream: Stream,
    /// Captured bytes
    pub data: &'a [u8],
}

/// A recorded child process interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    command: String,
    exit_code: i32,
    format: Format,
    out: Chunks,
    input: Chunks,
    err: Chunks,
}

impl Record {
    /// Create a sealed record from its parts.
    pub fn new(
        command: impl Into<String>,
        exit_code: i32,
        format: Format,
        out: Chunks,
        input: Chunks,
        err: Chunks,
    ) -> Self {
        Self {
            command: command.into(),
            exit_code,
            format,
            out,
            input,
            err,
        }
    }

    /// Create a record with no captured chunks.
    pub fn empty(command: impl Into<String>, exit_code: i32) -> Self {
        Self::new(
            command,
            exit_code,
            Format::default(),
            Chunks::new(),
            Chunks::new(),
            Chunks::new(),
        )
    }

    /// The fully-resolved command line as invoked.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Exit status of the recorded process.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// On-disk format this record serializes to.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Captured standard output chunks.
    pub fn stdout(&self) -> &Chunks {
        &self.out
    }

    /// Captured standard input chunks.
    pub fn stdin(&self) -> &Chunks {
        &self.input
    }

    /// Captured standard error chunks.
    pub fn stderr(&self) -> &Chunks {
        &self.err
    }

    /// Chunks of the given stream.
    pub fn chunks(&self, stream: Stream) -> &Chunks {
        match stream {
            Stream::Out => &self.out,
            Stream::In => &self.input,
            Stream::Err => &self.err,
        }
    }

    /// Total number of chunks across all three streams.
    pub fn chunk_count(&self) -> usize {
        self.out.len() + self.input.len() + self.err.len()
    }

    /// Whether nothing was captured on any stream.
    pub fn is_empty(&self) -> bool {
        self.chunk_count() == 0
    }

    /// Timestamp of the last captured chunk, or zero for an empty record.
    pub fn duration(&self) -> Duration {
        Stream::ALL
            .iter()
            .filter_map(|s| self.chunks(*s).keys().next_back().copied())
            .max()
            .unwrap_or_default()
    }

    /// Merge the three streams into one chronological timeline.
    ///
    /// Chunks are ordered by timestamp; chunks of different streams sharing
    /// a timestamp are all kept and ordered out, in, err.
    pub fn timeline(&self) -> Vec<TimedChunk<'_>> {
        let mut merged: Vec<TimedChunk<'_>> = Stream::ALL
            .iter()
            .flat_map(|stream| {
                self.chunks(*stream).iter().map(|(at, data)| TimedChunk {
                    at: *at,
                    stream: *stream,
                    data: data.as_slice(),
                })
            })
            .collect();

        merged.sort_by_key(|chunk| (chunk.at, chunk.stream));
        merged
    }

    /// Same record with a different declared format and identical chunks.
    pub(crate) fn with_format(&self, format: Format) -> Self {
        Self {
            format,
            ..self.clone()
        }
    }

    /// Apply `f` to every chunk of every stream, producing a new record.
    pub(crate) fn map_chunks<F>(&self, format: Format, mut f: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8>,
    {
        let mut map = |chunks: &Chunks| -> Chunks {
            chunks.iter().map(|(at, data)| (*at, f(data))).collect()
        };

        Self {
            command: self.command.clone(),
            exit_code: self.exit_code,
            format,
            out: map(&self.out),
            input: map(&self.input),
            err: map(&self.err),
        }
    }
}
