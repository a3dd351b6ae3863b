//! Flat replay: one chronological byte stream.

use std::io::{self, Read};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use recmd_core::{Record, Stream};

#[derive(Debug, Clone)]
struct Entry {
    at: Duration,
    stream: Stream,
    data: Vec<u8>,
}

/// Replays a [`Record`] as a single byte stream through [`std::io::Read`].
///
/// Chunks of all three streams come out in timestamp order. Before the first
/// byte of every chunk after the first, the reader sleeps for the gap to the
/// previous chunk's timestamp, unless delays are ignored. Chunk boundaries
/// are never crossed by one `read` call.
///
/// # Example
///
/// ```
/// use std::io::Read;
/// use recmd_core::Record;
/// use recmd_replay::RecordReader;
///
/// let record = Record::empty("true", 0);
/// let mut reader = RecordReader::new(&record);
/// let mut out = Vec::new();
/// reader.read_to_end(&mut out).unwrap();
/// assert!(out.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct RecordReader {
    entries: Vec<Entry>,
    index: usize,
    offset: usize,
    ignore_time: bool,
}

impl RecordReader {
    /// Create a reader over all chunks of `record`.
    pub fn new(record: &Record) -> Self {
        let entries: Vec<Entry> = record
            .timeline()
            .into_iter()
            .map(|chunk| Entry {
                at: chunk.at,
                stream: chunk.stream,
                data: chunk.data.to_vec(),
            })
            .collect();

        debug!(
            "Flat replay of '{}': {} chunks over {:?}",
            record.command(),
            entries.len(),
            record.duration()
        );

        Self {
            entries,
            index: 0,
            offset: 0,
            ignore_time: false,
        }
    }

    /// Stop reproducing delays; chunks come out as fast as they are read.
    pub fn ignore_time(&mut self) {
        self.ignore_time = true;
    }

    /// Reproduce recorded delays again.
    pub fn respect_time(&mut self) {
        self.ignore_time = false;
    }

    /// Builder form of [`RecordReader::ignore_time`].
    pub fn without_delays(mut self) -> Self {
        self.ignore_time();
        self
    }

    /// Whether delays are skipped.
    pub fn ignores_time(&self) -> bool {
        self.ignore_time
    }

    /// Rewind to the first chunk.
    pub fn reset(&mut self) {
        self.index = 0;
        self.offset = 0;
    }

    /// Whether every chunk has been read.
    pub fn is_finished(&self) -> bool {
        self.index >= self.entries.len()
    }

    /// Number of chunks not yet fully read.
    pub fn remaining_chunks(&self) -> usize {
        self.entries.len().saturating_sub(self.index)
    }

    /// Stream of the chunk the next read will draw from.
    pub fn current_stream(&self) -> Option<Stream> {
        self.entries.get(self.index).map(|e| e.stream)
    }

    /// Sum of all gaps that are waited when delays are respected.
    pub fn total_delay(&self) -> Duration {
        (1..self.entries.len()).map(|i| self.delay_before(i)).sum()
    }

    fn delay_before(&self, index: usize) -> Duration {
        if index == 0 {
            return Duration::ZERO;
        }
        self.entries[index]
            .at
            .saturating_sub(self.entries[index - 1].at)
    }
}

impl From<&Record> for RecordReader {
    fn from(record: &Record) -> Self {
        Self::new(record)
    }
}

impl Read for RecordReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.index < self.entries.len() {
            if self.offset == 0 && !self.ignore_time {
                let delay = self.delay_before(self.index);
                if !delay.is_zero() {
                    trace!("Waiting {:?} before chunk {}", delay, self.index);
                    thread::sleep(delay);
                }
            }

            let (n, len) = {
                let data = &self.entries[self.index].data;
                let remaining = &data[self.offset..];
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                (n, data.len())
            };

            self.offset += n;
            if self.offset >= len {
                self.index += 1;
                self.offset = 0;
            }

            if n > 0 {
                return Ok(n);
            }
        }

        Ok(0)
    }
}
