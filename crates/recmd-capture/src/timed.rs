//! Timestamping I/O channels.
//!
//! A [`TimedChannel`] wraps one writer or one reader and records every chunk
//! passing through it, stamped with the time elapsed since a start instant,
//! while the bytes themselves flow through untouched. Chunks land in a
//! [`ChunkLog`], a cheaply clonable handle that can be read at any time,
//! even while the channel is still in use by another task.

use std::io::{self, Read, Write};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use recmd_core::{Chunks, Error};

#[derive(Debug, Default)]
struct LogState {
    chunks: Chunks,
    last: Option<Duration>,
    bytes: usize,
}

/// Append-only, internally synchronized log of timestamped chunks.
///
/// Timestamps are strictly increasing: a chunk arriving at or before the
/// previous one (coarse clocks, clock ties) is moved one nanosecond past it,
/// so no chunk ever overwrites another.
#[derive(Debug, Clone, Default)]
pub struct ChunkLog {
    state: Arc<Mutex<LogState>>,
}

impl ChunkLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a copy of `data` at `at`, returning the timestamp actually used.
    pub fn push(&self, at: Duration, data: &[u8]) -> Duration {
        let mut state = self.state.lock();

        let at = match state.last {
            Some(prev) if at <= prev => prev + Duration::from_nanos(1),
            _ => at,
        };

        state.chunks.insert(at, data.to_vec());
        state.last = Some(at);
        state.bytes += data.len();
        at
    }

    /// Number of chunks captured so far.
    pub fn len(&self) -> usize {
        self.state.lock().chunks.len()
    }

    /// Whether nothing has been captured yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes captured so far.
    pub fn total_bytes(&self) -> usize {
        self.state.lock().bytes
    }

    /// Copy of everything captured so far.
    pub fn snapshot(&self) -> Chunks {
        self.state.lock().chunks.clone()
    }
}

/// An I/O channel that timestamps every chunk it passes through.
///
/// Wrapping a writer captures writes ([`TimedChannel::write_log`]); wrapping
/// a reader captures reads ([`TimedChannel::read_log`]). Both the blocking
/// `std::io` traits and the tokio async traits are implemented.
///
/// # Example
///
/// ```
/// use std::io::Write;
/// use recmd_capture::TimedChannel;
///
/// let mut channel = TimedChannel::wrap(Vec::new());
/// channel.write_all(b"hello").unwrap();
///
/// assert_eq!(channel.get_ref().unwrap(), b"hello");
/// assert_eq!(channel.write_log().len(), 1);
/// ```
#[derive(Debug)]
pub struct TimedChannel<T> {
    inner: Option<T>,
    start: Option<Instant>,
    written: ChunkLog,
    read: ChunkLog,
}

impl<T> Default for TimedChannel<T> {
    fn default() -> Self {
        Self::detached()
    }
}

impl<T> TimedChannel<T> {
    /// Channel with nothing behind it.
    ///
    /// Writes are captured and dropped; reads fail with [`Error::NoSource`].
    pub fn detached() -> Self {
        Self {
            inner: None,
            start: None,
            written: ChunkLog::new(),
            read: ChunkLog::new(),
        }
    }

    /// Channel forwarding to (or pulling from) `inner`.
    pub fn wrap(inner: T) -> Self {
        Self {
            inner: Some(inner),
            ..Self::detached()
        }
    }

    /// Use `start` as time zero instead of the instant of first use.
    ///
    /// Channels that must share one clock (stdout, stderr and stdin of the
    /// same process) are given the same start.
    pub fn start_at(mut self, start: Instant) -> Self {
        self.start = Some(start);
        self
    }

    /// Time zero, once known.
    pub fn start(&self) -> Option<Instant> {
        self.start
    }

    /// Handle to the chunks written through this channel.
    pub fn write_log(&self) -> ChunkLog {
        self.written.clone()
    }

    /// Handle to the chunks read through this channel.
    pub fn read_log(&self) -> ChunkLog {
        self.read.clone()
    }

    /// Wrapped stream, if any.
    pub fn get_ref(&self) -> Option<&T> {
        self.inner.as_ref()
    }

    /// Mutable access to the wrapped stream, if any.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.inner.as_mut()
    }

    /// Unwrap the channel. The logs stay reachable through earlier handles.
    pub fn into_inner(self) -> Option<T> {
        self.inner
    }

    fn elapsed(&mut self) -> Duration {
        self.start.get_or_insert_with(Instant::now).elapsed()
    }
}

impl<W: Write> Write for TimedChannel<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let at = self.elapsed();
        let n = match self.inner.as_mut() {
            Some(writer) => writer.write(buf)?,
            None => buf.len(),
        };
        if n > 0 {
            self.written.push(at, &buf[..n]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<R: Read> Read for TimedChannel<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.elapsed();
        let reader = self.inner.as_mut().ok_or_else(|| Error::NoSource.into_io())?;
        let n = reader.read(buf)?;
        if n > 0 {
            let at = self.elapsed();
            self.read.push(at, &buf[..n]);
        }
        Ok(n)
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for TimedChannel<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let at = this.elapsed();

        let n = match this.inner.as_mut() {
            Some(writer) => match Pin::new(writer).poll_write(cx, buf) {
                Poll::Ready(Ok(n)) => n,
                other => return other,
            },
            None => buf.len(),
        };

        if n > 0 {
            this.written.push(at, &buf[..n]);
        }
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().inner.as_mut() {
            Some(writer) => Pin::new(writer).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().inner.as_mut() {
            Some(writer) => Pin::new(writer).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TimedChannel<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.elapsed();

        let Some(reader) = this.inner.as_mut() else {
            return Poll::Ready(Err(Error::NoSource.into_io()));
        };

        let before = buf.filled().len();
        match Pin::new(reader).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let fresh = &buf.filled()[before..];
                if !fresh.is_empty() {
                    let at = this.elapsed();
                    this.read.push(at, fresh);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_passes_bytes_through() {
        let mut channel = TimedChannel::wrap(Vec::new());
        channel.write_all(b"Hello, ").unwrap();
        channel.write_all(b"world!").unwrap();

        assert_eq!(channel.get_ref().unwrap(), b"Hello, world!");
        let chunks = channel.write_log().snapshot();
        let data: Vec<&[u8]> = chunks.values().map(Vec::as_slice).collect();
        assert_eq!(data, vec![&b"Hello, "[..], b"world!"]);
        assert!(channel.read_log().is_empty());
    }

    #[test]
    fn test_write_copy_is_independent_of_caller_buffer() {
        let mut channel = TimedChannel::wrap(Vec::new());
        let mut buf = *b"abc";
        channel.write_all(&buf).unwrap();
        buf.copy_from_slice(b"xyz");
        channel.write_all(&buf).unwrap();

        let chunks = channel.write_log().snapshot();
        let data: Vec<&[u8]> = chunks.values().map(Vec::as_slice).collect();
        assert_eq!(data, vec![&b"abc"[..], b"xyz"]);
    }

    #[test]
    fn test_detached_write_is_captured() {
        let mut channel: TimedChannel<Vec<u8>> = TimedChannel::detached();
        assert_eq!(channel.write(b"dropped").unwrap(), 7);
        assert_eq!(channel.write_log().total_bytes(), 7);
    }

    #[test]
    fn test_read_without_source() {
        let mut channel: TimedChannel<&[u8]> = TimedChannel::detached();
        let mut buf = [0u8; 8];
        let err = channel.read(&mut buf).unwrap_err();
        assert!(matches!(Error::from_io(err), Error::NoSource));
    }

    #[test]
    fn test_read_passes_bytes_through() {
        let mut channel = TimedChannel::wrap(&b"input data"[..]);
        let mut buf = [0u8; 5];

        assert_eq!(channel.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"input");
        assert_eq!(channel.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b" data");
        assert_eq!(channel.read(&mut buf).unwrap(), 0);

        let log = channel.read_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log.total_bytes(), 10);
    }

    #[test]
    fn test_first_use_sets_start() {
        let mut channel = TimedChannel::wrap(Vec::new());
        assert!(channel.start().is_none());
        channel.write_all(b"x").unwrap();
        assert!(channel.start().is_some());
    }

    #[test]
    fn test_shared_start_instant() {
        let start = Instant::now();
        std::thread::sleep(Duration::from_millis(20));

        let mut channel = TimedChannel::wrap(Vec::new()).start_at(start);
        channel.write_all(b"late").unwrap();

        let at = *channel.write_log().snapshot().keys().next().unwrap();
        assert!(at >= Duration::from_millis(20));
    }

    #[test]
    fn test_timestamps_are_strictly_increasing() {
        let log = ChunkLog::new();
        let a = log.push(Duration::from_millis(5), b"a");
        let b = log.push(Duration::from_millis(5), b"b");
        let c = log.push(Duration::from_millis(1), b"c");

        assert!(a < b && b < c);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_log_is_shared_across_threads() {
        let log = ChunkLog::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        log.push(Duration::from_micros(i), b"x");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.len(), 400);
        assert_eq!(log.total_bytes(), 400);
    }

    #[test]
    fn test_into_inner_keeps_log_handles() {
        let mut channel = TimedChannel::wrap(Vec::new());
        let log = channel.write_log();
        channel.write_all(b"hi").unwrap();

        assert_eq!(channel.into_inner(), Some(b"hi".to_vec()));
        assert_eq!(log.len(), 1);
        assert_eq!(log.total_bytes(), 2);

        assert!(TimedChannel::<Vec<u8>>::detached().into_inner().is_none());
    }
}
