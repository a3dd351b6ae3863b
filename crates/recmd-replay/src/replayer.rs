//! Structured replay: one event per recorded chunk.
//!
//! A background task walks the record's timeline and hands events over a
//! channel with capacity one, so it never runs more than one event ahead of
//! the consumer. How long it waits before each event depends on the
//! [`PacingMode`]:
//!
//! - `RealTime` sleeps the gap to the previous event before each send.
//! - `Quick` does not sleep at all.
//! - `Background` sleeps until `start + delay_since_start`, so time spent
//!   blocked on a slow consumer is not added on top of the recorded gaps.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

use recmd_core::{PacingMode, Record, Stream};

/// One replayed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayEvent {
    /// Chunk payload.
    pub data: Vec<u8>,
    /// Stream the chunk was captured on.
    pub stream: Stream,
    /// Gap to the previous event; for the first event, the gap to the start
    /// of the session.
    pub delay: Duration,
    /// Offset from the start of the session.
    pub delay_since_start: Duration,
}

/// Build the ordered event list for `record`.
pub fn events(record: &Record) -> Vec<ReplayEvent> {
    let mut previous = Duration::ZERO;
    record
        .timeline()
        .into_iter()
        .map(|chunk| {
            let delay = chunk.at.saturating_sub(previous);
            previous = chunk.at;
            ReplayEvent {
                data: chunk.data.to_vec(),
                stream: chunk.stream,
                delay,
                delay_since_start: chunk.at,
            }
        })
        .collect()
}

/// Emits a record's chunks as [`ReplayEvent`]s with the chosen pacing.
///
/// Dropping the replayer cancels it.
///
/// # Example
///
/// ```no_run
/// use recmd_core::Record;
/// use recmd_replay::Replayer;
///
/// # async fn example(record: Record) {
/// let mut replayer = Replayer::new(&record);
/// while let Some(event) = replayer.recv().await {
///     println!("{} {:?}", event.stream, event.data);
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct Replayer {
    events: mpsc::Receiver<ReplayEvent>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
    pacing: PacingMode,
    total: usize,
}

impl Replayer {
    /// Real-time replay. Must be called from within a tokio runtime.
    pub fn new(record: &Record) -> Self {
        Self::with_pacing(record, PacingMode::RealTime)
    }

    /// Replay without any delays.
    pub fn quick(record: &Record) -> Self {
        Self::with_pacing(record, PacingMode::Quick)
    }

    /// Drift-corrected replay anchored at the moment of this call.
    pub fn background(record: &Record) -> Self {
        Self::with_pacing(record, PacingMode::Background)
    }

    /// Replay with an explicit pacing mode.
    pub fn with_pacing(record: &Record, pacing: PacingMode) -> Self {
        let events = events(record);
        let total = events.len();
        let (tx, rx) = mpsc::channel(1);
        let (cancel, cancelled) = watch::channel(false);

        debug!(
            "Starting {:?} replay of '{}' with {} events",
            pacing,
            record.command(),
            total
        );

        let task = tokio::spawn(produce(events, pacing, tx, cancelled));

        Self {
            events: rx,
            cancel,
            task,
            pacing,
            total,
        }
    }

    /// Next event, or `None` after the last one or after cancellation.
    pub async fn recv(&mut self) -> Option<ReplayEvent> {
        self.events.recv().await
    }

    /// Stop producing events. Events already handed over stay receivable.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Whether the producer has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Pacing mode in use.
    pub fn pacing(&self) -> PacingMode {
        self.pacing
    }

    /// Number of events the record holds.
    pub fn total_events(&self) -> usize {
        self.total
    }
}

impl Drop for Replayer {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn pace(pacing: PacingMode, delay: Duration, deadline: Instant) {
    match pacing {
        PacingMode::RealTime => time::sleep(delay).await,
        PacingMode::Quick => {}
        PacingMode::Background => time::sleep_until(deadline).await,
    }
}

async fn produce(
    events: Vec<ReplayEvent>,
    pacing: PacingMode,
    tx: mpsc::Sender<ReplayEvent>,
    mut cancelled: watch::Receiver<bool>,
) {
    let started = Instant::now();
    let total = events.len();

    for (index, event) in events.into_iter().enumerate() {
        let deadline = started + event.delay_since_start;

        tokio::select! {
            _ = pace(pacing, event.delay, deadline) => {}
            _ = cancelled.changed() => {
                debug!("Replay cancelled after {} of {} events", index, total);
                return;
            }
        }

        trace!(
            "Emitting {} event {} ({} bytes)",
            event.stream,
            index,
            event.data.len()
        );

        tokio::select! {
            sent = tx.send(event) => {
                if sent.is_err() {
                    debug!("Replay consumer gone after {} of {} events", index, total);
                    return;
                }
            }
            _ = cancelled.changed() => {
                debug!("Replay cancelled after {} of {} events", index, total);
                return;
            }
        }
    }

    debug!("Replay finished: {} events in {:?}", total, started.elapsed());
}
