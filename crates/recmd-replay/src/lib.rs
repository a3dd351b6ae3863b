//! # recmd-replay
//!
//! Replay of recorded sessions.
//!
//! This crate provides:
//! - [`RecordReader`]: flat replay of all streams as one `std::io::Read`
//!   source, with the recorded gaps reproduced as sleeps
//! - [`Replayer`]: structured replay that emits one [`ReplayEvent`] per
//!   chunk in real-time, quick or drift-corrected pacing
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends only on recmd-core and
//! never touches a live process.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod reader;
pub mod replayer;

// Re-export commonly used types
pub use reader::RecordReader;
pub use replayer::{events, ReplayEvent, Replayer};
pub use recmd_core::PacingMode;
