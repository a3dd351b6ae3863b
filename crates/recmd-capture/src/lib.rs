//! # recmd-capture
//!
//! Capture side of recmd.
//!
//! This crate provides:
//! - [`TimedChannel`], an I/O pass-through that timestamps every chunk
//! - [`ChunkLog`], the synchronized chunk buffer behind each channel
//! - [`Recorder`], a recording session around one child process
//! - Termination signal listening and forwarding
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on recmd-core and
//! produces [`recmd_core::Record`] values.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod recorder;
pub mod signals;
pub mod timed;

// Re-export commonly used types
pub use recorder::Recorder;
pub use signals::{TerminationSignal, TerminationSignals};
pub use timed::{ChunkLog, TimedChannel};
