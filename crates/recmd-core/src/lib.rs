//! # recmd-core
//!
//! Core types for recmd.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other recmd crates. It provides:
//!
//! - The [`Record`] data model and its merged chunk timeline
//! - On-disk [`Format`]s, conversion between them, and the JSON artifact codec
//! - Configuration types
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - the capture and replay crates depend
//! on this one, but this crate has no dependencies on other recmd crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod format;
pub mod record;

// Re-export commonly used types
pub use config::{LoggingSettings, PacingMode, RecmdConfig, RecordSettings, ReplaySettings};
pub use error::{Error, Result};
pub use format::Format;
pub use record::{Chunks, Record, Stream, TimedChunk};
