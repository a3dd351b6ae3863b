//! Error types for recmd.

use thiserror::Error;

/// Main error type for recording, conversion and replay operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No command was given to record
    #[error("Empty command")]
    EmptyCommand,

    /// The child process could not be launched
    #[error("Failed to start '{command}': {source}")]
    ProcessStartFailure {
        /// Command as requested by the caller
        command: String,
        /// Underlying launch error
        #[source]
        source: std::io::Error,
    },

    /// Format outside of {base64, string}
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Read attempted on a timed channel without an upstream reader
    #[error("No input source configured")]
    NoSource,

    /// Persisted artifact does not match the shape of its declared format
    #[error("Malformed artifact at '{field}': {reason}")]
    MalformedArtifact {
        /// Offending field path (e.g. `out.1500000`)
        field: String,
        /// What was wrong with it
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::MalformedArtifact`].
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedArtifact {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Wrap this error into an [`std::io::Error`] so it can travel through
    /// `Read`/`Write` implementations. Recover it with [`Error::from_io`].
    pub fn into_io(self) -> std::io::Error {
        match self {
            Self::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }

    /// Recover an [`Error`] previously wrapped by [`Error::into_io`].
    pub fn from_io(err: std::io::Error) -> Self {
        let is_ours = err
            .get_ref()
            .map(|inner| inner.is::<Error>())
            .unwrap_or(false);

        if is_ours {
            if let Some(inner) = err.into_inner() {
                if let Ok(ours) = inner.downcast::<Error>() {
                    return *ours;
                }
            }
            return Self::Other("unrecoverable wrapped error".to_string());
        }

        Self::Io(err)
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_error() {
        assert_eq!(Error::EmptyCommand.to_string(), "Empty command");
    }

    #[test]
    fn test_process_start_failure_error() {
        let err = Error::ProcessStartFailure {
            command: "nope".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "Failed to start 'nope': not found");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_unsupported_format_error() {
        let err = Error::UnsupportedFormat("xml".to_string());
        assert_eq!(err.to_string(), "Unsupported format: xml");
    }

    #[test]
    fn test_no_source_error() {
        assert_eq!(Error::NoSource.to_string(), "No input source configured");
    }

    #[test]
    fn test_malformed_artifact_error() {
        let err = Error::malformed("out.15", "invalid base64");
        assert_eq!(err.to_string(), "Malformed artifact at 'out.15': invalid base64");
    }

    #[test]
    fn test_config_error() {
        let err = Error::Config("replay.buffer_size must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: replay.buffer_size must be > 0"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_io_wrapping_roundtrip() {
        let io = Error::NoSource.into_io();
        assert_eq!(io.kind(), std::io::ErrorKind::Other);
        assert!(matches!(Error::from_io(io), Error::NoSource));
    }

    #[test]
    fn test_plain_io_error_is_not_unwrapped() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err = Error::from_io(io);
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn test_error_debug() {
        let err = Error::Other("test".to_string());
        let debug_str = format!("{err:?}");
        assert!(debug_str.contains("Other"));
    }
}
