//! On-disk formats and conversion between them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::record::{Record, Stream};
use crate::{Error, Result};

/// How chunk payloads are encoded in the persisted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Every chunk is an opaque byte sequence, stored as base64
    #[default]
    Base64,
    /// Every chunk is stored as plain text
    String,
}

impl Format {
    /// Name used in the `format` field of the artifact.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Base64 => "base64",
            Format::String => "string",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "base64" | "byte" | "bytes" => Ok(Format::Base64),
            "string" | "text" | "plain" => Ok(Format::String),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl Record {
    /// Convert this record to another on-disk format.
    ///
    /// Returns an independent copy; `self` is never touched. Converting to
    /// [`Format::String`] replaces invalid UTF-8 in every chunk with U+FFFD, so
    /// binary output does not survive a string round trip. Check
    /// [`Record::is_text`] first when exactness matters.
    pub fn convert_to(&self, target: Format) -> Result<Record> {
        match target {
            Format::Base64 => Ok(self.with_format(Format::Base64)),
            Format::String => {
                let lossy = self.lossy_chunk_count();
                if lossy > 0 {
                    warn!(
                        "Converting '{}' to string format: {} chunk(s) are not valid UTF-8 and will be altered",
                        self.command(),
                        lossy
                    );
                }
                debug!(
                    "Converting record to string format: {} chunks",
                    self.chunk_count()
                );
                Ok(self.map_chunks(Format::String, |data| {
                    String::from_utf8_lossy(data).into_owned().into_bytes()
                }))
            }
        }
    }

    /// Convert to a format given by name, failing with
    /// [`Error::UnsupportedFormat`] for unknown names.
    pub fn convert_to_named(&self, target: &str) -> Result<Record> {
        self.convert_to(target.parse()?)
    }

    /// Whether every chunk is valid UTF-8, i.e. the record survives a
    /// conversion to string format unchanged.
    pub fn is_text(&self) -> bool {
        self.lossy_chunk_count() == 0
    }

    fn lossy_chunk_count(&self) -> usize {
        Stream::ALL
            .iter()
            .flat_map(|s| self.chunks(*s).values())
            .filter(|data| std::str::from_utf8(data).is_err())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::record::Chunks;

    fn record_with_out(data: &[u8]) -> Record {
        let mut out = Chunks::new();
        out.insert(Duration::from_millis(1), data.to_vec());
        Record::new(
            "cmd",
            0,
            Format::Base64,
            out,
            Chunks::new(),
            Chunks::new(),
        )
    }

    #[test]
    fn test_format_names() {
        assert_eq!(Format::Base64.to_string(), "base64");
        assert_eq!(Format::String.to_string(), "string");
        assert_eq!(Format::default(), Format::Base64);
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("base64".parse::<Format>().unwrap(), Format::Base64);
        assert_eq!("Bytes".parse::<Format>().unwrap(), Format::Base64);
        assert_eq!("string".parse::<Format>().unwrap(), Format::String);
        assert_eq!(" plain ".parse::<Format>().unwrap(), Format::String);
    }

    #[test]
    fn test_parse_unknown_format() {
        let err = "xml".parse::<Format>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(ref f) if f == "xml"));
    }

    #[test]
    fn test_convert_does_not_mutate_source() {
        let record = record_with_out(b"hello");
        let converted = record.convert_to(Format::String).unwrap();

        assert_eq!(record.format(), Format::Base64);
        assert_eq!(converted.format(), Format::String);
        assert_eq!(converted.stdout(), record.stdout());
    }

    #[test]
    fn test_text_roundtrip_is_exact() {
        let record = record_with_out("héllo\r\n".as_bytes());
        assert!(record.is_text());

        let back = record
            .convert_to(Format::String)
            .unwrap()
            .convert_to(Format::Base64)
            .unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_binary_through_string_is_lossy() {
        let record = record_with_out(&[0xFF, 0x00, 0xAA]);
        assert!(!record.is_text());

        let back = record
            .convert_to(Format::String)
            .unwrap()
            .convert_to(Format::Base64)
            .unwrap();
        assert_ne!(back.stdout(), record.stdout());
    }

    #[test]
    fn test_binary_base64_roundtrip_is_exact() {
        let record = record_with_out(&[0xFF, 0x00, 0xAA]);
        let back = record.convert_to(Format::Base64).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_convert_to_named_unknown() {
        let record = record_with_out(b"x");
        assert!(matches!(
            record.convert_to_named("yaml"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert_eq!(
            record.convert_to_named("string").unwrap().format(),
            Format::String
        );
    }
}
