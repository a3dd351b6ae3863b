//! JSON artifact (de)serialization.
//!
//! The persisted shape is a single JSON object:
//!
//! ```json
//! {
//!   "format": "base64",
//!   "command": "/bin/echo hello",
//!   "exitcode": 0,
//!   "out": { "1520833": "aGVsbG8K" },
//!   "in": {},
//!   "err": {}
//! }
//! ```
//!
//! Timestamp keys are nanoseconds since the session start. Payloads are
//! base64 for the `base64` format and raw text for the `string` format.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::format::Format;
use crate::record::{Chunks, Record, Stream};
use crate::{Error, Result};

#[derive(Serialize)]
struct ArtifactRef<'a> {
    format: Format,
    command: &'a str,
    exitcode: i32,
    out: BTreeMap<u64, String>,
    #[serde(rename = "in")]
    input: BTreeMap<u64, String>,
    err: BTreeMap<u64, String>,
}

#[derive(Deserialize)]
struct ArtifactOwned {
    command: String,
    exitcode: i32,
    #[serde(default)]
    out: Option<BTreeMap<String, String>>,
    #[serde(default, rename = "in")]
    input: Option<BTreeMap<String, String>>,
    #[serde(default)]
    err: Option<BTreeMap<String, String>>,
}

impl Record {
    /// Serialize to a compact JSON artifact.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.artifact())?)
    }

    /// Serialize to an indented JSON artifact.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.artifact())?)
    }

    /// Write the JSON artifact to a writer.
    pub fn save_to_writer<W: Write>(&self, writer: &mut W) -> Result<()> {
        serde_json::to_writer(&mut *writer, &self.artifact())?;
        writer.flush()?;
        Ok(())
    }

    /// Write the JSON artifact to a file, replacing it if it exists.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.save_to_writer(&mut writer)?;
        debug!("Saved record to {}", path.display());
        Ok(())
    }

    /// Parse a JSON artifact of either format.
    ///
    /// The `format` field decides how payloads are decoded. A missing or
    /// unknown format, bad timestamp keys and undecodable payloads are all
    /// reported with the offending field.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::malformed("$", e.to_string()))?;

        let format = match value.get("format") {
            Some(serde_json::Value::String(name)) => name.parse::<Format>()?,
            Some(other) => {
                return Err(Error::malformed(
                    "format",
                    format!("expected a string, found {other}"),
                ))
            }
            None => return Err(Error::malformed("format", "missing")),
        };

        let artifact: ArtifactOwned =
            serde_json::from_value(value).map_err(|e| Error::malformed("$", e.to_string()))?;

        let out = decode_stream(Stream::Out, format, artifact.out)?;
        let input = decode_stream(Stream::In, format, artifact.input)?;
        let err = decode_stream(Stream::Err, format, artifact.err)?;

        Ok(Record::new(
            artifact.command,
            artifact.exitcode,
            format,
            out,
            input,
            err,
        ))
    }

    /// Load a JSON artifact from a file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    fn artifact(&self) -> ArtifactRef<'_> {
        ArtifactRef {
            format: self.format(),
            command: self.command(),
            exitcode: self.exit_code(),
            out: encode_stream(Stream::Out, self.format(), self.stdout()),
            input: encode_stream(Stream::In, self.format(), self.stdin()),
            err: encode_stream(Stream::Err, self.format(), self.stderr()),
        }
    }
}

fn encode_stream(stream: Stream, format: Format, chunks: &Chunks) -> BTreeMap<u64, String> {
    chunks
        .iter()
        .map(|(at, data)| {
            let key = u64::try_from(at.as_nanos()).unwrap_or(u64::MAX);
            let payload = match format {
                Format::Base64 => STANDARD.encode(data),
                Format::String => match std::str::from_utf8(data) {
                    Ok(text) => text.to_string(),
                    Err(_) => {
                        warn!(
                            "Chunk {}.{} is not valid UTF-8, saving it lossily",
                            stream, key
                        );
                        String::from_utf8_lossy(data).into_owned()
                    }
                },
            };
            (key, payload)
        })
        .collect()
}

fn decode_stream(
    stream: Stream,
    format: Format,
    entries: Option<BTreeMap<String, String>>,
) -> Result<Chunks> {
    let mut chunks = Chunks::new();

    for (key, payload) in entries.unwrap_or_default() {
        let field = format!("{stream}.{key}");
        let nanos: u64 = key
            .trim()
            .parse()
            .map_err(|_| Error::malformed(&field, "timestamp is not a nanosecond count"))?;

        let data = match format {
            Format::Base64 => STANDARD
                .decode(payload.as_bytes())
                .map_err(|e| Error::malformed(&field, format!("invalid base64: {e}")))?,
            Format::String => payload.into_bytes(),
        };

        if chunks.insert(Duration::from_nanos(nanos), data).is_some() {
            return Err(Error::malformed(&field, "duplicate timestamp"));
        }
    }

    Ok(chunks)
}
