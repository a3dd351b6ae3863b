//! Output path templating for new recordings.
//!
//! Templates use `{{.Name}}` placeholders:
//!
//! | Placeholder            | Value                                        |
//! |------------------------|----------------------------------------------|
//! | `{{.Time}}`            | recording start, formatted with `time_format` |
//! | `{{.CmdBaseName}}`     | file name of the recorded program            |
//! | `{{.Record.Format}}`   | `base64` or `string`                         |
//! | `{{.Record.Command}}`  | full recorded command line                   |
//! | `{{.Record.ExitCode}}` | child exit code                              |

use std::fmt::Write;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use thiserror::Error;
use tracing::warn;

use recmd_core::Record;

/// Path used when a template cannot be rendered.
pub const FALLBACK_OUTPUT: &str = "recmd-output.json";

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*\.([A-Za-z][A-Za-z.]*)\s*\}\}").expect("placeholder regex");
}

/// Template rendering errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// `{{.Name}}` with a name that is not provided
    #[error("unknown placeholder '{0}'")]
    UnknownPlaceholder(String),

    /// `{{` without a well-formed placeholder
    #[error("unterminated or malformed placeholder in '{0}'")]
    Malformed(String),

    /// Time format with an invalid specifier
    #[error("invalid time format '{0}'")]
    TimeFormat(String),
}

/// Values available to an output path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    /// Formatted recording time
    pub time: String,
    /// File name of the recorded program
    pub cmd_base_name: String,
    /// Artifact format name
    pub format: String,
    /// Full command line
    pub command: String,
    /// Child exit code
    pub exit_code: i32,
}

impl TemplateContext {
    /// Build the context for `record`, started at the already formatted `time`.
    pub fn new(record: &Record, time: impl Into<String>) -> Self {
        let program = record.command().split(' ').next().unwrap_or_default();
        let cmd_base_name = Path::new(program)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.to_string());

        Self {
            time: time.into(),
            cmd_base_name,
            format: record.format().to_string(),
            command: record.command().to_string(),
            exit_code: record.exit_code(),
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "Time" => Some(self.time.clone()),
            "CmdBaseName" => Some(self.cmd_base_name.clone()),
            "Record.Format" => Some(self.format.clone()),
            "Record.Command" => Some(self.command.clone()),
            "Record.ExitCode" => Some(self.exit_code.to_string()),
            _ => None,
        }
    }
}

/// Substitute every placeholder in `template`.
pub fn render(template: &str, context: &TemplateContext) -> Result<String, TemplateError> {
    let mut unknown = None;
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        context.lookup(name).unwrap_or_else(|| {
            unknown.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });

    if let Some(name) = unknown {
        return Err(TemplateError::UnknownPlaceholder(name));
    }
    if rendered.contains("{{") {
        return Err(TemplateError::Malformed(template.to_string()));
    }
    Ok(rendered.into_owned())
}

/// Format `time` with a strftime string, rejecting invalid specifiers.
pub fn format_time<Tz>(time: &DateTime<Tz>, format: &str) -> Result<String, TemplateError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(TemplateError::TimeFormat(format.to_string()));
    }

    let mut out = String::new();
    write!(out, "{}", time.format(format))
        .map_err(|_| TemplateError::TimeFormat(format.to_string()))?;
    Ok(out)
}

/// Resolve the output path for `record`, falling back to
/// [`FALLBACK_OUTPUT`] when the template cannot be rendered.
pub fn output_path(record: &Record, template: &str, time: &str) -> PathBuf {
    match render(template, &TemplateContext::new(record, time)) {
        Ok(path) => PathBuf::from(path),
        Err(e) => {
            warn!("Output path template '{}': {}", template, e);
            PathBuf::from(FALLBACK_OUTPUT)
        }
    }
}

/// Default destination for `recmd convert`: `<stem>.<tag><ext>` next to
/// `input`, where the tag is `plain` for string output.
pub fn converted_path(input: &Path, tag: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}.{}.{}", stem, tag, ext.to_string_lossy()),
        None => format!("{}.{}", stem, tag),
    };
    input.with_file_name(name)
}
