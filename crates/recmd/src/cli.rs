//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use recmd_core::{Format, PacingMode};

/// Record a command's standard streams with timing and replay them later.
#[derive(Parser, Debug)]
#[command(name = "recmd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Record a command's stdin/stdout/stderr with timing and replay it later")]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log level, overrides the configuration (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record the following command
    #[command(visible_alias = "rec")]
    Record(RecordArgs),

    /// Replay a recorded command
    #[command(visible_alias = "rep")]
    Replay(ReplayArgs),

    /// Convert a recording to another format
    #[command(visible_aliases = ["conv", "convert-to-string", "cs"])]
    Convert(ConvertArgs),
}

/// Arguments of `recmd record`.
#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Feed the command's stdin from this file
    #[arg(long, short = 'i', visible_alias = "in")]
    pub input: Option<PathBuf>,

    /// Feed the command's stdin from this process's stdin
    #[arg(long, visible_alias = "interactive", conflicts_with = "input")]
    pub stdin: bool,

    /// Output path template, e.g. `{{.CmdBaseName}}-{{.Time}}.json`
    #[arg(long, short = 'o', visible_alias = "out")]
    pub output: Option<String>,

    /// Artifact format (base64 or string)
    #[arg(long, short = 'f')]
    pub format: Option<Format>,

    /// strftime format for the `{{.Time}}` placeholder
    #[arg(long)]
    pub time_format: Option<String>,

    /// Command and its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Arguments of `recmd replay`.
#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Recording to replay
    pub file: PathBuf,

    /// Ignore delays while replaying
    #[arg(long)]
    pub no_delays: bool,

    /// Replay per stream: out/in to stdout, err to stderr
    #[arg(long, short = 's')]
    pub structured: bool,

    /// Pacing for structured replay (real-time, quick, background)
    #[arg(long, short = 'p')]
    pub pacing: Option<PacingMode>,

    /// Exit with this code instead of the recorded one
    #[arg(long)]
    pub exit_code: Option<i32>,
}

/// Arguments of `recmd convert`.
#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Recording to convert
    pub file: PathBuf,

    /// Destination, defaults to `<stem>.plain<ext>` or `<stem>.base64<ext>`
    pub output: Option<PathBuf>,

    /// Target format
    #[arg(long, short = 't', default_value = "string")]
    pub to: Format,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_record_trailing_command() {
        let cli = Cli::parse_from(["recmd", "record", "-o", "out.json", "--", "ls", "-la"]);
        match cli.command {
            Command::Record(args) => {
                assert_eq!(args.command, vec!["ls", "-la"]);
                assert_eq!(args.output.as_deref(), Some("out.json"));
                assert!(args.input.is_none());
                assert!(!args.stdin);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_record_without_separator() {
        let cli = Cli::parse_from(["recmd", "rec", "echo", "-n", "hi"]);
        match cli.command {
            Command::Record(args) => assert_eq!(args.command, vec!["echo", "-n", "hi"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_record_requires_command() {
        assert!(Cli::try_parse_from(["recmd", "record"]).is_err());
    }

    #[test]
    fn test_input_conflicts_with_stdin() {
        assert!(Cli::try_parse_from(["recmd", "record", "-i", "f", "--stdin", "cat"]).is_err());
    }

    #[test]
    fn test_replay_flags() {
        let cli = Cli::parse_from([
            "recmd",
            "replay",
            "rec.json",
            "--structured",
            "--pacing",
            "background",
            "--exit-code",
            "4",
        ]);
        match cli.command {
            Command::Replay(args) => {
                assert!(args.structured);
                assert_eq!(args.pacing, Some(PacingMode::Background));
                assert_eq!(args.exit_code, Some(4));
                assert!(!args.no_delays);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_convert_defaults_to_string() {
        let cli = Cli::parse_from(["recmd", "cs", "rec.json"]);
        match cli.command {
            Command::Convert(args) => {
                assert_eq!(args.to, Format::String);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["recmd", "convert", "a.json", "--to", "hex"]).is_err());
    }
}
