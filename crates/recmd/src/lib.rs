//! recmd command-line library
//!
//! Argument parsing, subcommands and output path templating for the `recmd`
//! binary. The binary itself only sets up logging and the runtime in main.rs.

pub mod cli;
pub mod commands;
pub mod template;

// Re-export commonly used types
pub use cli::{Cli, Command, ConvertArgs, RecordArgs, ReplayArgs};
pub use template::{output_path, TemplateContext, TemplateError};
