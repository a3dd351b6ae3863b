//! # recmd
//!
//! Records every chunk a command reads from stdin and writes to stdout and
//! stderr, with timestamps, and replays such recordings later.
//!
//! ## Architecture
//!
//! This is Layer 2 - the binary that ties together:
//! - recmd-core: Record model, formats, artifacts, configuration
//! - recmd-capture: Timed channels and recording sessions
//! - recmd-replay: Flat and structured replay

use std::process;

use anyhow::Context;
use clap::Parser;
use recmd::Cli;
use recmd_core::RecmdConfig;

fn load_config(cli: &Cli) -> anyhow::Result<RecmdConfig> {
    match &cli.config {
        Some(path) => RecmdConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display())),
        None => Ok(RecmdConfig::default()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    // Initialize logging; stdout stays reserved for the recorded command
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("recmd v{} starting", env!("CARGO_PKG_VERSION"));

    let code = match recmd::commands::run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    // A pending read on stdin would otherwise keep the runtime from shutting down
    process::exit(code);
}
