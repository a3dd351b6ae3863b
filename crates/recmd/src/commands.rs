//! Subcommand implementations.
//!
//! Each command returns the exit code the process should terminate with.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use recmd_capture::Recorder;
use recmd_core::{Format, PacingMode, RecmdConfig, Record, Stream};
use recmd_replay::{RecordReader, Replayer};

use crate::cli::{Command, ConvertArgs, RecordArgs, ReplayArgs};
use crate::template::{converted_path, format_time, output_path};

/// Dispatch a parsed subcommand.
pub async fn run(command: Command, config: &RecmdConfig) -> Result<i32> {
    match command {
        Command::Record(args) => record(args, config).await,
        Command::Replay(args) => replay(args, config).await,
        Command::Convert(args) => convert(args),
    }
}

/// `recmd record`: run the command, capture it and save the artifact.
pub async fn record(args: RecordArgs, config: &RecmdConfig) -> Result<i32> {
    let started = Local::now();
    let format = args.format.unwrap_or(config.record.format);
    let template = args.output.as_deref().unwrap_or(&config.record.output);
    let time_format = args
        .time_format
        .as_deref()
        .unwrap_or(&config.record.time_format);
    let time = format_time(&started, time_format)?;

    let (program, program_args) = args
        .command
        .split_first()
        .ok_or(recmd_core::Error::EmptyCommand)?;

    let mut recorder = Recorder::new(program.as_str(), program_args.iter().cloned());
    if let Some(path) = &args.input {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("opening input file {}", path.display()))?;
        recorder = recorder.input(file);
    } else if args.stdin {
        recorder = recorder.input(tokio::io::stdin());
    }

    eprintln!("Recording: '{}'", args.command.join(" "));

    let mut record = recorder.record().await?;
    if format != record.format() {
        record = record.convert_to(format)?;
    }

    let path = output_path(&record, template, &time);
    record
        .save_to_file(&path)
        .with_context(|| format!("writing recording to {}", path.display()))?;

    info!(
        "Wrote recording of '{}' ({} chunks, exit code {}) to {}",
        record.command(),
        record.chunk_count(),
        record.exit_code(),
        path.display()
    );

    Ok(0)
}

/// `recmd replay`: reproduce a recording on this process's stdout/stderr.
pub async fn replay(args: ReplayArgs, config: &RecmdConfig) -> Result<i32> {
    let record = load(&args.file)?;
    let ignore_delays = args.no_delays || config.replay.ignore_delays;
    info!("Replaying: '{}'", record.command());

    if args.structured {
        let pacing = if ignore_delays {
            PacingMode::Quick
        } else {
            args.pacing.unwrap_or(config.replay.pacing)
        };
        replay_structured(
            &record,
            pacing,
            &mut tokio::io::stdout(),
            &mut tokio::io::stderr(),
        )
        .await?;
    } else {
        let buffer_size = config.replay.buffer_size;
        let flat = record.clone();
        tokio::task::spawn_blocking(move || {
            replay_flat(&flat, ignore_delays, buffer_size, &mut std::io::stdout().lock())
        })
        .await
        .context("flat replay task failed")??;
    }

    Ok(args.exit_code.unwrap_or(record.exit_code()))
}

/// Write every chunk of `record`, merged in time order, to `out`.
pub fn replay_flat<W: Write>(
    record: &Record,
    ignore_delays: bool,
    buffer_size: usize,
    out: &mut W,
) -> Result<()> {
    let mut reader = RecordReader::new(record);
    if ignore_delays {
        reader.ignore_time();
    }

    let mut buffer = vec![0u8; buffer_size.max(1)];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n])?;
        out.flush()?;
    }

    debug!("Flat replay of '{}' finished", record.command());
    Ok(())
}

/// Replay `record` event by event, routing `out`/`in` chunks to `stdout`
/// and `err` chunks to `stderr`.
pub async fn replay_structured<O, E>(
    record: &Record,
    pacing: PacingMode,
    stdout: &mut O,
    stderr: &mut E,
) -> Result<()>
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut replayer = Replayer::with_pacing(record, pacing);

    while let Some(event) = replayer.recv().await {
        match event.stream {
            Stream::Out | Stream::In => {
                stdout.write_all(&event.data).await?;
                stdout.flush().await?;
            }
            Stream::Err => {
                stderr.write_all(&event.data).await?;
                stderr.flush().await?;
            }
        }
    }

    Ok(())
}

/// `recmd convert`: rewrite a recording in another format.
pub fn convert(args: ConvertArgs) -> Result<i32> {
    let record = load(&args.file)?;
    let converted = record.convert_to(args.to)?;

    let output = args.output.unwrap_or_else(|| {
        let tag = match args.to {
            Format::String => "plain",
            Format::Base64 => "base64",
        };
        converted_path(&args.file, tag)
    });

    converted
        .save_to_file(&output)
        .with_context(|| format!("writing converted recording to {}", output.display()))?;

    info!(
        "Converted {} ({}) to {} ({})",
        args.file.display(),
        record.format(),
        output.display(),
        converted.format()
    );

    Ok(0)
}

fn load(path: &Path) -> Result<Record> {
    Record::load_from_file(path).with_context(|| format!("loading recording {}", path.display()))
}
