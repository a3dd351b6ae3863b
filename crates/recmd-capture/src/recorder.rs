//! Recording sessions.
//!
//! A [`Recorder`] runs one child process with a [`TimedChannel`] on each of
//! its standard streams, forwards termination signals to it, and seals the
//! captured chunks into a [`Record`] once the child has really exited.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use recmd_core::{Error, Format, Record, Result};

use crate::signals::TerminationSignals;
use crate::timed::TimedChannel;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Builder and driver for one recording session.
///
/// # Example
///
/// ```no_run
/// use recmd_capture::Recorder;
///
/// # async fn example() -> recmd_core::Result<()> {
/// let record = Recorder::new("echo", ["hello"]).record().await?;
/// assert_eq!(record.exit_code(), 0);
/// # Ok(())
/// # }
/// ```
pub struct Recorder {
    program: String,
    args: Vec<String>,
    input: Option<BoxedReader>,
    stdout: BoxedWriter,
    stderr: BoxedWriter,
    start: Option<Instant>,
    format: Format,
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("has_input", &self.input.is_some())
            .field("start", &self.start)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Recorder {
    /// Prepare a session for `program` with `args`.
    ///
    /// The child's output is forwarded to this process's stdout and stderr;
    /// it gets no stdin unless [`Recorder::input`] is called.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            input: None,
            stdout: Box::new(tokio::io::stdout()),
            stderr: Box::new(tokio::io::stderr()),
            start: None,
            format: Format::default(),
        }
    }

    /// Feed the child's stdin from `input`, capturing what it reads.
    pub fn input<R>(mut self, input: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.input = Some(Box::new(input));
        self
    }

    /// Forward the child's stdout to `writer` instead of this process's stdout.
    pub fn stdout<W>(mut self, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.stdout = Box::new(writer);
        self
    }

    /// Forward the child's stderr to `writer` instead of this process's stderr.
    pub fn stderr<W>(mut self, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.stderr = Box::new(writer);
        self
    }

    /// Use `start` as time zero for all three streams.
    pub fn start_at(mut self, start: Instant) -> Self {
        self.start = Some(start);
        self
    }

    /// Format the resulting record declares.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Resolve the program through `PATH` and build the command line that
    /// will actually be invoked.
    pub fn command_line(&self) -> Result<String> {
        let resolved = self.resolve_program()?;
        Ok(join_command_line(&resolved, &self.args))
    }

    fn resolve_program(&self) -> Result<PathBuf> {
        if self.program.trim().is_empty() {
            return Err(Error::EmptyCommand);
        }

        which::which(&self.program).map_err(|e| Error::ProcessStartFailure {
            command: self.program.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        })
    }

    /// Run the child to completion and return what it did.
    ///
    /// Interrupt and terminate signals received meanwhile are forwarded to
    /// the child; the session keeps waiting until the child really exits. A
    /// non-zero exit is not an error, it is the record's exit code.
    pub async fn record(self) -> Result<Record> {
        let program = self.resolve_program()?;
        let command_line = join_command_line(&program, &self.args);

        let Recorder {
            program: requested,
            args,
            input,
            stdout,
            stderr,
            start,
            format,
        } = self;

        let start = start.unwrap_or_else(Instant::now);

        let out = TimedChannel::wrap(stdout).start_at(start);
        let err = TimedChannel::wrap(stderr).start_at(start);
        let input = input.map(|reader| TimedChannel::wrap(reader).start_at(start));

        let out_log = out.write_log();
        let err_log = err.write_log();
        let in_log = input
            .as_ref()
            .map(TimedChannel::read_log)
            .unwrap_or_default();

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let mut signals = TerminationSignals::listen()?;

        info!("Recording: command='{}'", command_line);
        let mut child = command.spawn().map_err(|source| {
            error!("Failed to spawn '{}': {}", requested, source);
            Error::ProcessStartFailure {
                command: requested.clone(),
                source,
            }
        })?;
        debug!("Child spawned: pid={:?}", child.id());

        let child_out = child
            .stdout
            .take()
            .ok_or_else(|| Error::Other("child stdout was not piped".to_string()))?;
        let child_err = child
            .stderr
            .take()
            .ok_or_else(|| Error::Other("child stderr was not piped".to_string()))?;

        let mut out_task = tokio::spawn(pump(child_out, out));
        let mut err_task = tokio::spawn(pump(child_err, err));
        let mut in_task = match (input, child.stdin.take()) {
            (Some(source), Some(stdin)) => Some(tokio::spawn(feed(source, stdin))),
            _ => None,
        };

        let mut out_open = true;
        let mut err_open = true;
        let mut in_open = in_task.is_some();

        let status = loop {
            tokio::select! {
                status = child.wait() => break status?,
                Some(signal) = signals.recv() => {
                    info!("Received {}, forwarding to child", signal);
                    if let Err(e) = signal.forward_to(&mut child) {
                        warn!("Failed to forward {}: {}", signal, e);
                    }
                }
                joined = &mut out_task, if out_open => {
                    out_open = false;
                    if let Err(e) = capture_outcome(joined) {
                        return Err(abort_session(&mut child, e).await);
                    }
                }
                joined = &mut err_task, if err_open => {
                    err_open = false;
                    if let Err(e) = capture_outcome(joined) {
                        return Err(abort_session(&mut child, e).await);
                    }
                }
                joined = async {
                    match in_task.as_mut() {
                        Some(task) => task.await,
                        None => std::future::pending().await,
                    }
                }, if in_open => {
                    in_open = false;
                    if let Err(e) = input_outcome(joined) {
                        return Err(abort_session(&mut child, e).await);
                    }
                }
            }
        };
        drop(signals);

        let exit_code = status_code(&status);
        info!("Child exited: command='{}', exit_code={}", command_line, exit_code);

        if let Some(task) = in_task.filter(|_| in_open) {
            finish_input(task).await?;
        }
        if out_open {
            capture_outcome(out_task.await)?;
        }
        if err_open {
            capture_outcome(err_task.await)?;
        }

        let record = Record::new(
            command_line,
            exit_code,
            format,
            out_log.snapshot(),
            in_log.snapshot(),
            err_log.snapshot(),
        );
        debug!(
            "Record sealed: out={} in={} err={} chunks",
            record.stdout().len(),
            record.stdin().len(),
            record.stderr().len()
        );

        Ok(record)
    }
}

fn join_command_line(program: &Path, args: &[String]) -> String {
    std::iter::once(program.display().to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Copy child output through its timed channel until EOF.
async fn pump<R>(mut source: R, mut channel: TimedChannel<BoxedWriter>) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let copied = tokio::io::copy(&mut source, &mut channel).await?;
    channel.flush().await?;
    Ok(copied)
}

/// Copy input through its timed channel into the child's stdin.
async fn feed(
    mut channel: TimedChannel<BoxedReader>,
    mut stdin: ChildStdin,
) -> std::io::Result<u64> {
    let copied = tokio::io::copy(&mut channel, &mut stdin).await?;
    stdin.shutdown().await?;
    Ok(copied)
}

/// Stop feeding input once the child is gone.
async fn finish_input(task: JoinHandle<std::io::Result<u64>>) -> Result<()> {
    if !task.is_finished() {
        task.abort();
    }
    input_outcome(task.await)
}

/// Outcome of the input feeder.
///
/// Whatever was read so far stays in the log. Writing into a child that
/// already exited fails with a broken pipe, which is expected here.
fn input_outcome(joined: std::result::Result<std::io::Result<u64>, JoinError>) -> Result<()> {
    match joined {
        Ok(Ok(copied)) => {
            debug!("Input fully fed: {} bytes", copied);
            Ok(())
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            debug!("Child closed stdin early");
            Ok(())
        }
        Ok(Err(e)) => Err(Error::from_io(e)),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(Error::Other(format!("input task failed: {e}"))),
    }
}

fn capture_outcome(joined: std::result::Result<std::io::Result<u64>, JoinError>) -> Result<()> {
    match joined {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(Error::from_io(e)),
        Err(e) => Err(Error::Other(format!("capture task failed: {e}"))),
    }
}

/// Kill the child after a capture failure and wait for it to exit.
async fn abort_session(child: &mut Child, reason: Error) -> Error {
    error!("Capture failed, stopping child: {}", reason);
    if let Err(e) = child.start_kill() {
        debug!("Child already gone: {}", e);
    }
    match child.wait().await {
        Ok(status) => debug!("Child stopped: exit_code={}", status_code(&status)),
        Err(e) => warn!("Failed to reap child: {}", e),
    }
    reason
}

fn status_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}
