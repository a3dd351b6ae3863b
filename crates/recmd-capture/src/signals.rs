//! Termination signals from the hosting environment.

use std::fmt;

use tokio::process::Child;
use tracing::debug;

use recmd_core::Result;

/// A request to stop, received by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationSignal {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl TerminationSignal {
    /// Raw signal number.
    #[cfg(unix)]
    pub fn as_raw(&self) -> libc::c_int {
        match self {
            TerminationSignal::Interrupt => libc::SIGINT,
            TerminationSignal::Terminate => libc::SIGTERM,
        }
    }

    /// Deliver this signal to `child`.
    ///
    /// On non-Unix platforms there is no signal to forward and the child is
    /// killed instead.
    pub fn forward_to(&self, child: &mut Child) -> Result<()> {
        #[cfg(unix)]
        {
            let Some(pid) = child.id() else {
                debug!("Child already reaped, not forwarding {}", self);
                return Ok(());
            };

            let rc = unsafe { libc::kill(pid as libc::pid_t, self.as_raw()) };
            if rc == -1 {
                return Err(std::io::Error::last_os_error().into());
            }
            Ok(())
        }

        #[cfg(not(unix))]
        {
            debug!("Killing child in place of forwarding {}", self);
            child.start_kill()?;
            Ok(())
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Interrupt => f.write_str("SIGINT"),
            TerminationSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Listener for interrupt and terminate requests.
///
/// Creating a listener replaces the default disposition of these signals
/// for the rest of the process. Dropping it does not restore the default,
/// so SIGINT and SIGTERM no longer terminate this process on their own.
#[derive(Debug)]
pub struct TerminationSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl TerminationSignals {
    /// Start listening. Must be called from within a tokio runtime.
    pub fn listen() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next signal. `None` once no more can arrive.
    pub async fn recv(&mut self) -> Option<TerminationSignal> {
        #[cfg(unix)]
        {
            tokio::select! {
                received = self.interrupt.recv() => received.map(|_| TerminationSignal::Interrupt),
                received = self.terminate.recv() => received.map(|_| TerminationSignal::Terminate),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c()
                .await
                .ok()
                .map(|_| TerminationSignal::Interrupt)
        }
    }
}
