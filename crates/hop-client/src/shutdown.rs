//! Process exit on signals.
//!
//! SIGINT, SIGTERM and SIGHUP end the process. A running session is asked
//! to tear down first, and the terminal is restored on the way out.

use std::io;

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{info, warn};

use hop_core::constants::SHUTDOWN_GRACE;
use hop_core::session::CancelSignal;

use crate::terminal::restore_terminal;

/// A signal that ends the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSignal {
    Interrupt,
    Terminate,
    Hangup,
}

impl ExitSignal {
    /// Conventional shell status: 128 + signal number.
    pub fn exit_code(self) -> i32 {
        128 + match self {
            ExitSignal::Interrupt => libc::SIGINT,
            ExitSignal::Terminate => libc::SIGTERM,
            ExitSignal::Hangup => libc::SIGHUP,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExitSignal::Interrupt => "SIGINT",
            ExitSignal::Terminate => "SIGTERM",
            ExitSignal::Hangup => "SIGHUP",
        }
    }
}

/// Resolve with the first exit signal delivered to the process.
pub async fn wait_for_exit_signal() -> io::Result<ExitSignal> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    let received = tokio::select! {
        _ = interrupt.recv() => ExitSignal::Interrupt,
        _ = terminate.recv() => ExitSignal::Terminate,
        _ = hangup.recv() => ExitSignal::Hangup,
    };
    Ok(received)
}

/// Wait for an exit signal, tear down, restore the terminal and exit.
///
/// `shutdown` is raised so a running bridge stops; `activity` reports when
/// it has finished. Never returns once a signal arrives.
pub async fn watch_exit_signals(shutdown: CancelSignal, mut activity: watch::Receiver<bool>) {
    let received = match wait_for_exit_signal().await {
        Ok(received) => received,
        Err(e) => {
            warn!(error = %e, "cannot install signal handlers");
            return;
        }
    };
    info!(signal = received.name(), "Exit signal received");

    shutdown.cancel();
    if tokio::time::timeout(SHUTDOWN_GRACE, activity.wait_for(|active| !*active))
        .await
        .is_err()
    {
        warn!("session did not tear down in time");
    }

    restore_terminal();
    std::process::exit(received.exit_code());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(ExitSignal::Interrupt.exit_code(), 130);
        assert_eq!(ExitSignal::Terminate.exit_code(), 143);
        assert_eq!(ExitSignal::Hangup.exit_code(), 129);
    }
}
