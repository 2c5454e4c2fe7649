//! Session lifecycle and cleanup coordination.
//!
//! [`Bridge::run`] drives one interactive session from a resolved target to
//! an [`Outcome`]:
//!
//! ```text
//! Idle -> Establishing -> Active -> Completing -> TornDown
//! ```
//!
//! Teardown always runs in the same order, on every path that acquired
//! something: cancel forward, close channel, close transport, restore the
//! terminal. Teardown steps never fail; only the first error observed ends
//! up in the outcome.

use std::io;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use hop_core::constants::DEFAULT_CONNECT_TIMEOUT;
use hop_core::session::{CancelListener, Establish, LocalTerminal, RemoteSession, SessionPhase};
use hop_core::{ConnectionTarget, Error, Outcome};

use crate::relay;

/// Clears the session-active flag however `run` returns.
struct ActiveGuard<'a>(&'a watch::Sender<bool>);

impl<'a> ActiveGuard<'a> {
    fn new(flag: &'a watch::Sender<bool>) -> Self {
        flag.send_replace(true);
        Self(flag)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

fn enter(phase: &mut SessionPhase, next: SessionPhase) {
    if let Err(e) = phase.advance(next) {
        error!(error = %e, "session lifecycle violated");
        *phase = next;
    }
}

fn interrupted() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::Interrupted,
        "interrupted by signal",
    ))
}

/// Bridges the local terminal to one remote shell at a time.
pub struct Bridge<E, T> {
    establisher: E,
    terminal: T,
    connect_timeout: Duration,
    shutdown: Option<CancelListener>,
    active: watch::Sender<bool>,
    phase: SessionPhase,
}

impl<E: Establish, T: LocalTerminal> Bridge<E, T> {
    pub fn new(establisher: E, terminal: T) -> Self {
        let (active, _) = watch::channel(false);
        Self {
            establisher,
            terminal,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            shutdown: None,
            active,
            phase: SessionPhase::Idle,
        }
    }

    /// Bound on each establishment step.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Abort a running session and tear it down when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: CancelListener) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Observe whether a session is in progress.
    pub fn activity(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    /// Phase the most recent session ended in.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn establisher(&self) -> &E {
        &self.establisher
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    /// Run one session to completion.
    ///
    /// Never returns with the terminal left in raw mode or with the channel
    /// or transport open.
    pub async fn run(&mut self, target: &ConnectionTarget) -> Outcome {
        let _active = ActiveGuard::new(&self.active);
        let mut shutdown = self.shutdown.clone();
        let mut phase = SessionPhase::Idle;

        if shutdown.as_ref().is_some_and(|s| s.is_cancelled()) {
            self.phase = phase;
            return Outcome::from_setup_error(interrupted());
        }

        enter(&mut phase, SessionPhase::Establishing);
        let size = match self.terminal.query_size() {
            Ok(size) if size.is_usable() => size,
            Ok(_) | Err(_) => {
                debug!(fallback = %target.size(), "terminal size unavailable");
                target.size()
            }
        };

        info!(addr = %target.address(), size = %size, "Starting session");
        let establish = self.establisher.establish(target, size, self.connect_timeout);
        let established = match shutdown.as_mut() {
            Some(shutdown) => tokio::select! {
                result = establish => result,
                _ = shutdown.cancelled() => Err(interrupted()),
            },
            None => establish.await,
        };
        let mut session = match established {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, stage = e.stage().unwrap_or("-"), "Session establishment failed");
                enter(&mut phase, SessionPhase::TornDown);
                self.phase = phase;
                return Outcome::from_setup_error(e);
            }
        };
        enter(&mut phase, SessionPhase::Active);

        let raw = match self.terminal.enter_raw() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "cannot switch terminal to raw mode");
                enter(&mut phase, SessionPhase::Completing);
                session.close_channel().await;
                session.close_transport().await;
                enter(&mut phase, SessionPhase::TornDown);
                self.phase = phase;
                return Outcome::LocalIoError(e);
            }
        };

        let input = self.terminal.open_input();
        let mut output = self.terminal.output();
        let outcome = relay::relay(&mut session, input, &mut output, shutdown.as_mut()).await;

        enter(&mut phase, SessionPhase::Completing);
        session.close_channel().await;
        session.close_transport().await;
        self.terminal.restore(&raw);
        enter(&mut phase, SessionPhase::TornDown);
        self.phase = phase;

        match &outcome {
            Outcome::Clean | Outcome::RemoteNonZeroExit(_) => {
                info!(outcome = ?outcome, "Session ended")
            }
            _ => warn!(outcome = ?outcome, "Session ended with error"),
        }
        outcome
    }
}

impl<E, T> std::fmt::Debug for Bridge<E, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("connect_timeout", &self.connect_timeout)
            .field("phase", &self.phase)
            .finish()
    }
}
