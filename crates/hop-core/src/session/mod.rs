//! Seams between the session bridge and the world it drives.
//!
//! The bridge coordinator in `hop-client` is written against three traits:
//! - [`LocalTerminal`]: the one terminal attached to this process
//! - [`Establish`]: opens an authenticated shell channel to a target
//! - [`RemoteSession`]: the live transport + channel pair for one shell
//!
//! Production code implements them with termios and russh; tests use the
//! fakes in `hop-test-utils`.

mod io;
mod state;

use std::time::Duration;

use async_trait::async_trait;

use crate::outcome::RemoteExit;
use crate::target::{ConnectionTarget, TermSize};
use crate::Result;

pub use io::{CancelListener, CancelSignal, InputFeed, LocalInput, RemoteInput, RemoteOutput};
pub use state::{InvalidTransition, SessionPhase};

/// Token for one raw-mode entry.
///
/// Restoring with a token whose entry was already undone is a no-op, so a
/// token may be restored any number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawModeState {
    generation: u64,
}

impl RawModeState {
    pub fn new(generation: u64) -> Self {
        Self { generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The local terminal: raw mode, size, keystrokes and output.
pub trait LocalTerminal: Send + Sync {
    /// Switch stdin to raw mode. Fails with `TerminalUnavailable` when stdin
    /// is not a terminal.
    fn enter_raw(&self) -> Result<RawModeState>;

    /// Undo a raw-mode entry. Never fails; repeated calls are no-ops.
    fn restore(&self, state: &RawModeState);

    /// Current size in cells.
    fn query_size(&self) -> Result<TermSize>;

    /// Start reading raw keystrokes.
    fn open_input(&self) -> LocalInput;

    /// Where remote stdout/stderr should be written.
    fn output(&self) -> RemoteOutput;
}

/// Opens an interactive shell on a remote host.
#[async_trait]
pub trait Establish: Send + Sync {
    type Session: RemoteSession;

    /// Dial, authenticate, open a channel, request a PTY of `size` and start
    /// a shell. Each failing step has its own error variant; nothing is
    /// retried and no partial session is returned.
    async fn establish(
        &self,
        target: &ConnectionTarget,
        size: TermSize,
        timeout: Duration,
    ) -> Result<Self::Session>;
}

/// A live shell channel and the transport under it.
#[async_trait]
pub trait RemoteSession: Send {
    /// Sink for local keystrokes. Writes fail once the channel is closed.
    fn input(&self) -> RemoteInput;

    /// Pump remote output into `output` and forward queued input until the
    /// remote shell exits or the transport fails.
    async fn wait(&mut self, output: &mut RemoteOutput) -> Result<RemoteExit>;

    /// Close the channel. Idempotent and infallible.
    async fn close_channel(&mut self);

    /// Close the transport. Idempotent and infallible.
    async fn close_transport(&mut self);
}
