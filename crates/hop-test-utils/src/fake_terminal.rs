//! Fake local terminal for testing without a tty.
//!
//! Tracks raw-mode entries and restores the way the real controller does,
//! captures remote output in memory, and lets tests type keystrokes through
//! an [`InputFeed`].

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

use hop_core::session::{
    CancelSignal, InputFeed, LocalInput, LocalTerminal, RawModeState, RemoteOutput,
};
use hop_core::{Error, Result, TermSize};

use crate::timeline::{Event, Timeline};

/// In-memory writer that can be read back from another handle.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    data: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.data.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[derive(Debug, Default)]
struct RawState {
    active: bool,
    generation: u64,
    restores: usize,
}

/// A scripted stand-in for the process terminal.
#[derive(Debug)]
pub struct FakeTerminal {
    timeline: Timeline,
    size: Option<TermSize>,
    tty: bool,
    raw: Mutex<RawState>,
    pending_input: Mutex<Option<LocalInput>>,
    input_cancel: Mutex<Option<CancelSignal>>,
    idle_feeds: Mutex<Vec<InputFeed>>,
    stdout: SharedBuffer,
    stderr: SharedBuffer,
}

impl FakeTerminal {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            size: Some(TermSize::new(120, 40)),
            tty: true,
            raw: Mutex::new(RawState::default()),
            pending_input: Mutex::new(None),
            input_cancel: Mutex::new(None),
            idle_feeds: Mutex::new(Vec::new()),
            stdout: SharedBuffer::new(),
            stderr: SharedBuffer::new(),
        }
    }

    /// Size reported by `query_size`; `None` makes the query fail.
    pub fn with_size(mut self, size: Option<TermSize>) -> Self {
        self.size = size;
        self
    }

    /// Make `enter_raw` fail as it does when stdin is not a terminal.
    pub fn without_tty(mut self) -> Self {
        self.tty = false;
        self
    }

    /// Feed for the input the next session will read.
    ///
    /// Sessions opened without a prepared feed see an input that never
    /// yields anything.
    pub fn input_feed(&self) -> InputFeed {
        let (feed, input) = LocalInput::channel(16);
        *self.pending_input.lock().unwrap() = Some(input);
        feed
    }

    pub fn stdout(&self) -> SharedBuffer {
        self.stdout.clone()
    }

    pub fn stderr(&self) -> SharedBuffer {
        self.stderr.clone()
    }

    pub fn is_raw(&self) -> bool {
        self.raw.lock().unwrap().active
    }

    /// Restores that actually changed the terminal mode.
    pub fn restore_count(&self) -> usize {
        self.raw.lock().unwrap().restores
    }

    /// Whether the most recently opened input was cancelled.
    pub fn input_cancelled(&self) -> bool {
        self.input_cancel
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|c| c.is_cancelled())
    }
}

impl LocalTerminal for FakeTerminal {
    fn enter_raw(&self) -> Result<RawModeState> {
        if !self.tty {
            return Err(Error::TerminalUnavailable {
                message: "stdin is not a terminal".into(),
            });
        }
        let mut raw = self.raw.lock().unwrap();
        if !raw.active {
            raw.generation += 1;
            raw.active = true;
            self.timeline.record(Event::RawEntered);
        }
        Ok(RawModeState::new(raw.generation))
    }

    fn restore(&self, state: &RawModeState) {
        let mut raw = self.raw.lock().unwrap();
        if raw.active && state.generation() == raw.generation {
            raw.active = false;
            raw.restores += 1;
            self.timeline.record(Event::Restored);
        }
    }

    fn query_size(&self) -> Result<TermSize> {
        self.timeline.record(Event::SizeQueried);
        self.size.ok_or_else(|| Error::TerminalUnavailable {
            message: "no terminal size".into(),
        })
    }

    fn open_input(&self) -> LocalInput {
        self.timeline.record(Event::InputOpened);
        let input = self
            .pending_input
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| {
                // Held so reads pend instead of reporting EOF.
                let (feed, input) = LocalInput::channel(1);
                self.idle_feeds.lock().unwrap().push(feed);
                input
            });
        *self.input_cancel.lock().unwrap() = Some(input.cancel_signal());
        input
    }

    fn output(&self) -> RemoteOutput {
        RemoteOutput::new(self.stdout.clone(), self.stderr.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_is_idempotent() {
        let terminal = FakeTerminal::new(Timeline::new());
        let token = terminal.enter_raw().unwrap();
        assert!(terminal.is_raw());

        terminal.restore(&token);
        terminal.restore(&token);
        assert!(!terminal.is_raw());
        assert_eq!(terminal.restore_count(), 1);
    }

    #[test]
    fn no_tty_fails_raw_entry() {
        let terminal = FakeTerminal::new(Timeline::new()).without_tty();
        assert!(matches!(
            terminal.enter_raw(),
            Err(Error::TerminalUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn prepared_feed_reaches_input() {
        let terminal = FakeTerminal::new(Timeline::new());
        let feed = terminal.input_feed();
        let mut input = terminal.open_input();
        assert!(feed.send(b"a".to_vec()).await);
        assert_eq!(input.read().await.unwrap(), b"a");
    }
}
