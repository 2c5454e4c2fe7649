//! Local terminal handling for interactive sessions.
//!
//! Provides:
//! - The process-wide raw-mode controller
//! - Terminal size detection
//! - A cancellable, unbuffered stdin reader

use std::io;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use hop_core::constants::{INPUT_CHUNK_SIZE, INPUT_POLL_INTERVAL, INPUT_QUEUE_DEPTH};
use hop_core::session::{InputFeed, LocalInput, LocalTerminal, RawModeState, RemoteOutput};
use hop_core::{Error, Result, TermSize};

/// The one controller for the one terminal attached to this process.
static CONTROLLER: RawModeController = RawModeController::new();

#[derive(Debug)]
struct ControllerState {
    /// Cooked-mode settings, captured once per process.
    original: Option<libc::termios>,
    /// Whether a raw-mode entry is currently in effect.
    active: bool,
    /// Incremented on every raw-mode entry; ties tokens to entries.
    generation: u64,
}

/// Serialized access to the terminal mode of stdin.
///
/// Session cleanup and the signal-driven exit path both restore through this
/// controller, so they cannot race or double-apply a stale capture.
#[derive(Debug)]
pub struct RawModeController {
    state: Mutex<ControllerState>,
}

impl RawModeController {
    const fn new() -> Self {
        Self {
            state: Mutex::new(ControllerState {
                original: None,
                active: false,
                generation: 0,
            }),
        }
    }

    pub fn global() -> &'static RawModeController {
        &CONTROLLER
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the cooked-mode settings if not done yet.
    ///
    /// Called at startup so the capture predates any prompt library or
    /// session touching the terminal. A non-terminal stdin is not an error
    /// here; `enter_raw` reports it.
    pub fn capture(&self) {
        let mut state = self.lock();
        if state.original.is_none()
            && let Ok(termios) = read_termios(libc::STDIN_FILENO)
        {
            state.original = Some(termios);
            debug!("captured terminal settings");
        }
    }

    /// Switch stdin to raw mode.
    pub fn enter_raw(&self) -> Result<RawModeState> {
        let fd = libc::STDIN_FILENO;
        if unsafe { libc::isatty(fd) } != 1 {
            return Err(Error::TerminalUnavailable {
                message: "stdin is not a terminal".into(),
            });
        }

        let mut state = self.lock();
        if state.active {
            return Ok(RawModeState::new(state.generation));
        }

        let original = match state.original {
            Some(original) => original,
            None => {
                let original = read_termios(fd)?;
                state.original = Some(original);
                original
            }
        };

        let mut raw = original;

        // Input: no break signal, CR->NL mapping, parity check, 8th bit
        // stripping or XON/XOFF flow control.
        raw.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
        // Output: no post-processing.
        raw.c_oflag &= !libc::OPOST;
        raw.c_cflag |= libc::CS8;
        // Local: no echo, canonical mode, signals or extended input.
        raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);
        // read() returns after one byte, no timeout.
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;

        if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, &raw) } != 0 {
            return Err(Error::TerminalUnavailable {
                message: format!("tcsetattr failed: {}", io::Error::last_os_error()),
            });
        }

        state.generation += 1;
        state.active = true;
        debug!(generation = state.generation, "entered raw terminal mode");
        Ok(RawModeState::new(state.generation))
    }

    /// Undo the raw-mode entry `token` came from.
    ///
    /// Never fails. A token whose entry is already undone is ignored.
    pub fn restore(&self, token: &RawModeState) {
        let mut state = self.lock();
        if !state.active || token.generation() != state.generation {
            debug!(generation = token.generation(), "terminal already restored");
            return;
        }
        apply_original(&mut state);
    }

    /// Put the terminal back to its captured settings on process exit,
    /// whatever put it in raw mode.
    pub fn restore_on_exit(&self) {
        let mut state = self.lock();
        if state.original.is_some() {
            apply_original(&mut state);
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }
}

fn read_termios(fd: libc::c_int) -> Result<libc::termios> {
    let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();
    if unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) } != 0 {
        return Err(Error::TerminalUnavailable {
            message: format!("tcgetattr failed: {}", io::Error::last_os_error()),
        });
    }
    Ok(unsafe { termios.assume_init() })
}

fn apply_original(state: &mut ControllerState) {
    if let Some(original) = state.original {
        let result = unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &original) };
        if result != 0 {
            // Nothing sensible left to do about it.
            warn!(error = %io::Error::last_os_error(), "failed to restore terminal settings");
        } else {
            debug!("restored terminal settings");
        }
    }
    state.active = false;
}

/// Restore the terminal on any process exit path.
pub fn restore_terminal() {
    RawModeController::global().restore_on_exit();
}

/// Current terminal size, read from stdout then stdin.
pub fn get_terminal_size() -> Result<TermSize> {
    for fd in [libc::STDOUT_FILENO, libc::STDIN_FILENO] {
        let mut winsize = std::mem::MaybeUninit::<libc::winsize>::uninit();
        if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, winsize.as_mut_ptr()) } == 0 {
            let winsize = unsafe { winsize.assume_init() };
            let size = TermSize::new(winsize.ws_col, winsize.ws_row);
            if size.is_usable() {
                return Ok(size);
            }
        }
    }
    Err(Error::TerminalUnavailable {
        message: "cannot read terminal size".into(),
    })
}

/// Start the stdin reader thread.
///
/// The thread polls stdin with a short timeout so it can notice
/// cancellation without consuming another keystroke, and reads with
/// `read(2)` directly so no bytes sit in a userspace buffer once it stops.
pub fn spawn_stdin_reader() -> LocalInput {
    let (feed, input) = LocalInput::channel(INPUT_QUEUE_DEPTH);
    let spawned = std::thread::Builder::new()
        .name("hop-stdin".into())
        .spawn(move || read_stdin(feed));
    if let Err(e) = spawned {
        tracing::error!(error = %e, "failed to start stdin reader");
    }
    input
}

fn read_stdin(feed: InputFeed) {
    let fd = libc::STDIN_FILENO;
    let mut buf = [0u8; INPUT_CHUNK_SIZE];
    let timeout_ms = INPUT_POLL_INTERVAL.as_millis() as libc::c_int;

    while !feed.is_cancelled() {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let ready = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            tracing::error!(error = %err, "stdin poll error");
            break;
        }
        if ready == 0 {
            continue;
        }
        if pfd.revents & libc::POLLIN == 0 {
            debug!(revents = pfd.revents, "stdin closed");
            break;
        }
        // Cancellation may have landed while polling.
        if feed.is_cancelled() {
            break;
        }

        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        match n {
            0 => {
                debug!("stdin EOF");
                break;
            }
            n if n < 0 => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                tracing::error!(error = %err, "stdin read error");
                break;
            }
            n => {
                if !feed.blocking_send(buf[..n as usize].to_vec()) {
                    break;
                }
            }
        }
    }
    debug!("stdin reader thread exiting");
}

/// The real terminal attached to this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdTerminal;

impl LocalTerminal for StdTerminal {
    fn enter_raw(&self) -> Result<RawModeState> {
        RawModeController::global().enter_raw()
    }

    fn restore(&self, state: &RawModeState) {
        RawModeController::global().restore(state);
    }

    fn query_size(&self) -> Result<TermSize> {
        get_terminal_size()
    }

    fn open_input(&self) -> LocalInput {
        spawn_stdin_reader()
    }

    fn output(&self) -> RemoteOutput {
        RemoteOutput::stdio()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_controller_is_not_active() {
        let controller = RawModeController::new();
        assert!(!controller.is_active());
    }

    #[test]
    fn restore_without_entry_is_a_no_op() {
        let controller = RawModeController::new();
        let token = RawModeState::new(1);
        controller.restore(&token);
        controller.restore(&token);
        assert!(!controller.is_active());
    }

    #[test]
    fn restore_on_exit_without_capture_is_a_no_op() {
        let controller = RawModeController::new();
        controller.restore_on_exit();
        assert!(!controller.is_active());
    }

    #[test]
    fn terminal_size_is_usable_or_unavailable() {
        // No terminal under most test runners; either answer is fine as
        // long as a returned size is non-zero.
        match get_terminal_size() {
            Ok(size) => assert!(size.is_usable()),
            Err(e) => assert!(matches!(e, Error::TerminalUnavailable { .. })),
        }
    }

    #[test]
    fn enter_raw_without_tty_is_unavailable() {
        if unsafe { libc::isatty(libc::STDIN_FILENO) } == 1 {
            return;
        }
        let controller = RawModeController::new();
        let err = controller.enter_raw().unwrap_err();
        assert!(matches!(err, Error::TerminalUnavailable { .. }));
        assert!(!controller.is_active());
    }
}
