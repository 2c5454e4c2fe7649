//! Session outcomes.
//!
//! The remote command's own exit code is not the bridge's concern: a shell
//! that exits non-zero, or a channel that closes without reporting a status,
//! is still a session that worked. Only mechanism failures carry an error.

use std::fmt;

use crate::Error;

/// How the remote side ended, as reported by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteExit {
    /// The remote process reported an exit status.
    Status(u32),
    /// The remote process was killed by a signal.
    Signal(String),
    /// The channel closed without an exit status.
    Missing,
}

impl fmt::Display for RemoteExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteExit::Status(code) => write!(f, "exit status {}", code),
            RemoteExit::Signal(name) => write!(f, "signal {}", name),
            RemoteExit::Missing => f.write_str("no exit status"),
        }
    }
}

/// Classified result of one session.
#[derive(Debug)]
pub enum Outcome {
    /// Remote shell exited with status 0, or closed without a status.
    Clean,
    /// Remote shell exited non-zero or by signal. Not an error.
    RemoteNonZeroExit(RemoteExit),
    /// The transport failed while the session was active.
    TransportError(Error),
    /// The session never became active; carries the failing step.
    NegotiationError(Error),
    /// A local terminal or I/O failure ended the session.
    LocalIoError(Error),
}

impl Outcome {
    /// Classify what the completion wait observed.
    pub fn from_completion(result: Result<RemoteExit, Error>) -> Self {
        match result {
            Ok(RemoteExit::Status(0)) | Ok(RemoteExit::Missing) => Outcome::Clean,
            Ok(exit) => Outcome::RemoteNonZeroExit(exit),
            Err(e @ (Error::Io(_) | Error::TerminalUnavailable { .. })) => Outcome::LocalIoError(e),
            Err(e) => Outcome::TransportError(e),
        }
    }

    /// Wrap an error raised before the session became active.
    pub fn from_setup_error(err: Error) -> Self {
        if err.is_establishment() {
            Outcome::NegotiationError(err)
        } else {
            match err {
                Error::Transport { .. } => Outcome::TransportError(err),
                other => Outcome::LocalIoError(other),
            }
        }
    }

    /// True when the bridge itself worked, whatever the remote exit code.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Clean | Outcome::RemoteNonZeroExit(_))
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Outcome::Clean | Outcome::RemoteNonZeroExit(_) => None,
            Outcome::TransportError(e) | Outcome::NegotiationError(e) | Outcome::LocalIoError(e) => {
                Some(e)
            }
        }
    }

    /// Single-line message for the operator, or `None` when nothing should
    /// be printed.
    pub fn diagnostic(&self) -> Option<String> {
        self.error().map(|e| e.to_string())
    }

    /// Exit code for single-shot mode.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_status_is_clean() {
        let outcome = Outcome::from_completion(Ok(RemoteExit::Status(0)));
        assert!(matches!(outcome, Outcome::Clean));
        assert!(outcome.diagnostic().is_none());
    }

    #[test]
    fn missing_status_is_clean() {
        let outcome = Outcome::from_completion(Ok(RemoteExit::Missing));
        assert!(matches!(outcome, Outcome::Clean));
    }

    #[test]
    fn nonzero_status_is_not_an_error() {
        let outcome = Outcome::from_completion(Ok(RemoteExit::Status(7)));
        assert!(matches!(
            outcome,
            Outcome::RemoteNonZeroExit(RemoteExit::Status(7))
        ));
        assert!(outcome.is_success());
        assert!(outcome.diagnostic().is_none());
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn signal_exit_is_nonzero() {
        let outcome = Outcome::from_completion(Ok(RemoteExit::Signal("KILL".into())));
        assert!(matches!(outcome, Outcome::RemoteNonZeroExit(_)));
    }

    #[test]
    fn transport_failure_is_surfaced() {
        let outcome = Outcome::from_completion(Err(Error::transport("connection reset")));
        assert!(matches!(outcome, Outcome::TransportError(_)));
        assert_eq!(
            outcome.diagnostic().as_deref(),
            Some("transport error: connection reset")
        );
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn local_io_failure_during_wait() {
        let err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "stdout closed",
        ));
        let outcome = Outcome::from_completion(Err(err));
        assert!(matches!(outcome, Outcome::LocalIoError(_)));
    }

    #[test]
    fn setup_errors_keep_their_stage() {
        let outcome = Outcome::from_setup_error(Error::dial("refused"));
        match outcome {
            Outcome::NegotiationError(e) => assert_eq!(e.stage(), Some("dial")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn terminal_unavailable_is_local() {
        let outcome = Outcome::from_setup_error(Error::TerminalUnavailable {
            message: "stdin is not a tty".into(),
        });
        assert!(matches!(outcome, Outcome::LocalIoError(_)));
    }

    #[test]
    fn remote_exit_display() {
        assert_eq!(RemoteExit::Status(7).to_string(), "exit status 7");
        assert_eq!(RemoteExit::Signal("TERM".into()).to_string(), "signal TERM");
        assert_eq!(RemoteExit::Missing.to_string(), "no exit status");
    }
}
