//! Error types for hop.

use thiserror::Error;

/// Main error type for hop operations.
///
/// The first five variants are the establishment failures, one per step of
/// bringing a session up. They are reported to the caller as-is and never
/// retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Could not open the network transport (DNS, refused, handshake, timeout).
    #[error("dial failed: {message}")]
    DialFailed { message: String },

    /// The server rejected the credential, or no usable credential was given.
    #[error("authentication failed: {message}")]
    AuthFailed { message: String },

    /// Opening the session channel failed.
    #[error("channel open failed: {message}")]
    ChannelFailed { message: String },

    /// The server refused the pseudo-terminal request.
    #[error("pty request failed: {message}")]
    PtyRequestFailed { message: String },

    /// The server refused to start an interactive shell.
    #[error("shell start failed: {message}")]
    ShellStartFailed { message: String },

    /// Transport failure after the session became active.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// I/O error on the local side (stdin, stdout, files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Standard input is not an interactive terminal, or a terminal call failed.
    #[error("terminal unavailable: {message}")]
    TerminalUnavailable { message: String },

    /// Host catalog could not be loaded or is invalid.
    #[error("config error: {message}")]
    Config { message: String },

    /// Operator input did not resolve to exactly one host.
    #[error("{message}")]
    Selection { message: String },
}

impl Error {
    /// Returns true for errors raised while bringing a session up.
    pub fn is_establishment(&self) -> bool {
        self.stage().is_some()
    }

    /// Name of the establishment step that failed, if this is an
    /// establishment error.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Error::DialFailed { .. } => Some("dial"),
            Error::AuthFailed { .. } => Some("auth"),
            Error::ChannelFailed { .. } => Some("channel"),
            Error::PtyRequestFailed { .. } => Some("pty"),
            Error::ShellStartFailed { .. } => Some("shell"),
            _ => None,
        }
    }

    pub fn dial(message: impl Into<String>) -> Self {
        Error::DialFailed {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Error::AuthFailed {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}

/// Convenience result type for hop operations.
pub type Result<T> = std::result::Result<T, Error>;
