//! Connection targets handed to the session bridge.
//!
//! A [`ConnectionTarget`] is fully resolved by the time the bridge sees it:
//! address, login name, exactly one credential, and terminal parameters. The
//! bridge only borrows it for the length of one session.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use russh_keys::key::KeyPair;

use crate::constants::{DEFAULT_SSH_PORT, DEFAULT_TERM_COLS, DEFAULT_TERM_ROWS, DEFAULT_TERM_TYPE};
use crate::{Error, Result};

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermSize {
    pub cols: u16,
    pub rows: u16,
}

impl TermSize {
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// A zero dimension means the size could not really be determined.
    pub fn is_usable(&self) -> bool {
        self.cols > 0 && self.rows > 0
    }
}

impl Default for TermSize {
    fn default() -> Self {
        Self::new(DEFAULT_TERM_COLS, DEFAULT_TERM_ROWS)
    }
}

impl fmt::Display for TermSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// The single credential used to authenticate a session.
#[derive(Clone)]
pub enum AuthMethod {
    /// Public-key authentication with an already decoded private key.
    PrivateKey(Arc<KeyPair>),
    /// Password authentication.
    Password(String),
}

impl AuthMethod {
    /// Read and decode an unencrypted private key file.
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let key = russh_keys::load_secret_key(path, None).map_err(|e| {
            Error::config(format!("failed to load private key {}: {}", path.display(), e))
        })?;
        Ok(AuthMethod::PrivateKey(Arc::new(key)))
    }

    /// Decode a private key from its text form (OpenSSH or PEM).
    pub fn from_key_text(text: &str) -> Result<Self> {
        let key = russh_keys::decode_secret_key(text, None)
            .map_err(|e| Error::config(format!("failed to decode private key: {}", e)))?;
        Ok(AuthMethod::PrivateKey(Arc::new(key)))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuthMethod::PrivateKey(_) => "publickey",
            AuthMethod::Password(_) => "password",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::PrivateKey(_) => f.write_str("PrivateKey(..)"),
            AuthMethod::Password(_) => f.write_str("Password(..)"),
        }
    }
}

/// A resolved remote host plus identity for one interactive session.
#[derive(Debug, Clone)]
pub struct ConnectionTarget {
    host: String,
    port: u16,
    user: String,
    auth: Option<AuthMethod>,
    term_type: String,
    size: TermSize,
}

impl ConnectionTarget {
    /// Create a target with no credential, the default terminal type and
    /// the default 80x24 fallback size.
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: if port == 0 { DEFAULT_SSH_PORT } else { port },
            user: user.into(),
            auth: None,
            term_type: DEFAULT_TERM_TYPE.to_string(),
            size: TermSize::default(),
        }
    }

    pub fn with_auth(mut self, auth: AuthMethod) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the terminal type; an empty string keeps the default.
    pub fn with_term_type(mut self, term_type: impl Into<String>) -> Self {
        let term_type = term_type.into();
        if !term_type.is_empty() {
            self.term_type = term_type;
        }
        self
    }

    /// Size requested for the remote terminal when the local one cannot be measured.
    pub fn with_size(mut self, size: TermSize) -> Self {
        if size.is_usable() {
            self.size = size;
        }
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn auth(&self) -> Option<&AuthMethod> {
        self.auth.as_ref()
    }

    pub fn term_type(&self) -> &str {
        &self.term_type
    }

    pub fn size(&self) -> TermSize {
        self.size
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Check that the credential is present and well-formed.
    ///
    /// Runs before any socket is opened, so a bad credential never costs a
    /// connection attempt.
    pub fn validate_auth(&self) -> Result<&AuthMethod> {
        match &self.auth {
            None => Err(Error::auth("no authentication method configured")),
            Some(AuthMethod::Password(p)) if p.is_empty() => {
                Err(Error::auth("empty password"))
            }
            Some(auth) => Ok(auth),
        }
    }
}

/// Pick the terminal type: explicit value, then `$TERM`, then the default.
pub fn resolve_term_type(explicit: Option<&str>) -> String {
    explicit
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| std::env::var("TERM").ok().filter(|t| !t.is_empty()))
        .unwrap_or_else(|| DEFAULT_TERM_TYPE.to_string())
}

// =============================================================================
// Tests
// =============================================================================
