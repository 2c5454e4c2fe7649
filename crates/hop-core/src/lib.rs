//! hop-core: Shared library for the hop quick-connect client.
//!
//! This crate provides:
//! - The error taxonomy and result alias
//! - Connection targets and session outcomes
//! - Session seams (local terminal, establisher, remote session) and the
//!   session phase machine
//! - The host catalog and its browsing/summary helpers
//! - Logging setup

pub mod catalog;
pub mod constants;
pub mod error;
pub mod logging;
pub mod outcome;
pub mod session;
pub mod target;

pub use error::{Error, Result};
pub use logging::{LogFormat, init_logging};
pub use outcome::{Outcome, RemoteExit};
pub use target::{AuthMethod, ConnectionTarget, TermSize};
