//! hop-client: Client library for the hop quick-connect SSH client.
//!
//! Provides:
//! - CLI argument parsing
//! - Raw terminal mode handling and stdin reading
//! - russh-based session establishment
//! - The bidirectional relay and session lifecycle coordinator
//! - The interactive host selector
//! - Exit-signal handling

pub mod cli;
pub mod relay;
pub mod selector;
pub mod session;
pub mod shutdown;
pub mod ssh;
pub mod terminal;

pub use cli::{Cli, CliLogFormat};
pub use relay::{Forwarder, relay};
pub use selector::{Command, Selector, parse_command};
pub use session::Bridge;
pub use shutdown::{ExitSignal, watch_exit_signals};
pub use ssh::{SshEstablisher, SshSession};
pub use terminal::{RawModeController, StdTerminal, get_terminal_size, restore_terminal};
