//! Connection and presentation constants for hop.

use std::time::Duration;

// =============================================================================
// Session Constants
// =============================================================================

/// Default dial timeout for opening the SSH transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Terminal type used when neither the caller nor `$TERM` provides one.
pub const DEFAULT_TERM_TYPE: &str = "xterm-256color";

/// Remote terminal columns used when the local size cannot be read.
pub const DEFAULT_TERM_COLS: u16 = 80;

/// Remote terminal rows used when the local size cannot be read.
pub const DEFAULT_TERM_ROWS: u16 = 24;

/// Largest chunk read from local stdin per read call.
pub const INPUT_CHUNK_SIZE: usize = 1024;

/// Number of stdin chunks that may queue up before the reader blocks.
pub const INPUT_QUEUE_DEPTH: usize = 32;

/// How often the stdin reader wakes to check for cancellation.
pub const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal line speed advertised in the PTY request.
pub const PTY_LINE_SPEED: u32 = 14400;

/// SSH keepalive interval during an active session.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Unanswered keepalives before the transport is considered dead.
pub const KEEPALIVE_MAX: usize = 3;

/// Upper bound on the disconnect exchange during teardown.
pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// How long an exit signal waits for a running session to tear down.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// =============================================================================
// Catalog Constants
// =============================================================================

/// Smallest page size the host list will use.
pub const MIN_PAGE_SIZE: usize = 5;

/// Environment variable naming an explicit catalog file.
pub const CONFIG_ENV_VAR: &str = "HOP_CONFIG_FILE";

/// Catalog file name looked up in the home and current directories.
pub const CONFIG_FILE_NAME: &str = ".hop.yaml";

/// Group name hosts fall into when none is configured.
pub const DEFAULT_GROUP: &str = "default";
