//! Client CLI implementation.
//!
//! Provides command-line argument parsing using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};

use hop_core::target::resolve_term_type;

/// Log output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

impl From<CliLogFormat> for hop_core::LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => hop_core::LogFormat::Text,
            CliLogFormat::Json => hop_core::LogFormat::Json,
        }
    }
}

/// Pick a host from your catalog and get a shell on it.
#[derive(Debug, Parser)]
#[command(name = "hop", version, about = "Pick a host from your catalog and get a shell on it")]
pub struct Cli {
    /// Catalog host to connect to directly (name or page number)
    #[arg(value_name = "HOST", conflicts_with = "list")]
    pub host: Option<String>,

    /// Host catalog file
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the host summary and exit
    #[arg(short = 'l', long = "list")]
    pub list: bool,

    /// Start with a group filter applied
    #[arg(short = 'g', long = "group", value_name = "GROUP")]
    pub group: Option<String>,

    /// Connection timeout in seconds
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "SECS",
        default_value_t = 3,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Terminal type sent to the server (defaults to $TERM)
    #[arg(long = "term", value_name = "TYPE")]
    pub term: Option<String>,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log to file instead of stderr
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long = "log-format", default_value = "text")]
    pub log_format: CliLogFormat,
}

impl Cli {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// `--term`, else `$TERM`, else the default terminal type.
    pub fn term_type(&self) -> String {
        resolve_term_type(self.term.as_deref())
    }

    pub fn colored(&self) -> bool {
        !self.no_color
    }
}

// =============================================================================
// Tests
// =============================================================================
