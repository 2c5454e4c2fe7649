//! hop-test-utils: Test infrastructure for hop.
//!
//! Provides:
//! - FakeTerminal: Scripted local terminal with in-memory output
//! - FakeEstablisher / FakeRemote: Scripted remote shells
//! - Timeline: Shared event log for ordering assertions
//! - TestKeys: Fixed key material for deterministic testing

mod fake_remote;
mod fake_terminal;
mod test_keys;
mod timeline;

pub use fake_remote::{FakeEstablisher, FakeRemote, RemoteProbe, Step};
pub use fake_terminal::{FakeTerminal, SharedBuffer};
pub use test_keys::TestKeys;
pub use timeline::{Event, Timeline};
