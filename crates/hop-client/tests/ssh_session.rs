//! Shell sessions against an in-process russh server.
//!
//! Each test starts a one-connection server that accepts the fixture
//! password, answers the PTY and shell requests, then follows a script:
//! - Exit status then close
//! - Close without an exit status
//! - Output then a dropped socket
//! - Exit status then a dropped socket, with local input still queued
//! - Refused PTY or shell request

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::server::{self, Auth, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, Pty};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use hop_client::{Bridge, SshEstablisher};
use hop_core::session::{Establish, RemoteOutput, RemoteSession};
use hop_core::{ConnectionTarget, Error, Outcome, RemoteExit, TermSize};
use hop_test_utils::{FakeTerminal, SharedBuffer, TestKeys, Timeline};

const TIMEOUT: Duration = Duration::from_secs(3);

/// What the server does once the shell is requested.
#[derive(Debug, Clone, Copy)]
enum Script {
    Exit(u32),
    CloseWithoutStatus,
    DropAfterOutput,
    ExitThenDrop(u32),
    RefusePty,
    RefuseShell,
}

struct ShellServer {
    script: Script,
    cut: Arc<Notify>,
}

#[async_trait]
impl server::Handler for ShellServer {
    type Error = russh::Error;

    async fn auth_password(&mut self, _user: &str, password: &str) -> Result<Auth, Self::Error> {
        assert_eq!(password, "hunter2");
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        match self.script {
            Script::RefusePty => session.channel_failure(channel),
            _ => session.channel_success(channel),
        }
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if let Script::RefuseShell = self.script {
            session.channel_failure(channel);
            return Ok(());
        }
        session.channel_success(channel);

        match self.script {
            Script::Exit(code) => {
                session.data(channel, CryptoVec::from_slice(b"bye\r\n"));
                session.exit_status_request(channel, code);
                session.eof(channel);
                session.close(channel);
            }
            Script::CloseWithoutStatus => {
                session.data(channel, CryptoVec::from_slice(b"bye\r\n"));
                session.eof(channel);
                session.close(channel);
            }
            Script::DropAfterOutput => {
                session.data(channel, CryptoVec::from_slice(b"top - 10:00:01\r\n"));
                self.cut.notify_one();
            }
            Script::ExitThenDrop(code) => {
                session.exit_status_request(channel, code);
                self.cut.notify_one();
            }
            Script::RefusePty | Script::RefuseShell => {}
        }
        Ok(())
    }
}

/// Start a server for one connection and return its port.
///
/// The client socket is relayed through an in-memory pipe so the server
/// can cut the connection without a goodbye.
async fn serve(script: Script) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = Arc::new(server::Config {
        keys: vec![russh_keys::decode_secret_key(TestKeys::ED25519_PRIVATE, None).unwrap()],
        auth_rejection_time: Duration::from_millis(0),
        ..Default::default()
    });

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let (server_side, mut relay_side) = tokio::io::duplex(64 * 1024);
        let cut = Arc::new(Notify::new());
        let handler = ShellServer {
            script,
            cut: cut.clone(),
        };
        tokio::spawn(async move {
            if let Ok(running) = server::run_stream(config, server_side, handler).await {
                let _ = running.await;
            }
        });

        tokio::select! {
            _ = tokio::io::copy_bidirectional(&mut socket, &mut relay_side) => {}
            _ = async {
                cut.notified().await;
                // Let queued packets reach the client first.
                tokio::time::sleep(Duration::from_millis(100)).await;
            } => {}
        }
    });

    port
}

fn target(port: u16) -> ConnectionTarget {
    ConnectionTarget::new("127.0.0.1", port, "ops").with_auth(TestKeys::password())
}

async fn run_bridge(script: Script) -> (Outcome, Bridge<SshEstablisher, FakeTerminal>) {
    let port = serve(script).await;
    let mut bridge = Bridge::new(SshEstablisher::new(), FakeTerminal::new(Timeline::new()))
        .with_timeout(TIMEOUT);
    let outcome = bridge.run(&target(port)).await;
    assert!(!bridge.terminal().is_raw());
    (outcome, bridge)
}

// =============================================================================
// Remote exit classification
// =============================================================================

#[tokio::test]
async fn test_exit_zero_is_clean() {
    let (outcome, bridge) = run_bridge(Script::Exit(0)).await;

    assert!(matches!(outcome, Outcome::Clean), "got {:?}", outcome);
    assert_eq!(bridge.terminal().stdout().to_string_lossy(), "bye\r\n");
    assert_eq!(bridge.terminal().restore_count(), 1);
}

#[tokio::test]
async fn test_exit_seven_is_nonzero() {
    let (outcome, _) = run_bridge(Script::Exit(7)).await;

    assert!(
        matches!(outcome, Outcome::RemoteNonZeroExit(RemoteExit::Status(7))),
        "got {:?}",
        outcome
    );
    assert!(outcome.diagnostic().is_none());
}

#[tokio::test]
async fn test_close_without_status_is_clean() {
    let (outcome, bridge) = run_bridge(Script::CloseWithoutStatus).await;

    assert!(matches!(outcome, Outcome::Clean), "got {:?}", outcome);
    assert_eq!(bridge.terminal().stdout().to_string_lossy(), "bye\r\n");
}

#[tokio::test]
async fn test_dropped_connection_is_transport_error() {
    let (outcome, bridge) = run_bridge(Script::DropAfterOutput).await;

    assert!(matches!(outcome, Outcome::TransportError(_)), "got {:?}", outcome);
    assert!(outcome.diagnostic().is_some());
    assert_eq!(bridge.terminal().stdout().to_string_lossy(), "top - 10:00:01\r\n");
    assert_eq!(bridge.terminal().restore_count(), 1);
}

#[tokio::test]
async fn test_failed_input_write_keeps_recorded_exit() {
    let port = serve(Script::ExitThenDrop(7)).await;
    let mut session = SshEstablisher::new()
        .establish(&target(port), TermSize::default(), TIMEOUT)
        .await
        .unwrap();

    // Keystrokes queued while the connection goes away.
    let input = session.input();
    for key in [b"q".to_vec(), b"\r".to_vec(), b"\x04".to_vec()] {
        input.write(key).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(400)).await;

    let mut output = RemoteOutput::new(SharedBuffer::new(), SharedBuffer::new());
    let result = session.wait(&mut output).await;

    assert!(
        matches!(result, Ok(RemoteExit::Status(7))),
        "got {:?}",
        result
    );
    session.close_channel().await;
    session.close_transport().await;
}

// =============================================================================
// Refused requests
// =============================================================================

#[tokio::test]
async fn test_refused_pty_is_pty_failure() {
    let (outcome, bridge) = run_bridge(Script::RefusePty).await;

    assert!(
        matches!(outcome, Outcome::NegotiationError(Error::PtyRequestFailed { .. })),
        "got {:?}",
        outcome
    );
    assert_eq!(bridge.terminal().restore_count(), 0);
}

#[tokio::test]
async fn test_refused_shell_is_shell_failure() {
    let (outcome, _) = run_bridge(Script::RefuseShell).await;

    assert!(
        matches!(outcome, Outcome::NegotiationError(Error::ShellStartFailed { .. })),
        "got {:?}",
        outcome
    );
}
