//! Bidirectional relay between the local terminal and a remote shell.
//!
//! Two concurrent activities run for the length of a session:
//! - forward: local keystrokes to the remote channel, in a spawned task
//! - completion: remote stdout/stderr to the local writers, driven by
//!   [`RemoteSession::wait`] on the caller's task
//!
//! Completion decides when the session is over. Forward is cancelled when it
//! is, and is never awaited: a reader blocked on local input must not hold up
//! teardown.

use std::io;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use hop_core::session::{CancelListener, CancelSignal, LocalInput, RemoteInput, RemoteOutput, RemoteSession};
use hop_core::{Error, Outcome, RemoteExit, Result};

/// Handle to a running forward activity.
#[derive(Debug)]
pub struct Forwarder {
    cancel: CancelSignal,
    task: JoinHandle<u64>,
}

impl Forwarder {
    /// Start copying `input` into `sink` until input ends, the sink closes,
    /// or the forwarder is cancelled.
    pub fn spawn(input: LocalInput, sink: RemoteInput) -> Self {
        let cancel = input.cancel_signal();
        let task = tokio::spawn(forward(input, sink));
        Self { cancel, task }
    }

    /// Stop consuming local input. Does not wait for the task to finish.
    pub fn cancel(self) {
        self.cancel.cancel();
        debug!(finished = self.task.is_finished(), "forward activity cancelled");
    }
}

async fn forward(mut input: LocalInput, sink: RemoteInput) -> u64 {
    let mut forwarded = 0u64;
    while let Some(chunk) = input.read().await {
        if chunk.is_empty() {
            continue;
        }
        let len = chunk.len() as u64;
        if let Err(e) = sink.write(chunk).await {
            // The remote side is closing; completion reports why.
            debug!(error = %e, "forward write failed, stopping");
            break;
        }
        forwarded += len;
        trace!(len, "forwarded local input");
    }
    debug!(bytes = forwarded, "forward activity finished");
    forwarded
}

/// Wait for the remote shell to finish, or for `shutdown` to fire.
async fn completion<S: RemoteSession + ?Sized>(
    session: &mut S,
    output: &mut RemoteOutput,
    shutdown: Option<&mut CancelListener>,
) -> Result<RemoteExit> {
    match shutdown {
        Some(shutdown) => tokio::select! {
            result = session.wait(output) => result,
            _ = shutdown.cancelled() => Err(Error::Io(io::Error::new(
                io::ErrorKind::Interrupted,
                "interrupted by signal",
            ))),
        },
        None => session.wait(output).await,
    }
}

/// Run both activities until the remote side completes and classify the
/// result.
///
/// On return the forward activity has been cancelled; closing the channel
/// and transport is left to the caller.
pub async fn relay<S: RemoteSession + ?Sized>(
    session: &mut S,
    input: LocalInput,
    output: &mut RemoteOutput,
    shutdown: Option<&mut CancelListener>,
) -> Outcome {
    let forwarder = Forwarder::spawn(input, session.input());
    let result = completion(session, output, shutdown).await;
    forwarder.cancel();

    match &result {
        Ok(exit) => debug!(exit = %exit, "remote side completed"),
        Err(e) => debug!(error = %e, "relay ended with error"),
    }
    Outcome::from_completion(result)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn forward_copies_chunks_in_order() {
        let (feed, input) = LocalInput::channel(8);
        let (sink, mut rx) = RemoteInput::channel(8);
        let forwarder = Forwarder::spawn(input, sink);

        assert!(feed.send(b"ls".to_vec()).await);
        assert!(feed.send(b"\r".to_vec()).await);

        assert_eq!(rx.recv().await.unwrap(), b"ls");
        assert_eq!(rx.recv().await.unwrap(), b"\r");
        forwarder.cancel();
    }

    #[tokio::test]
    async fn cancelled_forwarder_stops_consuming() {
        let (feed, input) = LocalInput::channel(8);
        let (sink, mut rx) = RemoteInput::channel(8);
        let forwarder = Forwarder::spawn(input, sink);

        forwarder.cancel();
        assert!(feed.is_cancelled());
        feed.send(b"late".to_vec()).await;

        let got = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(!matches!(got, Ok(Some(_))));
    }

    #[tokio::test]
    async fn forward_stops_when_remote_closes() {
        let (feed, input) = LocalInput::channel(8);
        let (sink, rx) = RemoteInput::channel(8);
        drop(rx);

        let task = tokio::spawn(forward(input, sink));
        feed.send(b"x".to_vec()).await;
        let forwarded = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(forwarded, 0);
    }
}
