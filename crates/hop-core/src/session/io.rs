//! Byte pipes between the local terminal and a remote session.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

use crate::{Error, Result};

// =============================================================================
// Cancellation
// =============================================================================

/// Raising side of a one-shot cancellation flag.
///
/// Cheap to clone. Raising it never waits for listeners to notice.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the flag. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn listener(&self) -> CancelListener {
        CancelListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Observing side of a [`CancelSignal`].
#[derive(Debug, Clone)]
pub struct CancelListener {
    rx: watch::Receiver<bool>,
}

impl CancelListener {
    /// Non-blocking check, usable from plain threads.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the flag is raised, or once every signal is dropped.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

// =============================================================================
// Local input
// =============================================================================

/// Raw keystroke chunks read from the local terminal.
///
/// Produced by a reader that owns the matching [`InputFeed`]. Once the
/// cancel signal is raised, [`LocalInput::read`] returns `None` and the
/// reader stops consuming the terminal.
#[derive(Debug)]
pub struct LocalInput {
    rx: mpsc::Receiver<Vec<u8>>,
    cancel: CancelSignal,
    listener: CancelListener,
}

impl LocalInput {
    /// Create a bounded input stream and its producer side.
    pub fn channel(depth: usize) -> (InputFeed, LocalInput) {
        let (tx, rx) = mpsc::channel(depth);
        let cancel = CancelSignal::new();
        let feed = InputFeed {
            tx,
            listener: cancel.listener(),
        };
        let listener = cancel.listener();
        (
            feed,
            LocalInput {
                rx,
                cancel,
                listener,
            },
        )
    }

    /// Handle used to stop this input from another task.
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Next chunk, or `None` on EOF or cancellation.
    pub async fn read(&mut self) -> Option<Vec<u8>> {
        if self.listener.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.listener.cancelled() => None,
            chunk = self.rx.recv() => chunk,
        }
    }
}

/// Producer side of a [`LocalInput`].
#[derive(Debug)]
pub struct InputFeed {
    tx: mpsc::Sender<Vec<u8>>,
    listener: CancelListener,
}

impl InputFeed {
    pub fn is_cancelled(&self) -> bool {
        self.listener.is_cancelled() || self.tx.is_closed()
    }

    /// Push a chunk from a plain thread. Returns false once the consumer is
    /// gone or cancelled.
    pub fn blocking_send(&self, chunk: Vec<u8>) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx.blocking_send(chunk).is_ok()
    }

    /// Push a chunk from async code. Returns false once the consumer is gone
    /// or cancelled.
    pub async fn send(&self, chunk: Vec<u8>) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx.send(chunk).await.is_ok()
    }
}

// =============================================================================
// Remote input
// =============================================================================

/// Writable stream of local bytes headed for the remote channel.
///
/// The remote session owns the receiving end and drops it when the channel
/// closes, after which every write fails with `BrokenPipe`.
#[derive(Debug, Clone)]
pub struct RemoteInput {
    tx: mpsc::Sender<Vec<u8>>,
}

impl RemoteInput {
    pub fn channel(depth: usize) -> (RemoteInput, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(depth);
        (RemoteInput { tx }, rx)
    }

    pub async fn write(&self, data: Vec<u8>) -> Result<()> {
        self.tx.send(data).await.map_err(|_| {
            Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "remote channel closed",
            ))
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// =============================================================================
// Remote output
// =============================================================================

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Local destinations for the remote channel's stdout and stderr.
pub struct RemoteOutput {
    stdout: BoxedWriter,
    stderr: BoxedWriter,
}

impl RemoteOutput {
    pub fn new(
        stdout: impl AsyncWrite + Send + Unpin + 'static,
        stderr: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    /// The process's own stdout and stderr.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdout(), tokio::io::stderr())
    }

    pub async fn write_stdout(&mut self, data: &[u8]) -> Result<()> {
        self.stdout.write_all(data).await?;
        self.stdout.flush().await?;
        Ok(())
    }

    pub async fn write_stderr(&mut self, data: &[u8]) -> Result<()> {
        self.stderr.write_all(data).await?;
        self.stderr.flush().await?;
        Ok(())
    }
}

impl std::fmt::Debug for RemoteOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteOutput").finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
