//! Scripted remote shell for testing without a network.
//!
//! A [`FakeEstablisher`] hands out [`FakeRemote`] sessions that play a list
//! of [`Step`]s: write output, wait for typed input, then exit or drop the
//! connection. Everything the remote receives and every close is recorded.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use hop_core::session::{Establish, RemoteInput, RemoteOutput, RemoteSession};
use hop_core::{ConnectionTarget, Error, RemoteExit, Result, TermSize};

use crate::timeline::{Event, Timeline};

/// One action of a scripted remote shell.
#[derive(Debug, Clone)]
pub enum Step {
    /// Write to the local stdout.
    Stdout(Vec<u8>),
    /// Write to the local stderr.
    Stderr(Vec<u8>),
    /// Block until the received input contains these bytes.
    AwaitInput(Vec<u8>),
    /// Sleep before the next step.
    Pause(Duration),
    /// The shell exits.
    Exit(RemoteExit),
    /// The connection is lost.
    Drop(String),
    /// Never complete.
    Hang,
}

impl Step {
    pub fn stdout(data: impl AsRef<[u8]>) -> Self {
        Step::Stdout(data.as_ref().to_vec())
    }

    pub fn stderr(data: impl AsRef<[u8]>) -> Self {
        Step::Stderr(data.as_ref().to_vec())
    }

    pub fn await_input(data: impl AsRef<[u8]>) -> Self {
        Step::AwaitInput(data.as_ref().to_vec())
    }

    pub fn exit(status: u32) -> Self {
        Step::Exit(RemoteExit::Status(status))
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

/// Channel and transport state shared with the test.
#[derive(Debug, Default)]
struct RemoteLog {
    received: Vec<u8>,
    channel_closes: usize,
    transport_closes: usize,
}

/// Test-side view of what the fake remotes saw.
#[derive(Debug, Clone, Default)]
pub struct RemoteProbe {
    log: Arc<Mutex<RemoteLog>>,
}

impl RemoteProbe {
    /// Every input byte the remote consumed, across sessions.
    pub fn received(&self) -> Vec<u8> {
        self.log.lock().unwrap().received.clone()
    }

    pub fn channel_closes(&self) -> usize {
        self.log.lock().unwrap().channel_closes
    }

    pub fn transport_closes(&self) -> usize {
        self.log.lock().unwrap().transport_closes
    }
}

/// A scripted remote session.
#[derive(Debug)]
pub struct FakeRemote {
    steps: VecDeque<Step>,
    input: RemoteInput,
    input_rx: Option<mpsc::Receiver<Vec<u8>>>,
    seen: Vec<u8>,
    channel_open: bool,
    transport_open: bool,
    probe: RemoteProbe,
    timeline: Timeline,
}

impl FakeRemote {
    pub fn new(steps: Vec<Step>, probe: RemoteProbe, timeline: Timeline) -> Self {
        let (input, input_rx) = RemoteInput::channel(16);
        Self {
            steps: steps.into(),
            input,
            input_rx: Some(input_rx),
            seen: Vec::new(),
            channel_open: true,
            transport_open: true,
            probe,
            timeline,
        }
    }

    fn take_input(&mut self, chunk: Vec<u8>) {
        self.probe
            .log
            .lock()
            .unwrap()
            .received
            .extend_from_slice(&chunk);
        self.seen.extend_from_slice(&chunk);
    }

    fn complete(&self) {
        self.timeline.record(Event::RemoteCompleted);
    }
}

#[async_trait]
impl RemoteSession for FakeRemote {
    fn input(&self) -> RemoteInput {
        self.input.clone()
    }

    async fn wait(&mut self, output: &mut RemoteOutput) -> Result<RemoteExit> {
        while let Some(step) = self.steps.pop_front() {
            match step {
                Step::Stdout(data) => output.write_stdout(&data).await?,
                Step::Stderr(data) => output.write_stderr(&data).await?,
                Step::AwaitInput(pattern) => {
                    while !contains(&self.seen, &pattern) {
                        let Some(rx) = self.input_rx.as_mut() else {
                            return Err(Error::transport("channel already closed"));
                        };
                        let next = rx.recv().await;
                        match next {
                            Some(chunk) => self.take_input(chunk),
                            None => return Err(Error::transport("input stream ended")),
                        }
                    }
                }
                Step::Pause(duration) => tokio::time::sleep(duration).await,
                Step::Exit(exit) => {
                    self.complete();
                    return Ok(exit);
                }
                Step::Drop(message) => {
                    self.complete();
                    return Err(Error::transport(message));
                }
                Step::Hang => std::future::pending::<()>().await,
            }
        }
        self.complete();
        Ok(RemoteExit::Missing)
    }

    async fn close_channel(&mut self) {
        if !self.channel_open {
            return;
        }
        self.channel_open = false;
        // Queued input is discarded and later writes fail.
        self.input_rx = None;
        self.probe.log.lock().unwrap().channel_closes += 1;
        self.timeline.record(Event::ChannelClosed);
    }

    async fn close_transport(&mut self) {
        if !self.transport_open {
            return;
        }
        self.transport_open = false;
        self.probe.log.lock().unwrap().transport_closes += 1;
        self.timeline.record(Event::TransportClosed);
    }
}

type FailureFn = Box<dyn Fn() -> Error + Send + Sync>;

/// Hands out [`FakeRemote`]s, or fails establishment on demand.
pub struct FakeEstablisher {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    failure: Option<FailureFn>,
    probe: RemoteProbe,
    timeline: Timeline,
    sizes: Mutex<Vec<TermSize>>,
    targets: Mutex<Vec<String>>,
}

impl FakeEstablisher {
    /// One session playing `steps`.
    pub fn new(steps: Vec<Step>, timeline: Timeline) -> Self {
        Self::with_scripts(vec![steps], timeline)
    }

    /// Sessions play the scripts in order; once they run out a session
    /// completes immediately.
    pub fn with_scripts(scripts: Vec<Vec<Step>>, timeline: Timeline) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            failure: None,
            probe: RemoteProbe::default(),
            timeline,
            sizes: Mutex::new(Vec::new()),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Every establishment fails with the error `failure` builds.
    pub fn failing(
        failure: impl Fn() -> Error + Send + Sync + 'static,
        timeline: Timeline,
    ) -> Self {
        let mut establisher = Self::with_scripts(Vec::new(), timeline);
        establisher.failure = Some(Box::new(failure));
        establisher
    }

    pub fn probe(&self) -> RemoteProbe {
        self.probe.clone()
    }

    /// PTY sizes requested so far.
    pub fn sizes(&self) -> Vec<TermSize> {
        self.sizes.lock().unwrap().clone()
    }

    /// Addresses dialed so far.
    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

impl std::fmt::Debug for FakeEstablisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeEstablisher")
            .field("failing", &self.failure.is_some())
            .finish()
    }
}

#[async_trait]
impl Establish for FakeEstablisher {
    type Session = FakeRemote;

    async fn establish(
        &self,
        target: &ConnectionTarget,
        size: TermSize,
        _timeout: Duration,
    ) -> Result<FakeRemote> {
        self.targets.lock().unwrap().push(target.address());
        self.sizes.lock().unwrap().push(size);
        if let Some(failure) = &self.failure {
            self.timeline.record(Event::EstablishFailed);
            return Err(failure());
        }
        let steps = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        self.timeline.record(Event::Established);
        Ok(FakeRemote::new(steps, self.probe.clone(), self.timeline.clone()))
    }
}

// =============================================================================
// Tests
// =============================================================================
