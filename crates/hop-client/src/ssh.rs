//! SSH transport and shell session.
//!
//! Establishes an interactive shell over russh:
//! 1. Dial the target within the connect timeout
//! 2. Authenticate with the target's single credential
//! 3. Open a session channel
//! 4. Request a PTY sized to the local terminal
//! 5. Start the login shell
//!
//! Every step maps its failure to its own error variant and nothing is
//! retried. On failure the partially built connection is closed before
//! returning.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Msg};
use russh::{Channel, ChannelMsg, Disconnect, Pty, Sig};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use hop_core::constants::{
    INPUT_QUEUE_DEPTH, KEEPALIVE_INTERVAL, KEEPALIVE_MAX, PTY_LINE_SPEED, TEARDOWN_TIMEOUT,
};
use hop_core::session::{Establish, RemoteInput, RemoteOutput, RemoteSession};
use hop_core::{AuthMethod, ConnectionTarget, Error, RemoteExit, Result, TermSize};

/// SSH client handler.
struct SshHandler;

#[async_trait]
impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh_keys::key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        // No known_hosts support; every key is accepted.
        warn!(
            fingerprint = %server_public_key.fingerprint(),
            "accepting unverified host key"
        );
        Ok(true)
    }
}

/// Opens shells over russh.
#[derive(Debug, Clone)]
pub struct SshEstablisher {
    keepalive_interval: Option<Duration>,
    keepalive_max: usize,
}

impl Default for SshEstablisher {
    fn default() -> Self {
        Self {
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            keepalive_max: KEEPALIVE_MAX,
        }
    }
}

impl SshEstablisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable transport keepalives.
    pub fn without_keepalive(mut self) -> Self {
        self.keepalive_interval = None;
        self
    }

    fn client_config(&self) -> Arc<client::Config> {
        Arc::new(client::Config {
            // An idle shell is not a dead one; keepalives detect loss instead.
            inactivity_timeout: None,
            keepalive_interval: self.keepalive_interval,
            keepalive_max: self.keepalive_max,
            ..Default::default()
        })
    }
}

#[async_trait]
impl Establish for SshEstablisher {
    type Session = SshSession;

    async fn establish(
        &self,
        target: &ConnectionTarget,
        size: TermSize,
        timeout: Duration,
    ) -> Result<SshSession> {
        // Checked before any socket is opened.
        let auth = target.validate_auth()?.clone();
        let addr = target.address();
        info!(addr = %addr, user = target.user(), auth = auth.kind(), "Connecting");

        let mut handle = tokio::time::timeout(
            timeout,
            client::connect(self.client_config(), addr.as_str(), SshHandler),
        )
        .await
        .map_err(|_| Error::dial(format!("{}: timed out after {:?}", addr, timeout)))?
        .map_err(|e| Error::dial(format!("{}: {}", addr, e)))?;
        debug!("SSH connection established");

        if let Err(e) = authenticate(&mut handle, target.user(), &auth, timeout).await {
            disconnect(handle).await;
            return Err(e);
        }
        debug!(user = target.user(), "SSH authentication succeeded");

        let channel = match open_shell(&handle, target.term_type(), size, timeout).await {
            Ok(channel) => channel,
            Err(e) => {
                disconnect(handle).await;
                return Err(e);
            }
        };
        info!(addr = %addr, term = target.term_type(), size = %size, "Shell started");

        let (input, input_rx) = RemoteInput::channel(INPUT_QUEUE_DEPTH);
        Ok(SshSession {
            handle: Some(handle),
            channel: Some(channel),
            input,
            input_rx: Some(input_rx),
        })
    }
}

async fn authenticate(
    handle: &mut client::Handle<SshHandler>,
    user: &str,
    auth: &AuthMethod,
    timeout: Duration,
) -> Result<()> {
    let attempt = async {
        match auth {
            AuthMethod::PrivateKey(key) => handle.authenticate_publickey(user, key.clone()).await,
            AuthMethod::Password(password) => {
                handle.authenticate_password(user, password.as_str()).await
            }
        }
    };

    let accepted = tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| Error::auth(format!("timed out after {:?}", timeout)))?
        .map_err(|e| Error::auth(e.to_string()))?;

    if accepted {
        Ok(())
    } else {
        Err(Error::auth(format!(
            "{} authentication rejected for user {}",
            auth.kind(),
            user
        )))
    }
}

async fn open_shell(
    handle: &client::Handle<SshHandler>,
    term: &str,
    size: TermSize,
    timeout: Duration,
) -> Result<Channel<Msg>> {
    let mut channel = tokio::time::timeout(timeout, handle.channel_open_session())
        .await
        .map_err(|_| Error::ChannelFailed {
            message: format!("timed out after {:?}", timeout),
        })?
        .map_err(|e| Error::ChannelFailed {
            message: e.to_string(),
        })?;

    if let Err(e) = request_pty(&mut channel, term, size, timeout).await {
        abandon_channel(&channel).await;
        return Err(e);
    }
    if let Err(e) = start_shell(&mut channel, timeout).await {
        abandon_channel(&channel).await;
        return Err(e);
    }
    Ok(channel)
}

async fn abandon_channel(channel: &Channel<Msg>) {
    if let Err(e) = channel.close().await {
        debug!(error = %e, "closing refused channel failed");
    }
}

async fn request_pty(
    channel: &mut Channel<Msg>,
    term: &str,
    size: TermSize,
    timeout: Duration,
) -> Result<()> {
    let pty_failed = |message: String| Error::PtyRequestFailed { message };
    let modes = [
        (Pty::ECHO, 1),
        (Pty::TTY_OP_ISPEED, PTY_LINE_SPEED),
        (Pty::TTY_OP_OSPEED, PTY_LINE_SPEED),
    ];

    channel
        .request_pty(true, term, size.cols as u32, size.rows as u32, 0, 0, &modes)
        .await
        .map_err(|e| pty_failed(e.to_string()))?;

    match tokio::time::timeout(timeout, await_reply(channel)).await {
        Ok(Ok(true)) => Ok(()),
        Ok(Ok(false)) => Err(pty_failed("server refused the PTY request".into())),
        Ok(Err(e)) => Err(pty_failed(e)),
        Err(_) => Err(pty_failed(format!("timed out after {:?}", timeout))),
    }
}

async fn start_shell(channel: &mut Channel<Msg>, timeout: Duration) -> Result<()> {
    let shell_failed = |message: String| Error::ShellStartFailed { message };

    channel
        .request_shell(true)
        .await
        .map_err(|e| shell_failed(e.to_string()))?;

    match tokio::time::timeout(timeout, await_reply(channel)).await {
        Ok(Ok(true)) => Ok(()),
        Ok(Ok(false)) => Err(shell_failed("server refused to start a shell".into())),
        Ok(Err(e)) => Err(shell_failed(e)),
        Err(_) => Err(shell_failed(format!("timed out after {:?}", timeout))),
    }
}

/// Wait for the server's answer to a want-reply channel request.
async fn await_reply(channel: &mut Channel<Msg>) -> std::result::Result<bool, String> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(true),
            Some(ChannelMsg::Failure) => return Ok(false),
            Some(ChannelMsg::Close) | None => return Err("channel closed by server".into()),
            Some(other) => debug!(msg = ?other, "ignoring message while awaiting reply"),
        }
    }
}

/// Bare signal name as sent by the server, e.g. `KILL`.
fn signal_name(sig: &Sig) -> String {
    match sig {
        Sig::Custom(name) => name.clone(),
        other => format!("{:?}", other),
    }
}

async fn next_input(rx: &mut Option<mpsc::Receiver<Vec<u8>>>) -> Option<Vec<u8>> {
    match rx {
        Some(rx) => rx.recv().await,
        None => None,
    }
}

async fn disconnect(handle: client::Handle<SshHandler>) {
    let result = tokio::time::timeout(
        TEARDOWN_TIMEOUT,
        handle.disconnect(Disconnect::ByApplication, "", "en"),
    )
    .await;
    match result {
        Ok(Ok(())) => debug!("SSH transport closed"),
        Ok(Err(e)) => debug!(error = %e, "SSH disconnect failed"),
        Err(_) => debug!("SSH disconnect timed out"),
    }
}

/// A live russh shell channel and its transport.
pub struct SshSession {
    handle: Option<client::Handle<SshHandler>>,
    channel: Option<Channel<Msg>>,
    input: RemoteInput,
    input_rx: Option<mpsc::Receiver<Vec<u8>>>,
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("transport_open", &self.handle.is_some())
            .field("channel_open", &self.channel.is_some())
            .finish()
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    fn input(&self) -> RemoteInput {
        self.input.clone()
    }

    async fn wait(&mut self, output: &mut RemoteOutput) -> Result<RemoteExit> {
        let Self {
            channel, input_rx, ..
        } = self;
        let channel = channel
            .as_mut()
            .ok_or_else(|| Error::transport("channel already closed"))?;

        let mut exit = None;
        let mut closed = false;
        let mut forwarding = input_rx.is_some();

        loop {
            tokio::select! {
                msg = channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => output.write_stdout(&data).await?,
                    Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                        output.write_stderr(&data).await?
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        debug!(exit_status, "remote exit status");
                        exit = Some(RemoteExit::Status(exit_status));
                    }
                    Some(ChannelMsg::ExitSignal { signal_name: sig, .. }) => {
                        debug!(signal = ?sig, "remote exit signal");
                        exit = Some(RemoteExit::Signal(signal_name(&sig)));
                    }
                    Some(ChannelMsg::Eof) => debug!("remote EOF"),
                    Some(ChannelMsg::Close) => {
                        closed = true;
                        break;
                    }
                    Some(_) => {}
                    None => break,
                },
                Some(data) = next_input(input_rx), if forwarding => {
                    if let Err(e) = channel.data(&data[..]).await {
                        // Completion decides the outcome; input is just dropped.
                        debug!(error = %e, "forward to remote failed, dropping further input");
                        forwarding = false;
                        *input_rx = None;
                    }
                }
            }
        }

        match (exit, closed) {
            (Some(exit), _) => Ok(exit),
            (None, true) => Ok(RemoteExit::Missing),
            (None, false) => Err(Error::transport(
                "connection lost before the remote shell exited",
            )),
        }
    }

    async fn close_channel(&mut self) {
        // Queued and future input is refused from here on.
        self.input_rx = None;
        if let Some(channel) = self.channel.take() {
            match tokio::time::timeout(TEARDOWN_TIMEOUT, channel.close()).await {
                Ok(Ok(())) => debug!("SSH channel closed"),
                Ok(Err(e)) => debug!(error = %e, "SSH channel close failed"),
                Err(_) => debug!("SSH channel close timed out"),
            }
        }
    }

    async fn close_transport(&mut self) {
        if let Some(handle) = self.handle.take() {
            disconnect(handle).await;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
