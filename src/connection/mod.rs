// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resilient WebSocket connection manager for edge devices.
//!
//! The manager owns the transport handle exclusively; producers and the
//! dispatcher only ever touch the command and outbound queues. It runs an
//! outer session-supervision loop (slow backoff, fatal on exhaustion)
//! wrapping an inner transport-establishment loop (fast backoff) and two
//! steady-state pumps:
//!
//! - inbound: transport frame → decode → command queue
//! - outbound: outbound queue → encode → transport
//!
//! Any pump error tears down the session and the outer loop decides
//! whether to retry. A message that was dequeued but not delivered is
//! stashed and re-sent on the next session rather than dropped.
//!
//! # Examples
//!
//! ```no_run
//! use telelink::connection::{ConnectionConfig, ConnectionManager};
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main]
//! # async fn main() -> telelink::Result<()> {
//! let manager = ConnectionManager::new(ConnectionConfig::new("ws://hub.local:8765"));
//! let (command_tx, _command_rx) = mpsc::unbounded_channel();
//! let (_outbound_tx, outbound_rx) = mpsc::unbounded_channel();
//!
//! // Runs until clean disconnect or session-retry exhaustion (fatal).
//! manager.run(command_tx, outbound_rx).await?;
//! # Ok(())
//! # }
//! ```

mod retry;

pub use retry::RetryPolicy;

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream, connect_async, connect_async_tls_with_config,
};

use crate::error::{Error, TransportError};
use crate::message::Message;

/// Concrete WebSocket stream type used by the manager.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state of the manager, observable via [`ConnectionManager::watch_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport is open.
    Disconnected,
    /// A transport handshake is in progress.
    Connecting,
    /// The transport is open and the pumps are running.
    Connected,
    /// A clean shutdown is draining queued messages.
    Closing,
    /// Session retries were exhausted; the manager will not reconnect.
    Failed,
}

impl ConnectionState {
    /// Returns true if the transport is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true if the manager has given up reconnecting.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Configuration for a [`ConnectionManager`].
#[derive(Clone)]
pub struct ConnectionConfig {
    /// The hub URI (e.g. `ws://hub.local:8765` or `wss://hub.local:8765`).
    pub uri: String,
    /// Session-level retry policy (fatal on exhaustion).
    pub session_retry: RetryPolicy,
    /// Connect-level retry policy (propagates to the session level).
    pub connect_retry: RetryPolicy,
    /// Delay before re-checking the transport when a queued message cannot
    /// be sent yet.
    pub resend_delay: Duration,
    /// Grace period for draining queued messages on clean shutdown.
    pub shutdown_grace: Duration,
    /// TLS connector supplied by the host when mutual TLS is enabled.
    ///
    /// Certificate loading is the host's concern; the manager only applies
    /// the prebuilt connector during the handshake.
    pub tls: Option<Connector>,
}

impl ConnectionConfig {
    /// Creates a configuration with default retry policies.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            session_retry: RetryPolicy::session(),
            connect_retry: RetryPolicy::connect(),
            resend_delay: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(5),
            tls: None,
        }
    }

    /// Sets the session-level retry policy.
    #[must_use]
    pub fn with_session_retry(mut self, policy: RetryPolicy) -> Self {
        self.session_retry = policy;
        self
    }

    /// Sets the connect-level retry policy.
    #[must_use]
    pub fn with_connect_retry(mut self, policy: RetryPolicy) -> Self {
        self.connect_retry = policy;
        self
    }

    /// Sets the outbound re-check delay.
    #[must_use]
    pub fn with_resend_delay(mut self, delay: Duration) -> Self {
        self.resend_delay = delay;
        self
    }

    /// Sets the clean-shutdown drain grace period.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Enables TLS with a host-provided connector.
    #[must_use]
    pub fn with_tls_connector(mut self, connector: Connector) -> Self {
        self.tls = Some(connector);
        self
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("uri", &self.uri)
            .field("session_retry", &self.session_retry)
            .field("connect_retry", &self.connect_retry)
            .field("resend_delay", &self.resend_delay)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

/// Outcome of one connected session.
enum SessionEnd {
    /// A pump raised; the outer loop decides whether to retry.
    Pump(Result<(), Error>),
    /// A clean shutdown was requested.
    Shutdown,
}

/// Supervised WebSocket connection to the hub.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state_tx: watch::Sender<ConnectionState>,
    connected: AtomicBool,
    /// A dequeued message that could not be delivered yet.
    pending: Mutex<Option<Message>>,
    shutdown_tx: watch::Sender<bool>,
}

impl ConnectionManager {
    /// Creates a new manager in the disconnected state.
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            state_tx,
            connected: AtomicBool::new(false),
            pending: Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    /// Returns a watcher for connection state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Returns true if the transport is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Requests a clean disconnect.
    ///
    /// Idempotent: the first call triggers exactly one close side effect
    /// and returns true; later calls are no-ops returning false. Safe to
    /// call whether or not a transport is open.
    pub fn disconnect(&self) -> bool {
        !self.shutdown_tx.send_replace(true)
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Resolves when a clean disconnect has been requested.
    async fn shutdown_signal(&self) {
        let mut rx = self.shutdown_tx.subscribe();
        // The sender lives as long as self, so this cannot fail.
        let _ = rx.wait_for(|requested| *requested).await;
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn take_pending(&self) -> Option<Message> {
        self.pending.lock().map_or(None, |mut slot| slot.take())
    }

    fn stash_pending(&self, message: Message) {
        if let Ok(mut slot) = self.pending.lock() {
            *slot = Some(message);
        }
    }

    /// Runs the manager until a clean disconnect or fatal failure.
    ///
    /// Each session attempt establishes the transport (inner retry loop)
    /// and runs the pumps until one raises. Recoverable errors are retried
    /// with exponential backoff; exhaustion of the session policy returns
    /// [`Error::SessionExhausted`], which the hosting process must treat as
    /// a stop condition.
    ///
    /// # Errors
    ///
    /// Returns `Error::SessionExhausted` when all session retries fail.
    pub async fn run(
        &self,
        commands: mpsc::UnboundedSender<Message>,
        mut outbound: mpsc::UnboundedReceiver<Message>,
    ) -> Result<(), Error> {
        let mut retries = 0u32;
        loop {
            if self.is_shutting_down() {
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            match self.run_session(&commands, &mut outbound).await {
                Ok(()) => {
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
                Err(err) => {
                    self.connected.store(false, Ordering::Release);
                    self.set_state(ConnectionState::Disconnected);

                    if self.config.session_retry.should_retry(retries) {
                        let delay = self.config.session_retry.delay(retries);
                        tracing::warn!(
                            uri = %self.config.uri,
                            error = %err,
                            retry = retries,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "session failed, backing off before retry"
                        );
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            () = self.shutdown_signal() => {
                                self.set_state(ConnectionState::Disconnected);
                                return Ok(());
                            }
                        }
                        retries += 1;
                    } else {
                        let attempts = retries + 1;
                        tracing::error!(
                            uri = %self.config.uri,
                            error = %err,
                            attempts,
                            "session retries exhausted, giving up"
                        );
                        self.set_state(ConnectionState::Failed);
                        return Err(Error::SessionExhausted { attempts });
                    }
                }
            }
        }
    }

    /// Runs one session: establish, pump until error or shutdown.
    async fn run_session(
        &self,
        commands: &mpsc::UnboundedSender<Message>,
        outbound: &mut mpsc::UnboundedReceiver<Message>,
    ) -> Result<(), Error> {
        let stream = self.establish().await?;
        self.connected.store(true, Ordering::Release);
        self.set_state(ConnectionState::Connected);

        let (mut write, mut read) = stream.split();

        let end = tokio::select! {
            result = Self::pump_inbound(&mut read, commands) => SessionEnd::Pump(result),
            result = self.pump_outbound(&mut write, outbound) => SessionEnd::Pump(result),
            () = self.shutdown_signal() => SessionEnd::Shutdown,
        };

        match end {
            SessionEnd::Shutdown => {
                self.set_state(ConnectionState::Closing);
                self.drain_and_close(&mut write, outbound).await;
                self.connected.store(false, Ordering::Release);
                Ok(())
            }
            SessionEnd::Pump(result) => {
                self.connected.store(false, Ordering::Release);
                result
            }
        }
    }

    /// Inner transport-establishment loop with fast backoff.
    async fn establish(&self) -> Result<WsStream, Error> {
        let mut retries = 0u32;
        loop {
            self.set_state(ConnectionState::Connecting);
            tracing::info!(uri = %self.config.uri, "connecting to hub");

            match self.connect_once().await {
                Ok(stream) => {
                    tracing::info!(uri = %self.config.uri, "transport established");
                    return Ok(stream);
                }
                Err(err) => {
                    if self.config.connect_retry.should_retry(retries) {
                        let delay = self.config.connect_retry.delay(retries);
                        tracing::warn!(
                            uri = %self.config.uri,
                            error = %err,
                            retry = retries,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "connect failed, backing off before retry"
                        );
                        tokio::time::sleep(delay).await;
                        retries += 1;
                    } else {
                        tracing::error!(
                            uri = %self.config.uri,
                            error = %err,
                            attempts = retries + 1,
                            "connect attempts exhausted"
                        );
                        return Err(err.into());
                    }
                }
            }
        }
    }

    async fn connect_once(&self) -> Result<WsStream, TransportError> {
        let result = match &self.config.tls {
            Some(connector) => {
                connect_async_tls_with_config(
                    self.config.uri.as_str(),
                    None,
                    false,
                    Some(connector.clone()),
                )
                .await
            }
            None => connect_async(self.config.uri.as_str()).await,
        };

        let (stream, _response) = result.map_err(TransportError::Connect)?;
        Ok(stream)
    }

    /// Moves complete frames from the transport onto the command queue.
    ///
    /// Undecodable payloads are dropped with a warning; the connection
    /// stays up. A closed transport surfaces as a recoverable error.
    async fn pump_inbound(
        read: &mut SplitStream<WsStream>,
        commands: &mpsc::UnboundedSender<Message>,
    ) -> Result<(), Error> {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => match Message::decode(&text) {
                    Ok(message) => {
                        tracing::debug!(kind = message.kind(), "message received");
                        if commands.send(message).is_err() {
                            return Err(TransportError::ChannelClosed("command queue").into());
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, payload = %text, "dropping undecodable message");
                    }
                },
                Ok(WsMessage::Close(_)) => return Err(TransportError::Closed.into()),
                // Pings are answered by the transport layer; binary frames
                // are not part of the protocol.
                Ok(_) => {}
                Err(err) => return Err(TransportError::Receive(err).into()),
            }
        }
        Err(TransportError::Closed.into())
    }

    /// Moves messages from the outbound queue onto the transport.
    ///
    /// If the transport is not currently connected, the dequeued message is
    /// stashed and re-checked after `resend_delay` so reconnection is
    /// observed promptly without dropping the item.
    async fn pump_outbound(
        &self,
        write: &mut SplitSink<WsStream, WsMessage>,
        outbound: &mut mpsc::UnboundedReceiver<Message>,
    ) -> Result<(), Error> {
        loop {
            let message = match self.take_pending() {
                Some(message) => message,
                None => outbound
                    .recv()
                    .await
                    .ok_or(TransportError::ChannelClosed("outbound queue"))?,
            };

            if !self.is_connected() {
                self.stash_pending(message);
                tokio::time::sleep(self.config.resend_delay).await;
                continue;
            }

            let text = match message.encode() {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(error = %err, "dropping unencodable message");
                    continue;
                }
            };

            if let Err(err) = write.send(WsMessage::Text(text)).await {
                self.stash_pending(message);
                return Err(TransportError::Send(err).into());
            }
            tracing::debug!(kind = message.kind(), "message sent");
        }
    }

    /// Drains queued outbound items within the grace period, then closes.
    async fn drain_and_close(
        &self,
        write: &mut SplitSink<WsStream, WsMessage>,
        outbound: &mut mpsc::UnboundedReceiver<Message>,
    ) {
        let drain = async {
            if let Some(message) = self.take_pending()
                && let Ok(text) = message.encode()
                && write.send(WsMessage::Text(text)).await.is_err()
            {
                return;
            }
            while let Ok(message) = outbound.try_recv() {
                match message.encode() {
                    Ok(text) => {
                        if write.send(WsMessage::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "dropping unencodable message"),
                }
            }
        };

        if tokio::time::timeout(self.config.shutdown_grace, drain)
            .await
            .is_err()
        {
            tracing::warn!(
                grace_ms = u64::try_from(self.config.shutdown_grace.as_millis()).unwrap_or(u64::MAX),
                "shutdown grace period elapsed with items still queued"
            );
        }

        if let Err(err) = write.close().await {
            tracing::debug!(error = %err, "transport already closed");
        }
        tracing::info!(uri = %self.config.uri, "disconnected from hub");
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("uri", &self.config.uri)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
