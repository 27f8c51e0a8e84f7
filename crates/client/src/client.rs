// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The reconnecting pub/sub transport client.
//!
//! A [`TransportClient`] is a cheap handle in front of one driver task. The
//! driver exclusively owns the socket and the subscription map; handle
//! methods are synchronous and only enqueue commands. The driver loop
//! polls, in priority order:
//!
//! 1. cancellation (handle dropped or [`TransportClient::shutdown`])
//! 2. commands from the handle
//! 3. the pending retry deadline
//! 4. inbound frames, while connected
//!
//! Commands win over the retry timer, so a `disconnect()` issued before the
//! deadline always cancels the retry. Commands are also read while a
//! handshake is in flight: a `disconnect()` there abandons the attempt.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parley_core::{Command, Frame};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionState, SharedConnectionState};
use crate::credential::CredentialSource;
use crate::error::ClientError;
use crate::event::{ClientEvent, EventReceiver, EventSender, FrameHandler, InboundFrame};
use crate::reconnect::{ReconnectPolicy, ReconnectState};
use crate::transport::{
    ConnectRequest, Transport, TransportError, TransportResult, WebSocketTransport,
};

/// Default bound on one connect plus handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for a [`TransportClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// `ws://` or `wss://` URL. `None` makes every `connect()` fail.
    pub endpoint: Option<String>,
    pub policy: ReconnectPolicy,
    pub connect_timeout: Duration,
    /// Also send the token as an `access_token` query parameter.
    pub query_token: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            endpoint: None,
            policy: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            query_token: false,
        }
    }
}

impl ClientOptions {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }
}

enum DriverCommand {
    Connect,
    Subscribe {
        topic: String,
        handler: FrameHandler,
    },
    Unsubscribe {
        topic: String,
    },
    Publish {
        destination: String,
        body: String,
    },
    Disconnect,
}

/// Handle to one logical connection.
///
/// Dropping the handle cancels the driver, which unsubscribes, closes the
/// socket and clears any pending retry.
pub struct TransportClient {
    commands: mpsc::UnboundedSender<DriverCommand>,
    events: EventSender,
    shared: Arc<SharedConnectionState>,
    credential: Arc<dyn CredentialSource>,
    endpoint: Option<String>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TransportClient {
    /// Creates a client over a WebSocket transport.
    ///
    /// Must be called inside a Tokio runtime; the driver task is spawned
    /// immediately but stays idle until `connect()`.
    pub fn new(
        options: ClientOptions,
        credential: Arc<dyn CredentialSource>,
    ) -> (Self, EventReceiver) {
        Self::with_transport(options, credential, WebSocketTransport::new())
    }

    /// Creates a client over a caller-supplied transport.
    pub fn with_transport<T: Transport + 'static>(
        options: ClientOptions,
        credential: Arc<dyn CredentialSource>,
        transport: T,
    ) -> (Self, EventReceiver) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SharedConnectionState::new());
        let cancel = CancellationToken::new();
        let endpoint = options.endpoint.clone().filter(|e| !e.trim().is_empty());

        let driver = Driver {
            transport: Box::new(transport),
            endpoint: endpoint.clone().unwrap_or_default(),
            policy: options.policy,
            connect_timeout: options.connect_timeout,
            query_token: options.query_token,
            credential: Arc::clone(&credential),
            shared: Arc::clone(&shared),
            events: event_tx.clone(),
            commands: command_rx,
            cancel: cancel.clone(),
            state: ConnectionState::Disconnected,
            subscriptions: BTreeMap::new(),
            next_subscription: 0,
            reconnect: ReconnectState::new(),
            retry_at: None,
        };
        let task = tokio::spawn(driver.run());

        let client = TransportClient {
            commands: command_tx,
            events: event_tx,
            shared,
            credential,
            endpoint,
            cancel,
            task: Some(task),
        };
        (client, event_rx)
    }

    /// Starts connecting.
    ///
    /// With no endpoint or no credential this reports a configuration error
    /// and opens nothing. While a connection is active this is a no-op.
    pub fn connect(&self) {
        if self.endpoint.is_none() {
            warn!("connect: no endpoint configured");
            self.emit(ClientEvent::Error(ClientError::MissingEndpoint));
            return;
        }
        if self.credential.token().is_none() {
            warn!("connect: no credential available");
            self.emit(ClientEvent::Error(ClientError::MissingCredential));
            return;
        }
        if !self.shared.try_begin_connect() {
            debug!("connect ignored: already {}", self.shared.get());
            return;
        }
        self.send_command(DriverCommand::Connect);
    }

    /// Registers `handler` for `topic`.
    ///
    /// Returns `false` when not connected. Subscribing to a topic that is
    /// already active keeps the existing handler.
    pub fn subscribe(
        &self,
        topic: impl Into<String>,
        handler: impl FnMut(InboundFrame) + Send + 'static,
    ) -> bool {
        let topic = topic.into();
        if !self.shared.is_connected() {
            warn!("cannot subscribe to {}: not connected", topic);
            return false;
        }
        self.send_command(DriverCommand::Subscribe {
            topic,
            handler: Box::new(handler),
        })
    }

    /// Releases `topic`. Unknown topics are ignored.
    pub fn unsubscribe(&self, topic: impl Into<String>) {
        self.send_command(DriverCommand::Unsubscribe {
            topic: topic.into(),
        });
    }

    /// Serializes `payload` to JSON and sends it to `destination`.
    ///
    /// Returns `false` when not connected or when serialization fails.
    pub fn publish<P: Serialize + ?Sized>(&self, destination: &str, payload: &P) -> bool {
        if !self.shared.is_connected() {
            warn!("cannot publish to {}: not connected", destination);
            return false;
        }
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!("cannot publish to {}: {}", destination, e);
                return false;
            }
        };
        self.send_command(DriverCommand::Publish {
            destination: destination.to_string(),
            body,
        })
    }

    /// Unsubscribes everything, closes the socket and cancels any retry.
    ///
    /// Calling this when already disconnected does nothing.
    pub fn disconnect(&self) {
        if self.shared.get() == ConnectionState::Disconnected {
            debug!("disconnect ignored: already disconnected");
            return;
        }
        self.shared.set(ConnectionState::Disconnected);
        self.send_command(DriverCommand::Disconnect);
    }

    /// Stops the driver and waits for it to finish its teardown.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("transport driver ended abnormally: {}", e);
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.get()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn subscription_count(&self) -> u32 {
        self.shared.subscription_count()
    }

    pub fn status_string(&self) -> String {
        self.shared.status_string()
    }

    /// Returns a sender into this client's event stream.
    ///
    /// Subscription handlers use it to surface routed messages.
    pub fn event_sender(&self) -> EventSender {
        self.events.clone()
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }

    fn send_command(&self, command: DriverCommand) -> bool {
        if self.commands.send(command).is_err() {
            warn!("transport driver is not running");
            return false;
        }
        true
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Subscription {
    id: String,
    handler: FrameHandler,
}

/// Task that owns the socket.
struct Driver {
    transport: Box<dyn Transport>,
    endpoint: String,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    query_token: bool,
    credential: Arc<dyn CredentialSource>,
    shared: Arc<SharedConnectionState>,
    events: EventSender,
    commands: mpsc::UnboundedReceiver<DriverCommand>,
    cancel: CancellationToken,
    state: ConnectionState,
    /// Keyed by topic; at most one subscription per topic.
    subscriptions: BTreeMap<String, Subscription>,
    next_subscription: u64,
    reconnect: ReconnectState,
    retry_at: Option<Instant>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let connected = self.state == ConnectionState::Connected;
            let retry_at = self.retry_at;

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("transport driver cancelled");
                    self.disconnect().await;
                    break;
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.disconnect().await;
                        break;
                    }
                },

                _ = tokio::time::sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    self.retry_at = None;
                    self.attempt_connect().await;
                }

                inbound = self.transport.recv(), if connected => self.handle_inbound(inbound).await,
            }
        }
    }

    async fn handle_command(&mut self, command: DriverCommand) {
        match command {
            DriverCommand::Connect => {
                if self.state.is_active() {
                    // The handle may have raced a transition; restore ours.
                    self.shared.set(self.state);
                    return;
                }
                self.reconnect.reset();
                self.retry_at = None;
                self.attempt_connect().await;
            }
            DriverCommand::Subscribe { topic, handler } => self.subscribe(topic, handler).await,
            DriverCommand::Unsubscribe { topic } => self.unsubscribe(&topic).await,
            DriverCommand::Publish { destination, body } => {
                self.publish(&destination, body).await
            }
            DriverCommand::Disconnect => self.disconnect().await,
        }
    }

    async fn attempt_connect(&mut self) {
        let Some(token) = self.credential.token() else {
            warn!("no credential available, not reconnecting");
            self.reconnect.reset();
            self.set_state(ConnectionState::Disconnected);
            self.emit(ClientEvent::Error(ClientError::MissingCredential));
            return;
        };

        self.set_state(ConnectionState::Connecting);
        let request = ConnectRequest {
            url: self.endpoint.clone(),
            token,
            query_token: self.query_token,
        };
        debug!(url = %request.url, attempt = self.reconnect.attempt_count, "connecting");

        // Commands keep flowing while the handshake is in flight. A
        // disconnect aborts it; anything else waits for the outcome.
        let mut deferred = Vec::new();
        let outcome = {
            let attempt = tokio::time::timeout(
                self.connect_timeout,
                handshake(self.transport.as_mut(), &request),
            );
            tokio::pin!(attempt);
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return,
                    command = self.commands.recv() => match command {
                        Some(DriverCommand::Disconnect) | None => break None,
                        Some(command) => deferred.push(command),
                    },
                    outcome = &mut attempt => break Some(outcome),
                }
            }
        };

        let Some(outcome) = outcome else {
            info!(url = %request.url, "connect aborted by disconnect");
            self.disconnect().await;
            return;
        };

        match outcome.unwrap_or(Err(ClientError::HandshakeTimeout)) {
            Ok(()) => {
                info!(url = %request.url, "connected");
                self.reconnect.reset();
                self.set_state(ConnectionState::Connected);
                self.emit(ClientEvent::Connected);
            }
            Err(e) => {
                warn!("connection attempt failed: {}", e);
                self.close_transport().await;
                self.emit(ClientEvent::Error(e));
                self.schedule_retry();
            }
        }

        for command in deferred {
            self.replay(command).await;
        }
    }

    /// Applies a command that arrived during a handshake.
    async fn replay(&mut self, command: DriverCommand) {
        match command {
            DriverCommand::Connect => self.shared.set(self.state),
            DriverCommand::Subscribe { topic, handler } => self.subscribe(topic, handler).await,
            DriverCommand::Unsubscribe { topic } => self.unsubscribe(&topic).await,
            DriverCommand::Publish { destination, body } => {
                self.publish(&destination, body).await
            }
            DriverCommand::Disconnect => self.disconnect().await,
        }
    }

    /// Handles an unintended close: subscriptions die with the socket.
    async fn connection_lost(&mut self, error: ClientError) {
        warn!("connection lost: {}", error);
        self.clear_subscriptions();
        self.close_transport().await;
        self.emit(ClientEvent::Error(error));
        self.schedule_retry();
    }

    fn schedule_retry(&mut self) {
        match self.reconnect.record_failure(&self.policy) {
            Some(delay) => {
                let attempt = self.reconnect.attempt_count;
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                info!(attempt, delay_ms, "scheduling reconnect");
                self.retry_at = Some(Instant::now() + delay);
                self.set_state(ConnectionState::Reconnecting { attempt });
                self.emit(ClientEvent::Reconnecting { attempt, delay });
            }
            None => {
                let attempts = self.reconnect.retries_made();
                error!(attempts, "reconnect attempts exhausted");
                self.retry_at = None;
                self.reconnect.reset();
                self.set_state(ConnectionState::Failed);
                self.emit(ClientEvent::Error(ClientError::RetriesExhausted { attempts }));
            }
        }
    }

    async fn handle_inbound(&mut self, inbound: TransportResult<Option<Frame>>) {
        match inbound {
            Ok(Some(frame)) => self.dispatch(frame).await,
            Ok(None) => {
                self.connection_lost(ClientError::Transport(TransportError::ConnectionClosed))
                    .await
            }
            Err(e) => self.connection_lost(e.into()).await,
        }
    }

    async fn dispatch(&mut self, frame: Frame) {
        match frame.command {
            Command::Message => self.deliver(frame),
            Command::Error => {
                let message = frame
                    .header("message")
                    .filter(|m| !m.is_empty())
                    .unwrap_or(&frame.body)
                    .to_string();
                self.connection_lost(ClientError::Server(message)).await;
            }
            Command::Receipt => debug!("receipt {:?}", frame.header("receipt-id")),
            other => debug!("ignoring unexpected {} frame", other),
        }
    }

    /// Hands a MESSAGE frame to the handler of its subscription.
    fn deliver(&mut self, frame: Frame) {
        let by_id = frame.header("subscription").and_then(|id| {
            self.subscriptions
                .iter()
                .find(|(_, sub)| sub.id == id)
                .map(|(topic, _)| topic.clone())
        });
        let topic = by_id.or_else(|| {
            frame
                .header("destination")
                .filter(|d| self.subscriptions.contains_key(*d))
                .map(str::to_string)
        });
        let Some(topic) = topic else {
            debug!(
                "no subscription for message on {}",
                frame.header("destination").unwrap_or("<none>")
            );
            return;
        };
        let inbound = InboundFrame {
            topic: frame
                .header("destination")
                .map_or_else(|| topic.clone(), str::to_string),
            message_id: frame.header("message-id").map(str::to_string),
            body: frame.body,
        };
        if let Some(sub) = self.subscriptions.get_mut(&topic) {
            (sub.handler)(inbound);
        }
    }

    async fn subscribe(&mut self, topic: String, handler: FrameHandler) {
        if self.state != ConnectionState::Connected {
            warn!("dropping subscription to {}: not connected", topic);
            return;
        }
        if self.subscriptions.contains_key(&topic) {
            debug!("already subscribed to {}", topic);
            return;
        }
        let id = format!("sub-{}", self.next_subscription);
        self.next_subscription += 1;
        if let Err(e) = self.transport.send(Frame::subscribe(&id, &topic)).await {
            self.connection_lost(e.into()).await;
            return;
        }
        debug!("subscribed to {} as {}", topic, id);
        self.subscriptions.insert(topic, Subscription { id, handler });
        self.sync_subscription_count();
    }

    async fn unsubscribe(&mut self, topic: &str) {
        let Some(sub) = self.subscriptions.remove(topic) else {
            debug!("not subscribed to {}", topic);
            return;
        };
        self.sync_subscription_count();
        if self.state != ConnectionState::Connected {
            return;
        }
        if let Err(e) = self.transport.send(Frame::unsubscribe(&sub.id)).await {
            self.connection_lost(e.into()).await;
        }
    }

    async fn publish(&mut self, destination: &str, body: String) {
        if self.state != ConnectionState::Connected {
            warn!("dropping publish to {}: not connected", destination);
            return;
        }
        if let Err(e) = self.transport.send(Frame::send(destination, body)).await {
            self.connection_lost(e.into()).await;
        }
    }

    /// Deliberate close. Safe to call in any state.
    async fn disconnect(&mut self) {
        self.retry_at = None;
        self.reconnect.reset();

        if self.state == ConnectionState::Connected {
            let subscriptions = std::mem::take(&mut self.subscriptions);
            for sub in subscriptions.into_values() {
                if let Err(e) = self.transport.send(Frame::unsubscribe(&sub.id)).await {
                    debug!("unsubscribe {} failed: {}", sub.id, e);
                }
            }
            if let Err(e) = self.transport.send(Frame::disconnect(None)).await {
                debug!("disconnect frame failed: {}", e);
            }
        }
        self.clear_subscriptions();
        self.close_transport().await;

        let was = self.state;
        self.set_state(ConnectionState::Disconnected);
        if was != ConnectionState::Disconnected {
            info!("disconnected");
            self.emit(ClientEvent::Disconnected);
        }
    }

    async fn close_transport(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            debug!("error closing transport: {}", e);
        }
    }

    fn clear_subscriptions(&mut self) {
        self.subscriptions.clear();
        self.sync_subscription_count();
    }

    fn sync_subscription_count(&self) {
        let count = u32::try_from(self.subscriptions.len()).unwrap_or(u32::MAX);
        self.shared.set_subscription_count(count);
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.shared.set(state);
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

/// Opens the socket and completes the CONNECT / CONNECTED exchange.
async fn handshake(
    transport: &mut dyn Transport,
    request: &ConnectRequest,
) -> Result<(), ClientError> {
    transport.connect(request).await?;
    transport
        .send(Frame::connect(&request.host(), Some(&request.token)))
        .await?;
    loop {
        let Some(frame) = transport.recv().await? else {
            return Err(TransportError::ConnectionClosed.into());
        };
        match frame.command {
            Command::Connected => return Ok(()),
            Command::Error => {
                let reason = frame
                    .header("message")
                    .filter(|m| !m.is_empty())
                    .unwrap_or(&frame.body)
                    .to_string();
                return Err(ClientError::HandshakeRejected(reason));
            }
            other => debug!("ignoring {} before CONNECTED", other),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
