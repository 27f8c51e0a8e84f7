// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Chat session: the component driver.
//!
//! A [`ChatSession`] owns one [`TransportClient`], its event receiver and a
//! [`MessageRouter`], and feeds a [`StateSink`]. On every successful
//! (re)connect it subscribes the router to the user's private queue and to
//! the broadcast topic, since subscriptions never outlive a connection.

use std::sync::{Arc, PoisonError};

use parley_core::message::normalize;
use parley_core::topic::{private_queue, BROADCAST_TOPIC, SEND_DESTINATION};
use parley_core::{OutgoingMessage, UploadReceipt};
use tracing::{debug, info, warn};

use crate::client::TransportClient;
use crate::config::{ClientConfig, ConfigError};
use crate::connection::ConnectionState;
use crate::credential::CredentialSource;
use crate::error::ErrorKind;
use crate::event::{ClientEvent, EventReceiver};
use crate::history::{HistoryError, HistorySource};
use crate::router::{forward_to, MessageRouter, SharedRouter};
use crate::store::StateSink;

/// Connects the transport, the router and the UI state.
pub struct ChatSession<S: StateSink> {
    client: TransportClient,
    events: EventReceiver,
    router: SharedRouter,
    sink: S,
    user_id: String,
    clear_seen_on_reconnect: bool,
    has_connected: bool,
}

impl<S: StateSink> ChatSession<S> {
    pub fn new(
        client: TransportClient,
        events: EventReceiver,
        router: MessageRouter,
        sink: S,
        user_id: impl Into<String>,
    ) -> Self {
        ChatSession {
            client,
            events,
            router: router.shared(),
            sink,
            user_id: user_id.into(),
            clear_seen_on_reconnect: false,
            has_connected: false,
        }
    }

    /// Builds a session over a WebSocket transport.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn from_config(
        config: &ClientConfig,
        credential: Arc<dyn CredentialSource>,
        sink: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let user_id = config
            .user_id
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ConfigError::Invalid("user_id is not set".to_string()))?;
        let (client, events) = TransportClient::new(config.client_options(), credential);
        Ok(Self::new(client, events, config.router(), sink, user_id)
            .clear_seen_on_reconnect(config.router.clear_seen_on_reconnect))
    }

    /// Forget seen ids whenever the connection is re-established.
    pub fn clear_seen_on_reconnect(mut self, clear: bool) -> Self {
        self.clear_seen_on_reconnect = clear;
        self
    }

    /// Starts connecting. See [`TransportClient::connect`].
    pub fn start(&self) {
        self.client.connect();
    }

    /// Waits for the next event and applies it to the sink.
    ///
    /// Returns `None` once the client has shut down.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        let event = self.events.recv().await?;
        self.apply(&event);
        Some(event)
    }

    fn apply(&mut self, event: &ClientEvent) {
        match event {
            ClientEvent::Connected => {
                if self.has_connected && self.clear_seen_on_reconnect {
                    debug!("clearing seen message ids after reconnect");
                    self.lock_router().reset();
                }
                self.has_connected = true;
                self.subscribe_topics();
                self.sink.on_status(ConnectionState::Connected);
            }
            ClientEvent::Disconnected => self.sink.on_status(ConnectionState::Disconnected),
            ClientEvent::Reconnecting { attempt, .. } => self
                .sink
                .on_status(ConnectionState::Reconnecting { attempt: *attempt }),
            ClientEvent::Message(message) => self.sink.on_messages(vec![message.clone()]),
            ClientEvent::Error(error) => {
                self.sink.on_error(error);
                match error.kind() {
                    ErrorKind::Terminal => self.sink.on_status(ConnectionState::Failed),
                    ErrorKind::Configuration => self.sink.on_status(self.client.state()),
                    ErrorKind::Transient | ErrorKind::Protocol => {}
                }
            }
        }
    }

    fn subscribe_topics(&self) {
        let private = private_queue(&self.user_id);
        for topic in [private.as_str(), BROADCAST_TOPIC] {
            let handler = forward_to(Arc::clone(&self.router), self.client.event_sender());
            if !self.client.subscribe(topic, handler) {
                warn!("could not subscribe to {}", topic);
            }
        }
        info!(user = %self.user_id, "subscribed to chat topics");
    }

    /// Sends a text message to `receiver_id`.
    ///
    /// Returns `false` for blank text or when not connected.
    pub fn send_text(&self, receiver_id: &str, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let message = OutgoingMessage::text(&self.user_id, receiver_id, text);
        self.client.publish(SEND_DESTINATION, &message)
    }

    /// Sends a message carrying an already uploaded file.
    pub fn send_attachment(
        &self,
        receiver_id: &str,
        upload: &UploadReceipt,
        caption: &str,
    ) -> bool {
        let message =
            OutgoingMessage::text(&self.user_id, receiver_id, caption).with_upload(upload);
        self.client.publish(SEND_DESTINATION, &message)
    }

    /// Fetches past messages with `peer_id` and hands them to the sink.
    ///
    /// Their ids are marked as seen, so the same messages arriving live are
    /// dropped. Entries that fail to normalize are skipped. Returns the
    /// number of messages handed over.
    pub async fn load_history<H: HistorySource + ?Sized>(
        &mut self,
        source: &H,
        peer_id: &str,
        limit: usize,
    ) -> Result<usize, HistoryError> {
        let raw = source.fetch_history(peer_id, limit).await?;
        let (batch, seen) = {
            let mut router = self.lock_router();
            let asset_base = router.asset_base().map(str::to_string);
            let batch: Vec<_> = raw
                .iter()
                .filter_map(|value| match normalize(value, asset_base.as_deref()) {
                    Ok(message) => {
                        router.mark_seen(&message.id);
                        Some(message)
                    }
                    Err(e) => {
                        warn!("skipping history entry: {}", e);
                        None
                    }
                })
                .collect();
            (batch, router.seen_count())
        };
        let count = batch.len();
        debug!(seen, "loaded {} history messages with {}", count, peer_id);
        self.sink.on_messages(batch);
        Ok(count)
    }

    pub fn disconnect(&self) {
        self.client.disconnect();
    }

    /// Stops the transport and returns the sink.
    pub async fn shutdown(self) -> S {
        self.client.shutdown().await;
        self.sink
    }

    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn client(&self) -> &TransportClient {
        &self.client
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn router(&self) -> SharedRouter {
        Arc::clone(&self.router)
    }

    fn lock_router(&self) -> std::sync::MutexGuard<'_, MessageRouter> {
        self.router.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
