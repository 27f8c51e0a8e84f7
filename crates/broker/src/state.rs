// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Broker state shared by every connection.
//!
//! Published payloads go through one broadcast channel; each connection
//! filters them against its own subscriptions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Buffered deliveries per connection before it starts lagging.
const CHANNEL_CAPACITY: usize = 1024;

/// One payload published to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-wide sequence number, used as the MESSAGE `message-id`.
    pub seq: u64,
    pub destination: String,
    pub body: String,
}

/// Shared broker state.
#[derive(Clone)]
pub struct BrokerState {
    inner: Arc<BrokerStateInner>,
}

struct BrokerStateInner {
    /// Fanout channel for published payloads.
    broadcast_tx: broadcast::Sender<Delivery>,
    /// Last delivery sequence number handed out.
    seq: AtomicU64,
    /// Last chat message id assigned by the broker.
    message_ids: AtomicU64,
    /// Token every CONNECT must present, if any.
    token: Option<String>,
}

impl BrokerState {
    /// Creates a broker that requires `token` when set, or accepts anyone.
    pub fn new(token: Option<String>) -> Self {
        let (broadcast_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        BrokerState {
            inner: Arc::new(BrokerStateInner {
                broadcast_tx,
                seq: AtomicU64::new(0),
                message_ids: AtomicU64::new(0),
                token: token.filter(|t| !t.is_empty()),
            }),
        }
    }

    /// Publishes `body` to `destination`.
    ///
    /// Returns the number of connections the delivery was handed to.
    pub fn publish(&self, destination: &str, body: impl Into<String>) -> usize {
        let delivery = Delivery {
            seq: self.inner.seq.fetch_add(1, Ordering::Relaxed) + 1,
            destination: destination.to_string(),
            body: body.into(),
        };
        self.inner.broadcast_tx.send(delivery).unwrap_or(0)
    }

    /// Returns a receiver for every delivery published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Allocates an id for a chat message that arrived without one.
    pub fn next_message_id(&self) -> u64 {
        self.inner.message_ids.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of deliveries published so far.
    pub fn published(&self) -> u64 {
        self.inner.seq.load(Ordering::Relaxed)
    }

    pub fn requires_token(&self) -> bool {
        self.inner.token.is_some()
    }

    /// Check if `token` may open a session.
    pub fn accepts(&self, token: Option<&str>) -> bool {
        match &self.inner.token {
            None => true,
            Some(expected) => token == Some(expected.as_str()),
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
