// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Message router: decode, deduplicate, forward.
//!
//! The router sits behind every chat subscription. It turns raw frame
//! bodies into [`DomainMessage`]s and drops ids it has already forwarded.
//! It never reorders; display ordering belongs to
//! [`Timeline`](parley_core::Timeline).

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use parley_core::{DomainMessage, MessageId};
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::event::{ClientEvent, EventSender, InboundFrame};

/// Default number of remembered ids.
pub const DEFAULT_DEDUP_CAPACITY: usize = 10_000;

/// Decodes frames and filters out repeated message ids.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    seen: HashSet<MessageId>,
    /// Insertion order, for oldest-first eviction.
    order: VecDeque<MessageId>,
    /// Maximum remembered ids (0 = unbounded).
    capacity: usize,
    asset_base: Option<String>,
}

/// A router shared between subscription handlers.
pub type SharedRouter = Arc<Mutex<MessageRouter>>;

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY, None)
    }
}

impl MessageRouter {
    pub fn new(capacity: usize, asset_base: Option<String>) -> Self {
        MessageRouter {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity,
            asset_base: asset_base.filter(|b| !b.trim().is_empty()),
        }
    }

    pub fn shared(self) -> SharedRouter {
        Arc::new(Mutex::new(self))
    }

    /// Decodes one frame.
    ///
    /// Returns `Ok(None)` for an id that was already forwarded and
    /// [`ClientError::Decode`] for a body that is not a chat message.
    pub fn route(&mut self, frame: &InboundFrame) -> Result<Option<DomainMessage>, ClientError> {
        let message = DomainMessage::parse(&frame.body, self.asset_base.as_deref())
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        if !self.mark_seen(&message.id) {
            debug!("dropping duplicate message {} on {}", message.id, frame.topic);
            return Ok(None);
        }
        Ok(Some(message))
    }

    /// Records `id` as forwarded. Returns `false` if it already was.
    pub fn mark_seen(&mut self, id: &MessageId) -> bool {
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id.clone());
        if self.capacity > 0 {
            while self.order.len() > self.capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.seen.remove(&evicted);
                }
            }
        }
        true
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Forgets every id.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.order.clear();
    }

    pub fn asset_base(&self) -> Option<&str> {
        self.asset_base.as_deref()
    }
}

/// Builds a subscription handler that routes frames into `events`.
///
/// Malformed frames are logged and dropped; later frames still flow.
pub fn forward_to(
    router: SharedRouter,
    events: EventSender,
) -> impl FnMut(InboundFrame) + Send + 'static {
    move |frame: InboundFrame| {
        let routed = router
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .route(&frame);
        match routed {
            Ok(Some(message)) => {
                if events.send(ClientEvent::Message(message)).is_err() {
                    debug!("event receiver dropped");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("dropping frame on {}: {}", frame.topic, e),
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
