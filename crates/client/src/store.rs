// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The boundary to UI state.
//!
//! The transport core only talks to the UI through [`StateSink`]. The
//! in-memory [`ChatStore`] is the stock implementation.

use parley_core::{DomainMessage, Timeline};

use crate::connection::ConnectionState;
use crate::error::{ClientError, ErrorKind};

/// Receives connection status and message batches.
pub trait StateSink: Send {
    fn on_status(&mut self, state: ConnectionState);

    /// A batch of new messages: one live message, or a history page.
    fn on_messages(&mut self, batch: Vec<DomainMessage>);

    fn on_error(&mut self, error: &ClientError);
}

/// In-memory chat state for one signed-in user.
#[derive(Debug, Default)]
pub struct ChatStore {
    status: ConnectionState,
    timeline: Timeline,
    last_error: Option<ClientError>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ConnectionState {
        self.status
    }

    /// Every message, ordered by timestamp.
    pub fn messages(&self) -> &[DomainMessage] {
        self.timeline.messages()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    /// Direct messages between `user_id` and `peer_id`, in display order.
    pub fn conversation(&self, user_id: &str, peer_id: &str) -> Vec<&DomainMessage> {
        self.timeline
            .messages()
            .iter()
            .filter(|m| {
                (m.sender_id == user_id && m.receiver_id == peer_id)
                    || (m.sender_id == peer_id && m.receiver_id == user_id)
            })
            .collect()
    }
}

impl StateSink for ChatStore {
    fn on_status(&mut self, state: ConnectionState) {
        if state == ConnectionState::Connected {
            self.last_error = None;
        }
        self.status = state;
    }

    fn on_messages(&mut self, batch: Vec<DomainMessage>) {
        self.timeline.merge(batch);
    }

    fn on_error(&mut self, error: &ClientError) {
        // Malformed frames are dropped quietly.
        if error.kind() != ErrorKind::Protocol {
            self.last_error = Some(error.clone());
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
