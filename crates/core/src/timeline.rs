// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Display ordering for chat messages.
//!
//! Transports do not guarantee in-order delivery, so ordering is applied
//! by the display buffer: every batch update re-sorts by timestamp.

use std::collections::HashSet;

use crate::message::{DomainMessage, MessageId};

/// Sorts messages by timestamp ascending.
///
/// The sort is stable: messages with equal timestamps keep arrival order.
pub fn sort_by_timestamp(messages: &mut [DomainMessage]) {
    messages.sort_by_key(|m| m.timestamp);
}

/// Ordered, duplicate-free message buffer for one view.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    messages: Vec<DomainMessage>,
    ids: HashSet<MessageId>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a batch, skipping ids already present, then re-sorts.
    ///
    /// Returns the number of messages added.
    pub fn merge<I>(&mut self, batch: I) -> usize
    where
        I: IntoIterator<Item = DomainMessage>,
    {
        let before = self.messages.len();
        for msg in batch {
            if self.ids.insert(msg.id.clone()) {
                self.messages.push(msg);
            }
        }
        let added = self.messages.len() - before;
        if added > 0 {
            sort_by_timestamp(&mut self.messages);
        }
        added
    }

    /// Messages in display order.
    pub fn messages(&self) -> &[DomainMessage] {
        &self.messages
    }

    /// Check if a message id is already buffered.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    /// Most recent message, if any.
    pub fn last(&self) -> Option<&DomainMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }
}

#[cfg(test)]
#[path = "timeline_tests.rs"]
mod tests;
