// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Contract for the message history REST collaborator.
//!
//! `GET /messages/{peerId}?limit=N` answers with an ordered page of raw
//! messages. Implementations unwrap the page into a list of JSON values.
//! The transport never calls this itself; a
//! [`ChatSession`](crate::session::ChatSession) merges the page into the
//! store and marks its ids as seen.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;

/// Errors fetching or reading a history page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("history request failed: {0}")]
    Request(String),

    #[error("unexpected history payload: {0}")]
    Payload(String),
}

/// Boxed future returned by [`HistorySource::fetch_history`].
pub type HistoryFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Value>, HistoryError>> + Send + 'a>>;

/// Fetches past messages exchanged with one peer.
pub trait HistorySource: Send + Sync {
    /// Returns at most `limit` raw messages, oldest first.
    fn fetch_history(&self, peer_id: &str, limit: usize) -> HistoryFuture<'_>;
}
