// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! parley - A reconnecting STOMP-over-WebSocket chat client.
//!
//! This crate keeps one authenticated pub/sub connection alive, routes
//! inbound chat payloads into normalized, de-duplicated messages and
//! projects connection status and messages into UI-facing state.
//!
//! # Main Components
//!
//! - [`TransportClient`] - Connection lifecycle, subscriptions and publishing
//! - [`ReconnectPolicy`] - Exponential backoff with a retry ceiling
//! - [`MessageRouter`] - Normalization and duplicate suppression
//! - [`ChatSession`] - Wires the client, the router and a [`StateSink`]
//! - [`ClientConfig`] - TOML configuration with environment overrides
//!
//! # Usage
//!
//! ```rust,ignore
//! use parley::{ChatSession, ChatStore, ClientConfig, EnvCredential};
//!
//! let config = ClientConfig::load_or_default(&path)?;
//! let mut session = ChatSession::from_config(&config, Arc::new(EnvCredential), ChatStore::new())?;
//! session.start();
//! while let Some(event) = session.next_event().await {
//!     // session.sink() now reflects the event
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod credential;
pub mod env;
pub mod error;
pub mod event;
pub mod history;
pub mod reconnect;
pub mod router;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use client::{ClientOptions, TransportClient};
pub use config::{ClientConfig, ConfigError};
pub use connection::{ConnectionState, SharedConnectionState};
pub use credential::{CredentialSource, EnvCredential, SharedCredential, StaticCredential};
pub use error::{ClientError, ErrorKind};
pub use event::{ClientEvent, EventReceiver, InboundFrame};
pub use history::{HistoryError, HistorySource};
pub use reconnect::ReconnectPolicy;
pub use router::MessageRouter;
pub use session::ChatSession;
pub use store::{ChatStore, StateSink};
pub use transport::{ConnectRequest, Transport, TransportError, WebSocketTransport};

pub use parley_core::{DomainMessage, MessageId, OutgoingMessage, UploadReceipt};
