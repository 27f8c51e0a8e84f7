// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Events emitted by the transport client.

use std::time::Duration;

use parley_core::DomainMessage;
use tokio::sync::mpsc;

use crate::error::ClientError;

/// Lifecycle and message events, consumed by polling the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// One per successful handshake.
    Connected,
    /// The connection was closed on request.
    Disconnected,
    /// A retry has been scheduled.
    Reconnecting { attempt: u32, delay: Duration },
    Message(DomainMessage),
    Error(ClientError),
}

/// A raw frame delivered to a subscription handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Destination the frame arrived on.
    pub topic: String,
    pub body: String,
    /// Broker-assigned `message-id` header, if any.
    pub message_id: Option<String>,
}

/// Callback invoked for each frame on a subscribed topic, in wire order.
pub type FrameHandler = Box<dyn FnMut(InboundFrame) + Send>;

pub type EventSender = mpsc::UnboundedSender<ClientEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ClientEvent>;
