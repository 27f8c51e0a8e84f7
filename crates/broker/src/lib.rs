// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! parley-broker: development STOMP-over-WebSocket broker for parley.
//!
//! Accepts STOMP 1.2 sessions, fans out `/topic/*` destinations, and
//! routes chat messages sent to `/app/chat.send` into the private queues
//! of their sender and receiver. An optional token guards CONNECT.

pub mod chat;
pub mod server;
pub mod state;

pub use server::{run, serve};
pub use state::BrokerState;
