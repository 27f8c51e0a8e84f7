// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection state shared between the client handle and its driver task.
//!
//! The driver owns the socket and is the only writer of the lifecycle
//! state, except for the handle's eager transitions on `connect()` and
//! `disconnect()`. Reads are lock-free so the handle can answer
//! `state()` and `is_connected()` synchronously.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Lifecycle of the one logical connection owned by a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting for retry number `attempt`.
    Reconnecting { attempt: u32 },
    /// Retries exhausted. Only a manual `connect()` leaves this state.
    Failed,
}

impl ConnectionState {
    /// Check if `connect()` should be ignored in this state.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::Reconnecting { .. }
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting { attempt } => {
                write!(f, "reconnecting (attempt {})", attempt)
            }
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

const STATE_DISCONNECTED: u8 = 0;
const STATE_CONNECTING: u8 = 1;
const STATE_CONNECTED: u8 = 2;
const STATE_RECONNECTING: u8 = 3;
const STATE_FAILED: u8 = 4;

/// Connection state visible to both the driver task and the handle.
///
/// Uses atomic fields for lock-free reads.
#[derive(Debug)]
pub struct SharedConnectionState {
    state: AtomicU8,
    /// Attempt number while reconnecting.
    attempt: AtomicU32,
    subscriptions: AtomicU32,
}

impl SharedConnectionState {
    /// Create a new shared state initialized to disconnected.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_DISCONNECTED),
            attempt: AtomicU32::new(0),
            subscriptions: AtomicU32::new(0),
        }
    }

    /// Get the current state.
    pub fn get(&self) -> ConnectionState {
        match self.state.load(Ordering::Acquire) {
            STATE_CONNECTING => ConnectionState::Connecting,
            STATE_CONNECTED => ConnectionState::Connected,
            STATE_RECONNECTING => ConnectionState::Reconnecting {
                attempt: self.attempt(),
            },
            STATE_FAILED => ConnectionState::Failed,
            _ => ConnectionState::Disconnected,
        }
    }

    /// Set the state.
    pub fn set(&self, state: ConnectionState) {
        let (raw, attempt) = match state {
            ConnectionState::Disconnected => (STATE_DISCONNECTED, 0),
            ConnectionState::Connecting => (STATE_CONNECTING, self.attempt()),
            ConnectionState::Connected => (STATE_CONNECTED, 0),
            ConnectionState::Reconnecting { attempt } => (STATE_RECONNECTING, attempt),
            ConnectionState::Failed => (STATE_FAILED, 0),
        };
        // Attempt first so a reader that sees Reconnecting sees its number.
        self.attempt.store(attempt, Ordering::Release);
        self.state.store(raw, Ordering::Release);
    }

    /// Moves Disconnected or Failed to Connecting.
    ///
    /// Returns `false` when a connection is already active, which makes
    /// concurrent `connect()` calls collapse into one.
    pub fn try_begin_connect(&self) -> bool {
        for from in [STATE_DISCONNECTED, STATE_FAILED] {
            if self
                .state
                .compare_exchange(from, STATE_CONNECTING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.attempt.store(0, Ordering::Release);
                return true;
            }
        }
        false
    }

    /// Get the current attempt count.
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    /// Number of active topic subscriptions.
    pub fn subscription_count(&self) -> u32 {
        self.subscriptions.load(Ordering::Acquire)
    }

    pub fn set_subscription_count(&self, count: u32) {
        self.subscriptions.store(count, Ordering::Release);
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    /// Get a human-readable status string.
    pub fn status_string(&self) -> String {
        match self.get() {
            ConnectionState::Connected => {
                let subs = self.subscription_count();
                if subs > 0 {
                    format!("connected ({} subscriptions)", subs)
                } else {
                    "connected".to_string()
                }
            }
            other => other.to_string(),
        }
    }
}

impl Default for SharedConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
