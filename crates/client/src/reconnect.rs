// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnection controller.
//!
//! Every unintended close or failed attempt bumps the attempt counter and
//! schedules the next try after `min(base * 2^(n-1), max)`. A successful
//! handshake resets the counter. Once the counter would pass
//! `max_attempts` the controller gives up; `max_attempts = 0` never does.

use std::time::Duration;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default cap on the retry delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default number of retries before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Maximum reconnection attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Returns the delay before attempt `attempt` (1-based).
    ///
    /// Attempt 0 is treated like attempt 1. Overflow saturates at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        2u32.checked_pow(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Check if attempt `attempt` (1-based) is within the cap.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt <= self.max_attempts
    }
}

/// Progress of the current reconnection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectState {
    pub attempt_count: u32,
    /// Delay chosen for the pending retry, zero when none is scheduled.
    pub next_delay: Duration,
}

impl ReconnectState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an unintended close or failed attempt.
    ///
    /// Returns the delay before the next retry, or `None` once the policy's
    /// cap has been passed.
    pub fn record_failure(&mut self, policy: &ReconnectPolicy) -> Option<Duration> {
        self.attempt_count = self.attempt_count.saturating_add(1);
        if !policy.allows(self.attempt_count) {
            self.next_delay = Duration::ZERO;
            return None;
        }
        self.next_delay = policy.delay_for(self.attempt_count);
        Some(self.next_delay)
    }

    /// Number of retries that were actually made in this cycle.
    pub fn retries_made(&self) -> u32 {
        self.attempt_count.saturating_sub(1)
    }

    /// Resets after a successful handshake or a manual restart.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
#[path = "reconnect_tests.rs"]
mod tests;
