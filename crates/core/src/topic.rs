// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Destination naming shared by client and broker.
//!
//! - Private queue: `/user/{userId}/queue/messages`
//! - Broadcast topic: `/topic/public`
//! - Outgoing chat messages: `/app/chat.send`

/// Public topic every session listens on.
pub const BROADCAST_TOPIC: &str = "/topic/public";

/// Application route for outgoing chat messages.
pub const SEND_DESTINATION: &str = "/app/chat.send";

/// Prefix of destinations the broker fans out verbatim.
pub const TOPIC_PREFIX: &str = "/topic/";

const USER_PREFIX: &str = "/user/";
const PRIVATE_QUEUE_SUFFIX: &str = "/queue/messages";

/// Returns the private queue destination for a user.
pub fn private_queue(user_id: &str) -> String {
    format!("{}{}{}", USER_PREFIX, user_id, PRIVATE_QUEUE_SUFFIX)
}

/// Extracts the user id from a private queue destination.
pub fn private_queue_owner(destination: &str) -> Option<&str> {
    let user = destination
        .strip_prefix(USER_PREFIX)?
        .strip_suffix(PRIVATE_QUEUE_SUFFIX)?;
    if user.is_empty() || user.contains('/') {
        None
    } else {
        Some(user)
    }
}

/// Check if a destination is a broadcast topic.
pub fn is_topic(destination: &str) -> bool {
    destination.len() > TOPIC_PREFIX.len() && destination.starts_with(TOPIC_PREFIX)
}

#[cfg(test)]
#[path = "topic_tests.rs"]
mod tests;
