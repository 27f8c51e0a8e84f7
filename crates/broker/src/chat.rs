// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Routing for the `/app/chat.send` application destination.
//!
//! A chat message addressed to a user goes to the receiver's and the
//! sender's private queues, so every open session of both parties sees
//! it. A message without a receiver goes to the broadcast topic. The
//! broker fills in `id` and `timestamp` when the sender left them out.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use parley_core::topic::{private_queue, BROADCAST_TOPIC};

/// Why a chat payload was refused.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("chat payload must be a JSON object")]
    NotAnObject,

    #[error("chat payload has no sender")]
    MissingSender,
}

/// Where a chat payload goes, and the body to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRoute {
    pub destinations: Vec<String>,
    pub body: String,
}

/// Completes a chat payload and picks its destinations.
///
/// `next_id` is only called when the payload has no usable id.
pub fn route_chat(body: &str, next_id: impl FnOnce() -> u64) -> Result<ChatRoute, ChatError> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Object(mut obj) = value else {
        return Err(ChatError::NotAnObject);
    };

    let sender = party(&obj, &["senderId", "sender"]).ok_or(ChatError::MissingSender)?;
    let receiver = party(&obj, &["receiverId", "receiver"]);

    if !has_value(&obj, "id") {
        obj.insert("id".to_string(), Value::from(next_id()));
    }
    if !has_value(&obj, "timestamp") {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        obj.insert("timestamp".to_string(), Value::String(now));
    }

    let destinations = match receiver {
        Some(receiver) if receiver != sender => {
            vec![private_queue(&receiver), private_queue(&sender)]
        }
        Some(receiver) => vec![private_queue(&receiver)],
        None => vec![BROADCAST_TOPIC.to_string()],
    };

    Ok(ChatRoute {
        destinations,
        body: Value::Object(obj).to_string(),
    })
}

fn has_value(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Reads a user id given as a string, a number or an object with an `id`.
fn party(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Object(inner) => inner.get("id").and_then(|id| match id {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }),
            _ => None,
        })
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
