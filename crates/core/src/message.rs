// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Chat messages and wire-shape normalization.
//!
//! Servers disagree on field names, so inbound payloads go through
//! [`normalize`], which turns every known shape into one canonical
//! [`DomainMessage`]. Precedence, first match wins:
//!
//! | field         | sources                                               |
//! |---------------|-------------------------------------------------------|
//! | `id`          | `id` (string or number), required                     |
//! | `text`        | non-empty `text`, then `content`, else empty          |
//! | `sender_id`   | `senderId`, then `sender`, required                   |
//! | `receiver_id` | `receiverId`, then `receiver`, else empty (broadcast) |
//! | `timestamp`   | `timestamp` (ISO-8601 or epoch millis), required      |
//! | `attachment`  | non-empty `fileUrl`, with `fileType` and `fileName`   |
//!
//! Parties may be given as a string, a number, or an object with an `id`.
//! Relative file URLs are joined onto the asset base URL.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{Error, Result};
use crate::rest::UploadReceipt;

/// Identifier of a chat message, unique within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        MessageId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        MessageId(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        MessageId(id)
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Absolute URL when an asset base is configured.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Attachment {
    /// Check if the attachment is an image by MIME type.
    pub fn is_image(&self) -> bool {
        self.file_type
            .as_deref()
            .is_some_and(|t| t.starts_with("image/"))
    }
}

/// A decoded chat message in canonical shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainMessage {
    pub id: MessageId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub sender_id: String,
    /// Empty for broadcast messages.
    #[serde(default)]
    pub receiver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl DomainMessage {
    /// Decodes a JSON body and normalizes it.
    pub fn parse(body: &str, asset_base: Option<&str>) -> Result<Self> {
        let value: Value = serde_json::from_str(body)?;
        normalize(&value, asset_base)
    }

    /// Returns the other party of a direct message, from `user_id`'s view.
    pub fn peer_of(&self, user_id: &str) -> &str {
        if self.sender_id == user_id {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }

    /// Check if this message was broadcast rather than sent to one user.
    pub fn is_broadcast(&self) -> bool {
        self.receiver_id.is_empty()
    }
}

/// Message body published to the send route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl OutgoingMessage {
    /// Creates a text message stamped with the current time.
    pub fn text(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        OutgoingMessage {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            file_url: None,
            file_type: None,
            file_name: None,
        }
    }

    /// Attaches an uploaded file.
    pub fn with_upload(mut self, upload: &UploadReceipt) -> Self {
        self.file_url = Some(upload.url.clone());
        self.file_type = upload.file_type.clone();
        self.file_name = upload.file_name.clone();
        self
    }
}

/// Normalizes one inbound payload into a [`DomainMessage`].
///
/// See the module documentation for the field precedence.
pub fn normalize(value: &Value, asset_base: Option<&str>) -> Result<DomainMessage> {
    let obj = value.as_object().ok_or_else(|| Error::InvalidField {
        field: "message",
        reason: "expected a JSON object".to_string(),
    })?;

    let id = match obj.get("id") {
        Some(v) => scalar_id(v, "id")?,
        None => None,
    }
    .ok_or(Error::MissingField("id"))?;

    let text = first_text(obj, &["text", "content"]).unwrap_or_default();

    let sender_id =
        first_party(obj, &["senderId", "sender"], "senderId")?.ok_or(Error::MissingField("senderId"))?;
    let receiver_id = first_party(obj, &["receiverId", "receiver"], "receiverId")?.unwrap_or_default();

    let timestamp = match obj.get("timestamp") {
        Some(Value::String(s)) => parse_timestamp(s)?,
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| Error::InvalidTimestamp(n.to_string()))?,
        Some(Value::Null) | None => return Err(Error::MissingField("timestamp")),
        Some(other) => return Err(Error::InvalidTimestamp(other.to_string())),
    };

    let attachment = match obj.get("fileUrl") {
        Some(Value::String(url)) if !url.trim().is_empty() => Some(Attachment {
            url: resolve_file_url(url.trim(), asset_base),
            file_type: optional_string(obj, "fileType"),
            file_name: optional_string(obj, "fileName"),
        }),
        _ => None,
    };

    Ok(DomainMessage {
        id: MessageId(id),
        text,
        timestamp,
        sender_id,
        receiver_id,
        attachment,
    })
}

/// Parses an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with an offset, or a naive date-time (`T` or space
/// separated, optional fraction) which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(Error::InvalidTimestamp(raw.to_string()))
}

/// Joins a relative file URL onto the asset base. Absolute URLs
/// (anything with a scheme, or protocol-relative `//`) pass through, as
/// does everything when the base is missing or unparseable.
pub fn resolve_file_url(url: &str, asset_base: Option<&str>) -> String {
    if url.starts_with("//") || Url::parse(url).is_ok() {
        return url.to_string();
    }
    let Some(mut base) = asset_base.and_then(|b| Url::parse(b).ok()) else {
        return url.to_string();
    };
    // Keep the last base segment as a directory
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(url.trim_start_matches('/'))
        .map_or_else(|_| url.to_string(), String::from)
}

fn scalar_id(value: &Value, field: &'static str) -> Result<Option<String>> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(Some(s.trim().to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::String(_) | Value::Null => Ok(None),
        _ => Err(Error::InvalidField {
            field,
            reason: "expected string or number".to_string(),
        }),
    }
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_party(
    obj: &Map<String, Value>,
    keys: &[&str],
    field: &'static str,
) -> Result<Option<String>> {
    for key in keys {
        let party = match obj.get(*key) {
            Some(Value::Object(inner)) => match inner.get("id") {
                Some(v) => scalar_id(v, field)?,
                None => None,
            },
            Some(v) => scalar_id(v, field)?,
            None => None,
        };
        if party.is_some() {
            return Ok(party);
        }
    }
    Ok(None)
}

fn optional_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
