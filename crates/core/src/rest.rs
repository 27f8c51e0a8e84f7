// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Contract types for the REST collaborators.
//!
//! Message history and uploads are served over HTTP by an external
//! service. Only the shapes and paths live here.

use serde::{Deserialize, Serialize};

/// Path of the multipart upload endpoint.
pub const UPLOAD_PATH: &str = "/upload";

/// Default page size for history requests.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Returns the history path for a conversation with `peer_id`.
pub fn history_path(peer_id: &str, limit: usize) -> String {
    format!("/messages/{}?limit={}", peer_id, limit)
}

/// Response of the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    /// Resource URL, possibly relative to the asset base.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;
