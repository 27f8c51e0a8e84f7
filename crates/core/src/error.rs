// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for parley-core operations.

use thiserror::Error;

/// All possible errors that can occur in parley-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("empty frame")]
    EmptyFrame,

    #[error("unknown frame command: '{0}'")]
    UnknownCommand(String),

    #[error("malformed header line: '{0}'")]
    MalformedHeader(String),

    #[error("invalid escape sequence in header: '{0}'")]
    InvalidEscape(String),

    #[error("truncated frame: {0}")]
    Truncated(&'static str),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("invalid timestamp: '{0}'\n  hint: expected an ISO-8601 date-time")]
    InvalidTimestamp(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for parley-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
