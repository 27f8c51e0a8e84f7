// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types surfaced by the transport client.

use thiserror::Error;

use crate::transport::TransportError;

/// How an error is recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing credential or endpoint. Reported once, never retried.
    Configuration,
    /// Socket drop or failed handshake. Recovered by reconnecting.
    Transient,
    /// Malformed frame or body. The frame is dropped, nothing is surfaced.
    Protocol,
    /// Reconnect attempts exhausted. Needs a manual `connect()`.
    Terminal,
}

/// Errors reported by the transport client and message router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("no credential available\n  hint: sign in or set PARLEY_TOKEN")]
    MissingCredential,

    #[error("transport endpoint is not configured\n  hint: set `endpoint` in config.toml or PARLEY_ENDPOINT")]
    MissingEndpoint,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("server error: {0}")]
    Server(String),

    #[error("undecodable message: {0}")]
    Decode(String),

    #[error("gave up after {attempts} reconnect attempts")]
    RetriesExhausted { attempts: u32 },
}

impl ClientError {
    /// Classifies the error for recovery.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::MissingCredential | ClientError::MissingEndpoint => {
                ErrorKind::Configuration
            }
            ClientError::Transport(_)
            | ClientError::HandshakeRejected(_)
            | ClientError::HandshakeTimeout
            | ClientError::Server(_) => ErrorKind::Transient,
            ClientError::Decode(_) => ErrorKind::Protocol,
            ClientError::RetriesExhausted { .. } => ErrorKind::Terminal,
        }
    }

    /// Check if the connection has given up for good.
    pub fn is_terminal(&self) -> bool {
        self.kind() == ErrorKind::Terminal
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
