// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sources of the bearer token.
//!
//! The client never issues or refreshes tokens. It asks its source for the
//! current one on every connection attempt, so a token rotated between
//! retries is picked up automatically.

use std::sync::{Arc, PoisonError, RwLock};

use crate::env;

/// Supplies the current bearer token, if any.
pub trait CredentialSource: Send + Sync {
    fn token(&self) -> Option<String>;
}

impl<F> CredentialSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// A fixed token. Empty tokens count as missing.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        StaticCredential(Some(token.into()))
    }

    pub fn none() -> Self {
        StaticCredential(None)
    }
}

impl CredentialSource for StaticCredential {
    fn token(&self) -> Option<String> {
        self.0.clone().filter(|t| !t.trim().is_empty())
    }
}

/// Reads `PARLEY_TOKEN` at each attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredential;

impl CredentialSource for EnvCredential {
    fn token(&self) -> Option<String> {
        env::token()
    }
}

/// A token that can be replaced while the client runs, e.g. after sign-in.
#[derive(Debug, Clone, Default)]
pub struct SharedCredential(Arc<RwLock<Option<String>>>);

impl SharedCredential {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn clear(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl CredentialSource for SharedCredential {
    fn token(&self) -> Option<String> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
