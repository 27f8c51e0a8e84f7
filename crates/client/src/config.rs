// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Stored as TOML, by default in `<config dir>/parley/config.toml`:
//!
//! ```toml
//! endpoint = "wss://chat.example.com/ws"
//! user_id = "42"
//! asset_base_url = "https://chat.example.com"
//!
//! [reconnect]
//! base_delay_ms = 500
//! max_delay_ms = 30000
//! max_attempts = 10
//!
//! [router]
//! clear_seen_on_reconnect = false
//! dedup_capacity = 10000
//! ```
//!
//! Every field is optional. `PARLEY_ENDPOINT`, `PARLEY_USER_ID` and
//! `PARLEY_ASSET_BASE` override the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::client::ClientOptions;
use crate::env;
use crate::reconnect::{ReconnectPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::router::{MessageRouter, DEFAULT_DEDUP_CAPACITY};

const CONFIG_DIR_NAME: &str = "parley";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Client configuration stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Broker URL (`ws://` or `wss://`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Identity whose private queue is subscribed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Base URL that relative attachment URLs are joined onto.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_base_url: Option<String>,
    /// Also pass the token as an `access_token` query parameter, for
    /// servers that cannot read upgrade headers.
    #[serde(default)]
    pub query_token_fallback: bool,
    /// Max time for one connect plus handshake in milliseconds (default: 10000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub router: RouterConfig,
}

/// Backoff settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first retry in milliseconds (default: 500).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on the retry delay in milliseconds (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Retries before giving up (default: 10). 0 = unlimited.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Message router settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Forget seen message ids after every reconnect.
    #[serde(default)]
    pub clear_seen_on_reconnect: bool,
    /// Remembered ids before the oldest are evicted (default: 10000). 0 = unbounded.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_dedup_capacity() -> usize {
    DEFAULT_DEDUP_CAPACITY
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            clear_seen_on_reconnect: false,
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoint: None,
            user_id: None,
            asset_base_url: None,
            query_token_fallback: false,
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect: ReconnectConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Returns `PARLEY_CONFIG` if set, else the per-user config file.
    pub fn default_path() -> Option<PathBuf> {
        env::config_path().or_else(|| {
            dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        })
    }

    /// Loads configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Loads configuration from `path`, or defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Saves configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Applies `PARLEY_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_with(env::lookup);
    }

    /// Applies overrides read through `lookup`.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup(env::vars::PARLEY_ENDPOINT) {
            self.endpoint = Some(endpoint);
        }
        if let Some(user_id) = lookup(env::vars::PARLEY_USER_ID) {
            self.user_id = Some(user_id);
        }
        if let Some(base) = lookup(env::vars::PARLEY_ASSET_BASE) {
            self.asset_base_url = Some(base);
        }
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(endpoint) = &self.endpoint {
            let url = Url::parse(endpoint).map_err(|e| {
                ConfigError::Invalid(format!("endpoint '{}' is not a valid url: {}", endpoint, e))
            })?;
            if !matches!(url.scheme(), "ws" | "wss") {
                return Err(ConfigError::Invalid(format!(
                    "endpoint '{}' must use ws:// or wss://",
                    endpoint
                )));
            }
            if url.host_str().unwrap_or_default().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "endpoint '{}' has no host",
                    endpoint
                )));
            }
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_ms must be positive".to_string(),
            ));
        }
        let reconnect = &self.reconnect;
        if reconnect.base_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "reconnect.base_delay_ms must be positive".to_string(),
            ));
        }
        if reconnect.max_delay_ms < reconnect.base_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "reconnect.max_delay_ms ({}) is below base_delay_ms ({})",
                reconnect.max_delay_ms, reconnect.base_delay_ms
            )));
        }
        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            max_attempts: self.reconnect.max_attempts,
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            endpoint: self.endpoint.clone(),
            policy: self.reconnect_policy(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            query_token: self.query_token_fallback,
        }
    }

    /// Builds an empty router with the configured capacity and asset base.
    pub fn router(&self) -> MessageRouter {
        MessageRouter::new(self.router.dedup_capacity, self.asset_base_url.clone())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
