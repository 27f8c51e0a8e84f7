// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

#[test]
fn empty_file_gives_defaults() {
    let config: ClientConfig = toml::from_str("").unwrap();
    assert_eq!(config, ClientConfig::default());
    assert_eq!(config.connect_timeout_ms, 10_000);
    assert_eq!(config.reconnect.base_delay_ms, 500);
    assert_eq!(config.reconnect.max_delay_ms, 30_000);
    assert_eq!(config.reconnect.max_attempts, 10);
    assert!(!config.router.clear_seen_on_reconnect);
    assert_eq!(config.router.dedup_capacity, 10_000);
}

#[test]
fn partial_sections_keep_defaults() {
    let config: ClientConfig = toml::from_str(
        r#"
endpoint = "wss://chat.example.com/ws"

[reconnect]
max_attempts = 3

[router]
clear_seen_on_reconnect = true
"#,
    )
    .unwrap();
    assert_eq!(config.endpoint.as_deref(), Some("wss://chat.example.com/ws"));
    assert_eq!(config.reconnect.max_attempts, 3);
    assert_eq!(config.reconnect.base_delay_ms, 500);
    assert!(config.router.clear_seen_on_reconnect);
    assert_eq!(config.router.dedup_capacity, 10_000);
}

#[test]
fn save_and_load_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.toml");

    let mut config = ClientConfig::default();
    config.endpoint = Some("ws://localhost:8080/ws".to_string());
    config.user_id = Some("42".to_string());
    config.reconnect.max_attempts = 0;
    config.save(&path).unwrap();

    let loaded = ClientConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn load_or_default_without_file() {
    let temp = TempDir::new().unwrap();
    let config = ClientConfig::load_or_default(&temp.path().join("missing.toml")).unwrap();
    assert_eq!(config, ClientConfig::default());
}

#[test]
fn load_reports_parse_errors() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "endpoint = [").unwrap();
    let err = ClientConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
    assert!(err.to_string().starts_with("failed to parse config"));
}

#[test]
fn load_reports_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = ClientConfig::load(&temp.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read(_)));
}

#[test]
fn env_overrides_file_values() {
    let mut config = ClientConfig {
        endpoint: Some("ws://file/ws".to_string()),
        user_id: Some("file-user".to_string()),
        ..ClientConfig::default()
    };
    config.apply_env_with(|name| match name {
        "PARLEY_ENDPOINT" => Some("wss://env/ws".to_string()),
        "PARLEY_ASSET_BASE" => Some("https://cdn.env".to_string()),
        _ => None,
    });
    assert_eq!(config.endpoint.as_deref(), Some("wss://env/ws"));
    assert_eq!(config.user_id.as_deref(), Some("file-user"));
    assert_eq!(config.asset_base_url.as_deref(), Some("https://cdn.env"));
}

#[parameterized(
    http_endpoint = { Some("http://chat/ws"), 10_000, 500, 30_000 },
    not_a_url = { Some("chat.example.com/ws"), 10_000, 500, 30_000 },
    no_host = { Some("ws://"), 10_000, 500, 30_000 },
    bad_port = { Some("ws://chat:99999/ws"), 10_000, 500, 30_000 },
    zero_timeout = { None, 0, 500, 30_000 },
    zero_base = { None, 10_000, 0, 30_000 },
    max_below_base = { None, 10_000, 500, 100 },
)]
fn validate_rejects(endpoint: Option<&str>, timeout: u64, base: u64, max: u64) {
    let config = ClientConfig {
        endpoint: endpoint.map(str::to_string),
        connect_timeout_ms: timeout,
        reconnect: ReconnectConfig {
            base_delay_ms: base,
            max_delay_ms: max,
            max_attempts: 1,
        },
        ..ClientConfig::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[parameterized(
    no_endpoint = { None },
    ws = { Some("ws://localhost:8080/ws") },
    wss = { Some("wss://chat.example.com/ws") },
    uppercase_scheme = { Some("WSS://chat.example.com/ws") },
    ipv6 = { Some("ws://[::1]:8080/ws") },
)]
fn validate_accepts(endpoint: Option<&str>) {
    let config = ClientConfig {
        endpoint: endpoint.map(str::to_string),
        ..ClientConfig::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn client_options_from_config() {
    let config = ClientConfig {
        endpoint: Some("ws://h/ws".to_string()),
        query_token_fallback: true,
        connect_timeout_ms: 2_500,
        reconnect: ReconnectConfig {
            base_delay_ms: 100,
            max_delay_ms: 800,
            max_attempts: 4,
        },
        ..ClientConfig::default()
    };
    let options = config.client_options();
    assert_eq!(options.endpoint.as_deref(), Some("ws://h/ws"));
    assert!(options.query_token);
    assert_eq!(options.connect_timeout, Duration::from_millis(2_500));
    assert_eq!(options.policy.base_delay, Duration::from_millis(100));
    assert_eq!(options.policy.max_delay, Duration::from_millis(800));
    assert_eq!(options.policy.max_attempts, 4);
}

#[test]
fn router_uses_asset_base() {
    let config = ClientConfig {
        asset_base_url: Some("https://cdn".to_string()),
        ..ClientConfig::default()
    };
    assert_eq!(config.router().asset_base(), Some("https://cdn"));
}
