// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! All runtime environment variables read by the client are defined here
//! with typed accessor functions. The variable name constants are generated
//! by `build.rs` and live in the [`vars`] submodule. Empty values count as
//! unset.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Looks up a variable, treating empty values as unset.
pub fn lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Returns the value of `PARLEY_CONFIG` if set.
pub fn config_path() -> Option<PathBuf> {
    lookup(vars::PARLEY_CONFIG).map(PathBuf::from)
}

/// Returns the value of `PARLEY_ENDPOINT` if set.
pub fn endpoint() -> Option<String> {
    lookup(vars::PARLEY_ENDPOINT)
}

/// Returns the value of `PARLEY_TOKEN` if set.
pub fn token() -> Option<String> {
    lookup(vars::PARLEY_TOKEN)
}

/// Returns the value of `PARLEY_USER_ID` if set.
pub fn user_id() -> Option<String> {
    lookup(vars::PARLEY_USER_ID)
}

/// Returns the value of `PARLEY_ASSET_BASE` if set.
pub fn asset_base() -> Option<String> {
    lookup(vars::PARLEY_ASSET_BASE)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
