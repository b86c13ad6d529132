// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./waygate.toml` > `~/.config/waygate/waygate.toml`
//! > `/etc/waygate/waygate.toml`, with environment variable overrides via the
//! `WAYGATE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::WaygateConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/waygate/waygate.toml` (system-wide)
/// 3. `~/.config/waygate/waygate.toml` (user XDG config)
/// 4. `./waygate.toml` (local directory)
/// 5. `WAYGATE_*` environment variables
pub fn load_config() -> Result<WaygateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WaygateConfig::default()))
        .merge(Toml::file("/etc/waygate/waygate.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("waygate/waygate.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("waygate.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
pub fn load_config_from_str(toml_content: &str) -> Result<WaygateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WaygateConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<WaygateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(WaygateConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `WAYGATE_STORAGE_DATABASE_PATH` must map
/// to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("WAYGATE_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: WAYGATE_CREDENTIALS_MASTER_KEY -> "credentials_master_key"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("gateway_", "gateway.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("credentials_", "credentials.", 1)
            .replacen("connector_", "connector.", 1)
            .replacen("webhook_", "webhook.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_config_overrides_defaults() {
        let config = load_config_from_str(
            r#"
[gateway]
log_level = "debug"

[storage]
database_path = "/var/lib/waygate/gw.db"
"#,
        )
        .unwrap();
        assert_eq!(config.gateway.log_level, "debug");
        assert_eq!(config.storage.database_path, "/var/lib/waygate/gw.db");
        // Untouched sections keep their defaults.
        assert_eq!(config.webhook.max_attempts, 3);
    }

    #[test]
    fn empty_string_yields_pure_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.gateway.name, "waygate");
        assert!(config.credentials.master_key.is_none());
    }
}
