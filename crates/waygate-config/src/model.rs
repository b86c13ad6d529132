// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Waygate gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so unrecognized keys are
//! rejected at startup with an actionable message.

use serde::{Deserialize, Serialize};

/// Top-level Waygate configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WaygateConfig {
    /// Gateway identity and logging.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Credential sealing and save coalescing.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Connection open/reconnect/idle policy.
    #[serde(default)]
    pub connector: ConnectorConfig,

    /// Webhook delivery policy.
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Gateway identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Display name of this gateway instance.
    #[serde(default = "default_gateway_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: default_gateway_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_gateway_name() -> String {
    "waygate".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "waygate.db".to_string()
}

/// Credential sealing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Base64-encoded 32-byte AES-256-GCM master key sealing every
    /// session's credential blob. Required to run `serve`.
    #[serde(default)]
    pub master_key: Option<String>,

    /// Coalescing window for high-frequency credential save requests, in
    /// milliseconds. The last write inside a window wins.
    #[serde(default = "default_save_coalesce_ms")]
    pub save_coalesce_ms: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            master_key: None,
            save_coalesce_ms: default_save_coalesce_ms(),
        }
    }
}

fn default_save_coalesce_ms() -> u64 {
    500
}

/// Connection open, reconnect, and idle policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorConfig {
    /// Ceiling on a single protocol handshake, in seconds.
    #[serde(default = "default_open_timeout_secs")]
    pub open_timeout_secs: u64,

    /// Attempts per `acquire` before surfacing `ConnectionUnavailable`.
    #[serde(default = "default_open_attempts")]
    pub open_attempts: u32,

    /// Backoff table between open attempts, in milliseconds.
    #[serde(default = "default_open_backoff_ms")]
    pub open_backoff_ms: Vec<u64>,

    /// Idle window after which an unused connection is evicted, in seconds.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Interval of the idle sweep task, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Reconnect attempts after a transient disconnect.
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    /// Backoff table between reconnect attempts, in milliseconds.
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: Vec<u64>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            open_timeout_secs: default_open_timeout_secs(),
            open_attempts: default_open_attempts(),
            open_backoff_ms: default_open_backoff_ms(),
            idle_timeout_secs: default_idle_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
        }
    }
}

fn default_open_timeout_secs() -> u64 {
    30
}

fn default_open_attempts() -> u32 {
    3
}

fn default_open_backoff_ms() -> Vec<u64> {
    vec![1000, 3000, 10000]
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_backoff_ms() -> Vec<u64> {
    vec![1000, 5000, 15000, 30000, 60000]
}

/// Webhook delivery policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Delivery attempts per event.
    #[serde(default = "default_webhook_max_attempts")]
    pub max_attempts: u32,

    /// Per-attempt HTTP timeout, in seconds.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Backoff table between attempts, in milliseconds.
    #[serde(default = "default_webhook_backoff_ms")]
    pub backoff_ms: Vec<u64>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_webhook_max_attempts(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            backoff_ms: default_webhook_backoff_ms(),
        }
    }
}

fn default_webhook_max_attempts() -> u32 {
    3
}

fn default_attempt_timeout_secs() -> u64 {
    10
}

fn default_webhook_backoff_ms() -> Vec<u64> {
    vec![1000, 3000, 10000]
}
