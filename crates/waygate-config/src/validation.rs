// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed through serde
//! attributes: non-empty paths, well-formed keys, sane retry tables.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::diagnostic::ConfigError;
use crate::model::WaygateConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects all failures rather than failing fast.
pub fn validate_config(config: &WaygateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.gateway.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "gateway.log_level must be one of {LOG_LEVELS:?}, got `{}`",
                config.gateway.log_level
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    // master_key is optional (status-only invocations), but when present it
    // must decode to exactly 32 bytes of AES-256 key material.
    if let Some(key) = &config.credentials.master_key {
        match STANDARD.decode(key.as_bytes()) {
            Ok(bytes) if bytes.len() == 32 => {}
            Ok(bytes) => errors.push(ConfigError::Validation {
                message: format!(
                    "credentials.master_key must decode to 32 bytes, got {}",
                    bytes.len()
                ),
            }),
            Err(e) => errors.push(ConfigError::Validation {
                message: format!("credentials.master_key is not valid base64: {e}"),
            }),
        }
    }

    if config.connector.open_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "connector.open_attempts must be at least 1".to_string(),
        });
    }

    if config.connector.sweep_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "connector.sweep_interval_secs must be at least 1".to_string(),
        });
    }

    if config.webhook.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "webhook.max_attempts must be at least 1".to_string(),
        });
    }

    if config.webhook.backoff_ms.is_empty() && config.webhook.max_attempts > 1 {
        errors.push(ConfigError::Validation {
            message: "webhook.backoff_ms must not be empty when retries are enabled"
                .to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&WaygateConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails() {
        let mut config = WaygateConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))
        ));
    }

    #[test]
    fn bad_log_level_fails() {
        let mut config = WaygateConfig::default();
        config.gateway.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn short_master_key_fails() {
        let mut config = WaygateConfig::default();
        config.credentials.master_key = Some(STANDARD.encode([0u8; 16]));
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("32 bytes"))
        ));
    }

    #[test]
    fn well_formed_master_key_passes() {
        let mut config = WaygateConfig::default();
        config.credentials.master_key = Some(STANDARD.encode([7u8; 32]));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn non_base64_master_key_fails() {
        let mut config = WaygateConfig::default();
        config.credentials.master_key = Some("not//valid==base64!!".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn zero_attempt_policies_fail() {
        let mut config = WaygateConfig::default();
        config.connector.open_attempts = 0;
        config.webhook.max_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
