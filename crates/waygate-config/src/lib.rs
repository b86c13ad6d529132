// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Waygate gateway.
//!
//! TOML configuration with strict parsing (`deny_unknown_fields`), XDG file
//! hierarchy lookup, `WAYGATE_*` environment variable overrides, and
//! diagnostic error rendering with typo suggestions.

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::WaygateConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// The high-level entry point used by the binary:
/// 1. Merge TOML files + env vars via Figment.
/// 2. On success, run post-deserialization validation.
/// 3. On Figment error, convert to diagnostics with typo suggestions.
pub fn load_and_validate() -> Result<WaygateConfig, Vec<ConfigError>> {
    match load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(&err)),
    }
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<WaygateConfig, Vec<ConfigError>> {
    match load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(&err)),
    }
}
