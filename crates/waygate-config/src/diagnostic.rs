// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostic rendering for configuration errors.
//!
//! Figment errors are converted into miette diagnostics, with strsim-based
//! "did you mean" suggestions for misspelled keys against the known key set.

use miette::Diagnostic;
use thiserror::Error;

/// A single configuration error, renderable as a miette diagnostic.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// TOML parse or deserialization failure.
    #[error("{message}")]
    #[diagnostic(code(waygate::config::parse))]
    Parse {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Post-deserialization semantic validation failure.
    #[error("{message}")]
    #[diagnostic(code(waygate::config::validation))]
    Validation { message: String },
}

/// Every key accepted by the configuration model, used for typo suggestions.
const KNOWN_KEYS: &[&str] = &[
    "gateway",
    "gateway.name",
    "gateway.log_level",
    "storage",
    "storage.database_path",
    "credentials",
    "credentials.master_key",
    "credentials.save_coalesce_ms",
    "connector",
    "connector.open_timeout_secs",
    "connector.open_attempts",
    "connector.open_backoff_ms",
    "connector.idle_timeout_secs",
    "connector.sweep_interval_secs",
    "connector.reconnect_attempts",
    "connector.reconnect_backoff_ms",
    "webhook",
    "webhook.max_attempts",
    "webhook.attempt_timeout_secs",
    "webhook.backoff_ms",
];

/// Convert a figment error (possibly aggregating several failures) into a
/// list of [`ConfigError`]s with typo suggestions where applicable.
pub fn figment_to_config_errors(err: &figment::Error) -> Vec<ConfigError> {
    err.clone()
        .into_iter()
        .map(|e| {
            let message = e.to_string();
            ConfigError::Parse {
                help: suggest_key(&message),
                message,
            }
        })
        .collect()
}

/// Render a "did you mean" hint when an unknown-key message names something
/// close to a key we accept.
fn suggest_key(message: &str) -> Option<String> {
    // Figment phrases unknown keys as: unknown field `foo`, expected ...
    let start = message.find('`')? + 1;
    let end = message[start..].find('`')? + start;
    let unknown = &message[start..end];

    let (best, score) = KNOWN_KEYS
        .iter()
        .map(|k| {
            let leaf = k.rsplit('.').next().unwrap_or(k);
            (*k, strsim::jaro_winkler(unknown, leaf))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))?;

    (score > 0.85).then(|| format!("did you mean `{best}`?"))
}

/// Print configuration errors to stderr, one diagnostic per error.
pub fn render_errors(errors: &[ConfigError]) {
    for err in errors {
        match err {
            ConfigError::Parse { message, help } => {
                eprintln!("error: {message}");
                if let Some(help) = help {
                    eprintln!("  help: {help}");
                }
            }
            ConfigError::Validation { message } => {
                eprintln!("error: {message}");
            }
        }
    }
    eprintln!(
        "\nConfiguration is read from ./waygate.toml, ~/.config/waygate/waygate.toml, \
         /etc/waygate/waygate.toml, and WAYGATE_* environment variables."
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_key_names() {
        let help = suggest_key("unknown field `databse_path`, expected one of ...");
        assert_eq!(help, Some("did you mean `storage.database_path`?".into()));
    }

    #[test]
    fn no_suggestion_for_distant_names() {
        assert!(suggest_key("unknown field `zzzzzz`, expected ...").is_none());
    }

    #[test]
    fn no_suggestion_without_backticks() {
        assert!(suggest_key("invalid type: found string").is_none());
    }
}
