// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Waygate gateway core.

use thiserror::Error;

/// The primary error type used across all Waygate components.
///
/// Transient failures (reconnects, webhook retries, coalesced credential
/// saves) are absorbed where they happen; only exhausted-retry and terminal
/// outcomes travel through this enum to callers and persisted record status.
#[derive(Debug, Error)]
pub enum WaygateError {
    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Opening the protocol connection failed or timed out after the capped
    /// retry schedule. Callers should re-poll; the session stays initializing.
    #[error("connection unavailable for session {session}: {message}")]
    ConnectionUnavailable { session: String, message: String },

    /// The persisted credential blob could not be decrypted or parsed.
    /// Treated as absent upstream, which forces a fresh pairing flow.
    #[error("corrupt credentials for session {session}: {message}")]
    CredentialCorrupt { session: String, message: String },

    /// The remote party signed out. The session is terminal until the
    /// external layer explicitly re-creates it.
    #[error("remote party signed out of session {session}")]
    TerminalLogout { session: String },

    /// A callback endpoint answered with a non-retryable 4xx status.
    #[error("webhook rejected with status {status}")]
    WebhookRejected { status: u16 },

    /// A callback endpoint stayed unreachable (transport failure, 5xx, 429)
    /// through the whole retry schedule.
    #[error("webhook unreachable after {attempts} attempts: {message}")]
    WebhookUnreachable { attempts: u32, message: String },

    /// The daily quota check could not admit the send. Carries both the
    /// over-limit case and the fail-closed case (counter unreadable).
    #[error("rate limit: {0}")]
    RateLimitExceeded(String),

    /// An outbound send failed: no live connection or a protocol-level error.
    /// The message is marked failed; re-submission is the producer's call.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
