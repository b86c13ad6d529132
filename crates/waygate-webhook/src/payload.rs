// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook payload envelope.
//!
//! The wire shape is part of the external contract and must not drift:
//! `{"event":"message.received","session_id":...,"session_name"?:...,
//!   "message":{"id","from","to","kind","text","timestamp"},
//!   "received_at":...}`.

use serde::{Deserialize, Serialize};

/// The `message` object inside the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookMessage {
    pub id: String,
    pub from: String,
    pub to: String,
    pub kind: String,
    pub text: String,
    /// ISO-8601 protocol timestamp of the original message.
    pub timestamp: String,
}

/// The full envelope POSTed to the callback URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    pub message: WebhookMessage,
    pub received_at: String,
}

impl WebhookPayload {
    /// Builds a `message.received` envelope stamped with the current time.
    pub fn message_received(
        session_id: &str,
        session_name: Option<String>,
        message: WebhookMessage,
    ) -> Self {
        Self {
            event: "message.received".to_string(),
            session_id: session_id.to_string(),
            session_name,
            message,
            received_at: waygate_core::utc_now_iso(),
        }
    }
}
