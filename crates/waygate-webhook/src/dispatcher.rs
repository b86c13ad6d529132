// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook dispatcher: resolve the callback URL, POST, retry, log.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, info, warn};
use waygate_core::{MessageId, RetryPolicy, SessionId, WaygateError};
use waygate_storage::queries::{attempts, messages, sessions};
use waygate_storage::{Database, NewDeliveryAttempt};

use crate::payload::{WebhookMessage, WebhookPayload};

/// Response bodies are truncated to this many characters before logging.
const BODY_LOG_LIMIT: usize = 1000;

/// Delivers inbound events to per-session callback URLs.
///
/// Retries for one event run strictly sequentially inside a single
/// `dispatch` call; distinct events may dispatch concurrently through the
/// shared `reqwest` client.
pub struct WebhookDispatcher {
    db: Database,
    http: reqwest::Client,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl WebhookDispatcher {
    pub fn new(
        db: Database,
        policy: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Result<Self, WaygateError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| WaygateError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            db,
            http,
            policy,
            attempt_timeout,
        })
    }

    /// Delivers one inbound event to the session's callback URL.
    ///
    /// A session without a configured URL is a no-op, not an error. On a
    /// 2xx the originating message is marked acknowledged. Exhausted
    /// retries surface as [`WaygateError::WebhookUnreachable`]; a
    /// non-retryable 4xx as [`WaygateError::WebhookRejected`]. Either way
    /// every attempt has already been logged.
    pub async fn dispatch(
        &self,
        session_id: &SessionId,
        message_id: &MessageId,
        mut message: WebhookMessage,
    ) -> Result<(), WaygateError> {
        let Some(session) = sessions::get_session(&self.db, session_id).await? else {
            debug!(session = %session_id, "dispatch for unknown session, skipping");
            return Ok(());
        };
        let Some(url) = session.callback_url.clone() else {
            debug!(session = %session_id, "no callback URL configured, skipping");
            return Ok(());
        };

        // The router does not know the session's own identity; fill the
        // `to` side from the paired phone number.
        if message.to.is_empty() {
            message.to = session.phone_number.clone().unwrap_or_else(|| "me".to_string());
        }

        let payload =
            WebhookPayload::message_received(session_id.as_str(), Some(session.name), message);

        let mut attempt: u32 = 1;
        loop {
            match self
                .http
                .post(&url)
                .timeout(self.attempt_timeout)
                .header("X-Attempt", attempt.to_string())
                .json(&payload)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    self.log_attempt(
                        message_id,
                        session_id,
                        &url,
                        attempt,
                        Some(status.as_u16()),
                        Some(truncate_chars(&body, BODY_LOG_LIMIT)),
                        None,
                    )
                    .await;

                    if status.is_success() {
                        messages::mark_webhook_acked(&self.db, message_id).await?;
                        info!(
                            session = %session_id,
                            message = %message_id,
                            attempt,
                            "webhook delivered"
                        );
                        return Ok(());
                    }

                    if !is_retryable(status) {
                        warn!(
                            session = %session_id,
                            message = %message_id,
                            status = status.as_u16(),
                            "webhook rejected, not retrying"
                        );
                        return Err(WaygateError::WebhookRejected {
                            status: status.as_u16(),
                        });
                    }

                    match self.policy.backoff_after(attempt) {
                        Some(delay) => {
                            warn!(
                                session = %session_id,
                                status = status.as_u16(),
                                attempt,
                                "webhook attempt failed, backing off"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Err(WaygateError::WebhookUnreachable {
                                attempts: attempt,
                                message: format!("last status {status}"),
                            });
                        }
                    }
                }
                Err(e) => {
                    self.log_attempt(
                        message_id,
                        session_id,
                        &url,
                        attempt,
                        None,
                        None,
                        Some(e.to_string()),
                    )
                    .await;

                    match self.policy.backoff_after(attempt) {
                        Some(delay) => {
                            warn!(
                                session = %session_id,
                                error = %e,
                                attempt,
                                "webhook transport failure, backing off"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Err(WaygateError::WebhookUnreachable {
                                attempts: attempt,
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
            attempt += 1;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn log_attempt(
        &self,
        message_id: &MessageId,
        session_id: &SessionId,
        url: &str,
        attempt: u32,
        status_code: Option<u16>,
        response_body: Option<String>,
        error: Option<String>,
    ) {
        let record = NewDeliveryAttempt {
            message_id: message_id.clone(),
            session_id: session_id.clone(),
            url: url.to_string(),
            attempt,
            status_code,
            response_body,
            error,
        };
        if let Err(e) = attempts::record_attempt(&self.db, &record).await {
            warn!(message = %message_id, error = %e, "failed to log delivery attempt");
        }
    }
}

/// 5xx and 429 are worth retrying; any other non-2xx is the endpoint
/// telling us the request itself is wrong.
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Character-bounded truncation, safe for multi-byte content.
fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
