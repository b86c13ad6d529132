// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user daily send quota enforcement.
//!
//! Wraps the storage layer's atomic counter primitive with policy: the
//! post-increment count is compared against the owner's configured daily
//! limit, the reset time is always the next UTC midnight, and any failure
//! to evaluate the quota fails closed.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use tracing::warn;
use waygate_core::WaygateError;
use waygate_storage::Database;
use waygate_storage::queries::quota;

/// Outcome of one quota check for one prospective send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Post-increment count for today.
    pub current: i64,
    pub limit: i64,
    /// When today's counter rolls over: the next UTC midnight.
    pub resets_at: DateTime<Utc>,
}

/// Atomic per-user, per-day counter against a configured quota.
pub struct RateLimiter {
    db: Database,
}

impl RateLimiter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Atomically increments today's counter for the owner and compares the
    /// post-increment value against the owner's daily limit.
    ///
    /// Fails closed: an unknown owner or a storage failure returns
    /// [`WaygateError::RateLimitExceeded`] rather than permitting the send.
    pub async fn check_and_increment(&self, user_id: &str) -> Result<QuotaDecision, WaygateError> {
        let now = Utc::now();
        let day = now.format("%Y-%m-%d").to_string();

        let counted = match quota::increment_and_read(&self.db, user_id, &day).await {
            Ok(counted) => counted,
            Err(e) => {
                warn!(user_id, error = %e, "quota counter unavailable, failing closed");
                return Err(WaygateError::RateLimitExceeded(format!(
                    "quota check failed closed for {user_id}"
                )));
            }
        };

        let Some((current, limit)) = counted else {
            return Err(WaygateError::RateLimitExceeded(format!(
                "unknown owner {user_id}, failing closed"
            )));
        };

        Ok(QuotaDecision {
            allowed: current <= limit,
            current,
            limit,
            resets_at: next_utc_midnight(now),
        })
    }
}

/// The UTC midnight that follows `now`.
fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + chrono::Days::new(1);
    Utc.with_ymd_and_hms(tomorrow.year(), tomorrow.month(), tomorrow.day(), 0, 0, 0)
        .single()
        .unwrap_or(now)
}
