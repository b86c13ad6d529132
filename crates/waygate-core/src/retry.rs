// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reusable bounded-retry policy.
//!
//! One policy value describes a capped attempt count and a backoff table;
//! each call site decides what counts as retryable. Used by webhook
//! delivery, connection opens, and reconnect scheduling so no component
//! carries its own inline sleep loop.

use std::time::Duration;

/// A bounded retry schedule: at most `max_attempts` tries, with a fixed
/// backoff looked up by attempt index between them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Vec<Duration>,
}

impl RetryPolicy {
    /// Creates a policy with an explicit backoff table.
    ///
    /// When there are more attempts than table entries, the last entry
    /// repeats.
    pub fn new(max_attempts: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Convenience constructor from millisecond values.
    pub fn from_millis(max_attempts: u32, backoff_ms: &[u64]) -> Self {
        Self::new(
            max_attempts,
            backoff_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
        )
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after the given 1-based attempt failed, or `None` when
    /// the attempts are exhausted and the caller must give up.
    pub fn backoff_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        if self.backoff.is_empty() {
            return Some(Duration::ZERO);
        }
        let idx = (attempt as usize - 1).min(self.backoff.len() - 1);
        Some(self.backoff[idx])
    }
}
