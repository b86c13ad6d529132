// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook delivery for inbound gateway events.
//!
//! POSTs a normalized JSON envelope to the session's configured callback
//! URL with a bounded, fully-logged retry loop: every attempt (success or
//! failure) lands in the delivery-attempt table, 2xx acknowledges the
//! event, 5xx/429/transport errors retry on a fixed backoff schedule, and
//! any other 4xx stops immediately.

pub mod dispatcher;
pub mod payload;

pub use dispatcher::WebhookDispatcher;
pub use payload::{WebhookMessage, WebhookPayload};
