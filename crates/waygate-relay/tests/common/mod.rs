// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared wiring for relay integration tests.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use waygate_core::RetryPolicy;
use waygate_relay::{ConnectorSettings, EventRouter, SessionConnectionManager};
use waygate_test_utils::TestHarness;
use waygate_webhook::WebhookDispatcher;

/// Settings with instant retries and a long idle window, for tests that do
/// not exercise the sweep.
pub fn fast_settings() -> ConnectorSettings {
    ConnectorSettings {
        open_timeout: Duration::from_secs(2),
        open_policy: RetryPolicy::from_millis(3, &[0, 0]),
        idle_window: Duration::from_secs(3600),
        sweep_interval: Duration::from_secs(3600),
        reconnect_policy: RetryPolicy::from_millis(3, &[0, 0]),
    }
}

/// Build a manager over the harness's transport, database, and credential
/// store, with webhook delivery retrying instantly.
pub fn build_manager(
    harness: &TestHarness,
    settings: ConnectorSettings,
) -> (SessionConnectionManager, CancellationToken) {
    let cancel = CancellationToken::new();
    let saver = waygate_credentials::spawn_saver(
        harness.store.clone(),
        Duration::from_millis(20),
        cancel.clone(),
    );
    let dispatcher = Arc::new(
        WebhookDispatcher::new(
            harness.db.clone(),
            RetryPolicy::from_millis(3, &[0, 0, 0]),
            Duration::from_secs(5),
        )
        .expect("dispatcher"),
    );
    let router = EventRouter::new(harness.db.clone(), dispatcher);
    let manager = SessionConnectionManager::new(
        harness.transport.clone(),
        harness.db.clone(),
        harness.store.clone(),
        saver,
        router,
        settings,
        cancel.clone(),
    );
    (manager, cancel)
}

/// Poll until `predicate` returns true or the timeout elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut predicate: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not reached within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
