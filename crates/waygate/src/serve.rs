// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `waygate serve` command implementation.
//!
//! Wires the full gateway: database with migrations, sealed credential
//! store with its coalescing saver, webhook dispatcher, connection manager,
//! outbound processor, idle sweep, and store-change listener. Restores
//! every surviving session on startup and shuts down gracefully on
//! SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use waygate_config::WaygateConfig;
use waygate_core::{RetryPolicy, Transport, WaygateError};
use waygate_credentials::CredentialStore;
use waygate_relay::{
    ConnectorSettings, EventRouter, OutboundProcessor, SessionConnectionManager,
    install_signal_handler,
};
use waygate_storage::Database;
use waygate_webhook::WebhookDispatcher;

/// Runs the `waygate serve` command until a shutdown signal arrives.
pub async fn run_serve(config: WaygateConfig) -> Result<(), WaygateError> {
    init_tracing(&config.gateway.log_level);
    info!(name = %config.gateway.name, "starting waygate serve");

    let master_key = master_key_from_config(&config)?;

    let db = Database::open(&config.storage.database_path).await?;
    let cancel = install_signal_handler();

    let store = Arc::new(CredentialStore::new(db.clone(), master_key));
    let saver = waygate_credentials::spawn_saver(
        store.clone(),
        Duration::from_millis(config.credentials.save_coalesce_ms),
        cancel.clone(),
    );

    let dispatcher = Arc::new(WebhookDispatcher::new(
        db.clone(),
        RetryPolicy::from_millis(config.webhook.max_attempts, &config.webhook.backoff_ms),
        Duration::from_secs(config.webhook.attempt_timeout_secs),
    )?);
    let router = EventRouter::new(db.clone(), dispatcher);

    let manager = SessionConnectionManager::new(
        build_transport(),
        db.clone(),
        store,
        saver,
        router,
        ConnectorSettings::from_config(&config.connector),
        cancel.clone(),
    );

    let restored = manager.restore_sessions().await?;
    info!(restored, "session restore started");

    let sweep = manager.spawn_idle_sweep();
    let listener = manager.spawn_store_listener();
    let outbound = OutboundProcessor::new(db.clone(), manager.clone(), cancel.clone()).spawn();

    info!("waygate is running");
    cancel.cancelled().await;

    info!("shutting down");
    manager.shutdown().await;
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = sweep.await;
        let _ = listener.await;
        let _ = outbound.await;
    })
    .await;
    if drained.is_err() {
        warn!("background tasks did not stop within the drain timeout");
    }

    db.close().await?;
    info!("shutdown complete");
    Ok(())
}

/// Decode the configured base64 master key into AES-256 key material.
fn master_key_from_config(config: &WaygateConfig) -> Result<[u8; 32], WaygateError> {
    let encoded = config.credentials.master_key.as_deref().ok_or_else(|| {
        WaygateError::Config(
            "credentials.master_key is required to run serve; \
             generate one with `openssl rand -base64 32`"
                .to_string(),
        )
    })?;
    let bytes = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| WaygateError::Config(format!("credentials.master_key: {e}")))?;
    bytes.try_into().map_err(|_| {
        WaygateError::Config("credentials.master_key must decode to 32 bytes".to_string())
    })
}

#[cfg(feature = "echo-transport")]
fn build_transport() -> Arc<dyn Transport> {
    info!("using the echo loopback transport (development mode)");
    Arc::new(crate::echo::EchoTransport::new())
}

#[cfg(not(feature = "echo-transport"))]
fn build_transport() -> Arc<dyn Transport> {
    compile_error!(
        "waygate requires a protocol transport: enable the `echo-transport` feature \
         for local development or link a protocol driver"
    );
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
