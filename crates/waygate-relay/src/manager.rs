// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of live protocol connections and the per-session lifecycle
//! state machine.
//!
//! One manager instance owns all live links. The registry is the only
//! shared mutable state in the core; every mutation goes through this
//! module, and concurrent `acquire` calls for the same session converge on
//! a single link via a per-session creation lock. Cross-session operations
//! never block each other.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use waygate_config::model::ConnectorConfig;
use waygate_core::{
    CloseReason, Credentials, LinkEvent, RetryPolicy, SessionId, SessionStatus, Transport,
    TransportLink, TransportSession, WaygateError,
};
use waygate_credentials::{CredentialSaver, CredentialStore};
use waygate_storage::queries::sessions;
use waygate_storage::{Database, StoreEvent};

use crate::router::EventRouter;

/// Tunables for the connection manager, usually built from configuration.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    /// Ceiling on a single protocol handshake.
    pub open_timeout: Duration,
    /// Attempt cap and backoff for one `acquire`.
    pub open_policy: RetryPolicy,
    /// Eviction threshold for unused links.
    pub idle_window: Duration,
    /// Period of the idle sweep task.
    pub sweep_interval: Duration,
    /// Attempt cap and backoff for reconnecting after a transient close.
    pub reconnect_policy: RetryPolicy,
}

impl ConnectorSettings {
    pub fn from_config(config: &ConnectorConfig) -> Self {
        Self {
            open_timeout: Duration::from_secs(config.open_timeout_secs),
            open_policy: RetryPolicy::from_millis(config.open_attempts, &config.open_backoff_ms),
            idle_window: Duration::from_secs(config.idle_timeout_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            reconnect_policy: RetryPolicy::from_millis(
                config.reconnect_attempts,
                &config.reconnect_backoff_ms,
            ),
        }
    }
}

struct ConnectionEntry {
    link: Arc<dyn TransportLink>,
    /// Unix millis of the last `acquire`, for the idle sweep.
    last_used: AtomicI64,
}

impl ConnectionEntry {
    fn touch(&self) {
        self.last_used.store(now_millis(), Ordering::Relaxed);
    }
}

struct ManagerInner {
    registry: DashMap<SessionId, ConnectionEntry>,
    /// Per-session creation locks: concurrent acquires for one id race on
    /// this gate instead of racing to open two connections.
    creating: DashMap<SessionId, Arc<Mutex<()>>>,
    transport: Arc<dyn Transport>,
    db: Database,
    credentials: Arc<CredentialStore>,
    saver: CredentialSaver,
    router: EventRouter,
    settings: ConnectorSettings,
    cancel: CancellationToken,
}

/// Owns the registry of live connections and drives the session state
/// machine from connection events.
///
/// Cheap to clone; every clone shares the same registry. Injected by
/// value wherever connection access is needed.
#[derive(Clone)]
pub struct SessionConnectionManager {
    inner: Arc<ManagerInner>,
}

impl SessionConnectionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        db: Database,
        credentials: Arc<CredentialStore>,
        saver: CredentialSaver,
        router: EventRouter,
        settings: ConnectorSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry: DashMap::new(),
                creating: DashMap::new(),
                transport,
                db,
                credentials,
                saver,
                router,
                settings,
                cancel,
            }),
        }
    }

    /// Returns the live link for a session, opening one if needed.
    ///
    /// The fast path marks the existing link recently used. The slow path
    /// holds the per-session creation lock, re-checks the registry, then
    /// loads credentials and opens a connection under the configured
    /// timeout and retry cap. At most one link ever exists per session.
    pub async fn acquire(&self, id: &SessionId) -> Result<Arc<dyn TransportLink>, WaygateError> {
        if let Some(entry) = self.inner.registry.get(id) {
            entry.touch();
            return Ok(entry.link.clone());
        }

        let gate = {
            let entry = self
                .inner
                .creating
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())));
            entry.clone()
        };
        let _guard = gate.lock().await;

        // Someone else may have finished opening while we waited.
        if let Some(entry) = self.inner.registry.get(id) {
            entry.touch();
            return Ok(entry.link.clone());
        }

        self.open_and_register(id).await
    }

    /// Closes and evicts the session's link, whether idle or active.
    /// Idempotent; a missing entry is a no-op.
    pub async fn release(&self, id: &SessionId) {
        if let Some((_, entry)) = self.inner.registry.remove(id) {
            if let Err(e) = entry.link.close().await {
                warn!(session = %id, error = %e, "error closing link on release");
            }
            info!(session = %id, "connection released");
        }
    }

    /// Number of live links in the registry.
    pub fn live_connections(&self) -> usize {
        self.inner.registry.len()
    }

    /// Closes every live link. Used on graceful shutdown.
    pub async fn shutdown(&self) {
        let ids: Vec<SessionId> = self.inner.registry.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.release(&id).await;
        }
    }

    async fn open_and_register(
        &self,
        id: &SessionId,
    ) -> Result<Arc<dyn TransportLink>, WaygateError> {
        let credentials = self.inner.credentials.load(id).await?;
        let session = self.open_with_retries(id, credentials).await?;

        let TransportSession { link, events } = session;
        let entry = ConnectionEntry {
            link: link.clone(),
            last_used: AtomicI64::new(now_millis()),
        };
        self.inner.registry.insert(id.clone(), entry);
        self.spawn_pump(id.clone(), link.clone(), events);
        info!(session = %id, "connection opened");
        Ok(link)
    }

    async fn open_with_retries(
        &self,
        id: &SessionId,
        credentials: Credentials,
    ) -> Result<TransportSession, WaygateError> {
        let mut attempt: u32 = 1;
        loop {
            let outcome = tokio::time::timeout(
                self.inner.settings.open_timeout,
                self.inner.transport.open(id, credentials.clone()),
            )
            .await;

            let failure = match outcome {
                Ok(Ok(session)) => return Ok(session),
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!(
                    "handshake timed out after {:?}",
                    self.inner.settings.open_timeout
                ),
            };

            match self.inner.settings.open_policy.backoff_after(attempt) {
                Some(delay) => {
                    warn!(session = %id, attempt, failure = %failure, "connection open failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    return Err(WaygateError::ConnectionUnavailable {
                        session: id.0.clone(),
                        message: failure,
                    });
                }
            }
        }
    }

    fn spawn_pump(
        &self,
        id: SessionId,
        link: Arc<dyn TransportLink>,
        mut events: mpsc::Receiver<LinkEvent>,
    ) {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let is_close = matches!(event, LinkEvent::Closed { .. });
                manager.handle_event(&id, &link, event).await;
                if is_close {
                    break;
                }
            }
            debug!(session = %id, "event pump ended");
        });
    }

    async fn handle_event(&self, id: &SessionId, link: &Arc<dyn TransportLink>, event: LinkEvent) {
        match event {
            LinkEvent::PairingChallenge { value, ttl } => {
                let expires_at = (chrono::Utc::now()
                    + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(60)))
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string();
                if let Err(e) =
                    sessions::set_qr_challenge(&self.inner.db, id, &value, &expires_at).await
                {
                    error!(session = %id, error = %e, "failed to persist pairing challenge");
                } else {
                    info!(session = %id, "pairing challenge issued");
                }
            }
            LinkEvent::Opened { identity } => {
                if let Err(e) = sessions::set_paired(&self.inner.db, id, &identity).await {
                    error!(session = %id, error = %e, "failed to persist pairing");
                } else {
                    info!(session = %id, identity = %identity, "session paired and connected");
                }
            }
            LinkEvent::CredentialsUpdated(credentials) => {
                self.inner.saver.request_save(id.clone(), credentials).await;
            }
            LinkEvent::MessageReceived(envelope) => {
                if let Err(e) = self.inner.router.route(id, envelope).await {
                    // Already logged at the failure site; keep the pump alive.
                    debug!(session = %id, error = %e, "inbound event dropped");
                }
            }
            LinkEvent::Closed { reason } => {
                self.handle_close(id, link, reason).await;
            }
        }
    }

    async fn handle_close(
        &self,
        id: &SessionId,
        link: &Arc<dyn TransportLink>,
        reason: CloseReason,
    ) {
        // A deliberate release/eviction removes the entry before closing the
        // link, so an organic close is one where the registry still points
        // at this very link.
        let organic = self
            .inner
            .registry
            .get(id)
            .map(|entry| Arc::ptr_eq(&entry.link, link))
            .unwrap_or(false);
        if !organic {
            debug!(session = %id, "close after deliberate eviction");
            return;
        }
        self.inner.registry.remove(id);

        if reason.is_terminal() {
            info!(session = %id, "remote sign-out, erasing credentials");
            if let Err(e) = self.inner.credentials.erase(id).await {
                error!(session = %id, error = %e, "failed to erase credentials");
            }
            if let Err(e) = sessions::set_status(&self.inner.db, id, SessionStatus::LoggedOut).await
            {
                error!(session = %id, error = %e, "failed to mark session logged out");
            }
        } else {
            warn!(session = %id, ?reason, "connection closed, scheduling reconnect");
            if let Err(e) = sessions::set_status(&self.inner.db, id, SessionStatus::Pending).await {
                error!(session = %id, error = %e, "failed to mark session pending");
            }
            self.spawn_reconnect(id.clone());
        }
    }

    fn spawn_reconnect(&self, id: SessionId) {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut attempt: u32 = 1;
            loop {
                if manager.inner.cancel.is_cancelled() {
                    return;
                }
                // Only reconnect while the session still wants it; an
                // external teardown or a terminal logout in the meantime
                // ends the loop.
                match sessions::get_session(&manager.inner.db, &id).await {
                    Ok(Some(session)) if session.status == SessionStatus::Pending => {}
                    _ => {
                        debug!(session = %id, "reconnect abandoned");
                        return;
                    }
                }

                match manager.acquire(&id).await {
                    Ok(_) => {
                        info!(session = %id, attempt, "reconnected");
                        return;
                    }
                    Err(e) => {
                        match manager.inner.settings.reconnect_policy.backoff_after(attempt) {
                            Some(delay) => {
                                warn!(session = %id, error = %e, attempt, "reconnect attempt failed");
                                tokio::select! {
                                    _ = tokio::time::sleep(delay) => {}
                                    _ = manager.inner.cancel.cancelled() => return,
                                }
                                attempt += 1;
                            }
                            None => {
                                error!(session = %id, error = %e, "reconnect attempts exhausted");
                                return;
                            }
                        }
                    }
                }
            }
        });
    }

    /// Periodically evicts links unused longer than the idle window.
    /// Eviction never changes session status; a later `acquire` re-opens
    /// from the persisted credentials.
    pub fn spawn_idle_sweep(&self) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.inner.settings.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let cutoff =
                            now_millis() - manager.inner.settings.idle_window.as_millis() as i64;
                        let stale: Vec<SessionId> = manager
                            .inner
                            .registry
                            .iter()
                            .filter(|entry| {
                                entry.value().last_used.load(Ordering::Relaxed) < cutoff
                            })
                            .map(|entry| entry.key().clone())
                            .collect();
                        for id in stale {
                            debug!(session = %id, "evicting idle connection");
                            manager.release(&id).await;
                        }
                    }
                    _ = manager.inner.cancel.cancelled() => break,
                }
            }
        })
    }

    /// Reacts to store changes from the external layer: a freshly created
    /// session is brought up, a session set to `disconnected` is torn down.
    pub fn spawn_store_listener(&self) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        let mut rx = manager.inner.db.events().subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = manager.inner.cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(StoreEvent::SessionCreated { session_id }) => {
                            let m = manager.clone();
                            tokio::spawn(async move {
                                if let Err(e) = m.acquire(&session_id).await {
                                    warn!(session = %session_id, error = %e, "could not start new session");
                                }
                            });
                        }
                        Ok(StoreEvent::SessionStatusChanged { session_id, status })
                            if status == SessionStatus::Disconnected =>
                        {
                            manager.release(&session_id).await;
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "store event stream lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        })
    }

    /// Brings every restorable session back up after a process restart.
    ///
    /// Sessions left in `qr_ready` restart as `pending`: their challenge
    /// belonged to a connection that no longer exists.
    pub async fn restore_sessions(&self) -> Result<usize, WaygateError> {
        let restorable = sessions::restorable_sessions(&self.inner.db).await?;
        let count = restorable.len();
        info!(count, "restoring sessions");

        for session in restorable {
            if session.status == SessionStatus::QrReady {
                sessions::set_status(&self.inner.db, &session.id, SessionStatus::Pending).await?;
            }
            let manager = self.clone();
            let id = session.id.clone();
            tokio::spawn(async move {
                if let Err(e) = manager.acquire(&id).await {
                    warn!(session = %id, error = %e, "restore failed, waiting for external poll");
                }
            });
        }
        Ok(count)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
