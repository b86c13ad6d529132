// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coalescing background saver for high-frequency credential updates.
//!
//! The protocol layer can request a save on every key rotation, which
//! under load means many requests per second per session. The saver
//! collects requests in a map keyed by session and flushes on a fixed
//! interval, so the last write in a window wins and each flush is one
//! storage write per dirty session. A failed flush is logged and the next
//! window retries nothing -- the following credential update will carry the
//! newest state anyway.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use waygate_core::{Credentials, SessionId};

use crate::store::CredentialStore;

const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Handle for submitting credential save requests to the background saver.
#[derive(Clone)]
pub struct CredentialSaver {
    tx: mpsc::Sender<(SessionId, Credentials)>,
}

impl CredentialSaver {
    /// Queue the newest credential state for a session. Supersedes any
    /// not-yet-flushed state for the same session.
    pub async fn request_save(&self, session: SessionId, credentials: Credentials) {
        if self.tx.send((session, credentials)).await.is_err() {
            warn!("credential saver is gone, dropping save request");
        }
    }
}

/// Spawn the saver task. Pending state is flushed every `window`, and once
/// more on cancellation so shutdown loses nothing.
pub fn spawn_saver(
    store: Arc<CredentialStore>,
    window: Duration,
    cancel: CancellationToken,
) -> CredentialSaver {
    let (tx, mut rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut pending: HashMap<SessionId, Credentials> = HashMap::new();
        let mut ticker = tokio::time::interval(window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of an interval resolves immediately; consume it so
        // the first burst gets a full coalescing window.
        ticker.tick().await;

        loop {
            tokio::select! {
                request = rx.recv() => match request {
                    Some((session, credentials)) => {
                        pending.insert(session, credentials);
                    }
                    None => break,
                },
                _ = ticker.tick(), if !pending.is_empty() => {
                    flush(&store, &mut pending).await;
                }
                _ = cancel.cancelled() => break,
            }
        }

        flush(&store, &mut pending).await;
        debug!("credential saver stopped");
    });

    CredentialSaver { tx }
}

async fn flush(store: &CredentialStore, pending: &mut HashMap<SessionId, Credentials>) {
    for (session, credentials) in pending.drain() {
        if let Err(e) = store.save(&session, &credentials).await {
            warn!(session = %session, error = %e, "credential flush failed");
        }
    }
}
