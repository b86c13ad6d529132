// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change-notification hub for the durable store.
//!
//! Query functions publish a [`StoreEvent`] after each successful write
//! that downstream tasks care about: the outbound processor wakes on
//! `OutboundQueued`, the connection manager on `SessionCreated` and
//! `SessionStatusChanged`. Semantics are plain `tokio::sync::broadcast`:
//! subscribers that fall behind see a `Lagged` error and are expected to
//! re-scan the tables they mirror.

use tokio::sync::broadcast;
use tracing::trace;
use waygate_core::{MessageId, SessionId, SessionStatus};

const CHANNEL_CAPACITY: usize = 256;

/// A change in the durable store worth waking subscribers for.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A new session row was inserted.
    SessionCreated { session_id: SessionId },
    /// A session's status column changed.
    SessionStatusChanged {
        session_id: SessionId,
        status: SessionStatus,
    },
    /// A new outbound message entered the queue with status `pending`.
    OutboundQueued {
        message_id: MessageId,
        session_id: SessionId,
    },
}

/// Broadcast hub carried by [`crate::Database`].
#[derive(Clone)]
pub struct StoreEvents {
    tx: broadcast::Sender<StoreEvent>,
}

impl StoreEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to all store events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: StoreEvent) {
        trace!(?event, "store event");
        let _ = self.tx.send(event);
    }
}

impl Default for StoreEvents {
    fn default() -> Self {
        Self::new()
    }
}
