// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound queue processor.
//!
//! Watches the store change feed for newly queued outbound messages and
//! pushes each through the session's live link. A session that is not
//! `connected` fails the message immediately -- sending never starts a
//! pairing flow. No retry happens at this layer; re-submission is the
//! queue producer's responsibility.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use waygate_core::{DeliveryStatus, SessionStatus, TransportLink as _, WaygateError};
use waygate_storage::queries::{messages, sessions};
use waygate_storage::{Database, MessageRecord, StoreEvent};

use crate::manager::SessionConnectionManager;

/// Background task processing queued outbound messages.
pub struct OutboundProcessor {
    db: Database,
    manager: SessionConnectionManager,
    cancel: CancellationToken,
}

impl OutboundProcessor {
    pub fn new(
        db: Database,
        manager: SessionConnectionManager,
        cancel: CancellationToken,
    ) -> Self {
        Self { db, manager, cancel }
    }

    /// Spawns the processor task.
    ///
    /// On startup it first drains messages queued while the process was
    /// down, then follows the change feed. A lagged feed triggers another
    /// drain so nothing queued during the gap is missed.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut rx = self.db.events().subscribe();

            if let Err(e) = self.drain_pending().await {
                error!(error = %e, "initial outbound drain failed");
            }

            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(StoreEvent::OutboundQueued { message_id, .. }) => {
                            match messages::get_message(&self.db, &message_id).await {
                                Ok(Some(record)) if record.status == DeliveryStatus::Pending => {
                                    self.process(record).await;
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    error!(message = %message_id, error = %e, "failed to load queued message");
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "outbound feed lagged, re-draining queue");
                            if let Err(e) = self.drain_pending().await {
                                error!(error = %e, "outbound re-drain failed");
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        })
    }

    async fn drain_pending(&self) -> Result<(), WaygateError> {
        for record in messages::pending_outbound(&self.db).await? {
            self.process(record).await;
        }
        Ok(())
    }

    async fn process(&self, record: MessageRecord) {
        let session = match sessions::get_session(&self.db, &record.session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                self.fail(&record, "session not found").await;
                return;
            }
            Err(e) => {
                error!(message = %record.id, error = %e, "failed to load session for outbound");
                return;
            }
        };

        if session.status != SessionStatus::Connected {
            warn!(
                session = %record.session_id,
                message = %record.id,
                status = %session.status,
                "outbound message for unconnected session"
            );
            self.fail(&record, "session not connected").await;
            return;
        }

        let link = match self.manager.acquire(&record.session_id).await {
            Ok(link) => link,
            Err(e) => {
                self.fail(&record, &e.to_string()).await;
                return;
            }
        };

        match link.send(&record.peer, &outbound_text(&record)).await {
            Ok(protocol_id) => {
                if let Err(e) = messages::mark_sent(&self.db, &record.id, &protocol_id.0).await {
                    error!(message = %record.id, error = %e, "failed to mark message sent");
                } else {
                    info!(
                        session = %record.session_id,
                        message = %record.id,
                        protocol_id = %protocol_id,
                        "outbound message sent"
                    );
                }
            }
            Err(e) => {
                self.fail(&record, &e.to_string()).await;
            }
        }
    }

    async fn fail(&self, record: &MessageRecord, reason: &str) {
        if let Err(e) = messages::mark_failed(&self.db, &record.id, reason).await {
            error!(message = %record.id, error = %e, "failed to mark message failed");
        }
    }
}

/// The text payload of a queued outbound message: `{"text": "..."}`.
fn outbound_text(record: &MessageRecord) -> String {
    serde_json::from_str::<serde_json::Value>(&record.payload)
        .ok()
        .and_then(|value| {
            value
                .get("text")
                .and_then(|text| text.as_str())
                .map(str::to_string)
        })
        .unwrap_or_default()
}
