// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classifies raw inbound protocol events, persists them, and hands them to
//! the webhook dispatcher.
//!
//! Filtering comes first: self-originated echoes, the status-broadcast
//! channel, and bodyless control frames never become records. Persistence
//! failure short-circuits dispatch -- no webhook fires for an event that
//! could not be recorded.

use std::sync::Arc;

use tracing::{debug, error, trace, warn};
use waygate_core::types::STATUS_BROADCAST;
use waygate_core::{
    DeliveryStatus, Direction, MessageId, MessageKind, RawBody, RawEnvelope, SessionId,
    WaygateError, utc_now_iso,
};
use waygate_storage::queries::messages;
use waygate_storage::{Database, MessageRecord};
use waygate_webhook::{WebhookDispatcher, WebhookMessage};

/// Consumes raw inbound events from one or more connections.
pub struct EventRouter {
    db: Database,
    dispatcher: Arc<WebhookDispatcher>,
}

impl EventRouter {
    pub fn new(db: Database, dispatcher: Arc<WebhookDispatcher>) -> Self {
        Self { db, dispatcher }
    }

    /// Processes one raw envelope for a session.
    ///
    /// Returns the id of the persisted record, or `None` when the event was
    /// filtered out. Webhook failures are absorbed here (the attempt log
    /// and the unacknowledged flag carry the outcome); only persistence
    /// failures propagate.
    pub async fn route(
        &self,
        session_id: &SessionId,
        envelope: RawEnvelope,
    ) -> Result<Option<MessageId>, WaygateError> {
        if envelope.from_self {
            trace!(session = %session_id, "ignoring self-originated echo");
            return Ok(None);
        }
        if envelope.sender == STATUS_BROADCAST {
            trace!(session = %session_id, "ignoring status broadcast");
            return Ok(None);
        }
        let Some(body) = &envelope.body else {
            trace!(session = %session_id, "ignoring bodyless control frame");
            return Ok(None);
        };

        let kind = classify(body);
        let text = extract_text(body);
        let peer = peer_number(&envelope.sender).to_string();

        let message_id = MessageId(uuid::Uuid::new_v4().to_string());
        let record = MessageRecord {
            id: message_id.clone(),
            session_id: session_id.clone(),
            direction: Direction::In,
            kind,
            peer: peer.clone(),
            payload: serde_json::to_string(&envelope)
                .map_err(|e| WaygateError::Internal(format!("envelope serialization: {e}")))?,
            status: DeliveryStatus::Delivered,
            error_message: None,
            protocol_message_id: Some(envelope.id.clone()),
            webhook_acked: false,
            created_at: utc_now_iso(),
        };

        if let Err(e) = messages::insert_message(&self.db, &record).await {
            error!(
                session = %session_id,
                error = %e,
                "failed to persist inbound event, skipping webhook"
            );
            return Err(e);
        }
        debug!(session = %session_id, message = %message_id, kind = %kind, "inbound event persisted");

        let webhook_message = WebhookMessage {
            id: envelope.id,
            from: peer,
            to: String::new(),
            kind: kind.to_string(),
            text,
            timestamp: envelope
                .timestamp
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string(),
        };
        if let Err(e) = self
            .dispatcher
            .dispatch(session_id, &message_id, webhook_message)
            .await
        {
            warn!(
                session = %session_id,
                message = %message_id,
                error = %e,
                "webhook delivery unsuccessful"
            );
        }

        Ok(Some(message_id))
    }
}

/// Classify the coarse message kind from the payload shape.
fn classify(body: &RawBody) -> MessageKind {
    if body.image.is_some() {
        MessageKind::Image
    } else if body.video.is_some() {
        MessageKind::Video
    } else if body.audio.is_some() {
        MessageKind::Audio
    } else if body.document.is_some() {
        MessageKind::Document
    } else if body.text.is_some() || body.extended_text.is_some() {
        MessageKind::Text
    } else {
        MessageKind::Unknown
    }
}

/// Best-effort text extraction: plain text, then extended text, then a
/// media caption, else empty.
fn extract_text(body: &RawBody) -> String {
    body.text
        .clone()
        .or_else(|| body.extended_text.clone())
        .or_else(|| body.image.as_ref().and_then(|m| m.caption.clone()))
        .or_else(|| body.video.as_ref().and_then(|m| m.caption.clone()))
        .or_else(|| body.document.as_ref().and_then(|m| m.caption.clone()))
        .unwrap_or_default()
}

/// The bare number part of a protocol address.
fn peer_number(sender: &str) -> &str {
    sender.split('@').next().unwrap_or(sender)
}
