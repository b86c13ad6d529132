// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message row operations for the inbound log and the outbound queue.

use rusqlite::params;
use waygate_core::{DeliveryStatus, Direction, MessageId, WaygateError};

use crate::database::{Database, map_tr_err};
use crate::events::StoreEvent;
use crate::models::{MESSAGE_COLUMNS, MessageRecord};

/// Insert a message row. Queued outbound messages (direction `out`, status
/// `pending`) are announced on the change feed so the outbound processor
/// wakes up.
pub async fn insert_message(db: &Database, record: &MessageRecord) -> Result<(), WaygateError> {
    let r = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, session_id, direction, kind, peer, payload, status,
                                       error_message, protocol_message_id, webhook_acked, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    r.id.0,
                    r.session_id.0,
                    r.direction.to_string(),
                    r.kind.to_string(),
                    r.peer,
                    r.payload,
                    r.status.to_string(),
                    r.error_message,
                    r.protocol_message_id,
                    r.webhook_acked as i64,
                    r.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

    if record.direction == Direction::Out && record.status == DeliveryStatus::Pending {
        db.events().publish(StoreEvent::OutboundQueued {
            message_id: record.id.clone(),
            session_id: record.session_id.clone(),
        });
    }
    Ok(())
}

/// Fetch a message by id.
pub async fn get_message(
    db: &Database,
    id: &MessageId,
) -> Result<Option<MessageRecord>, WaygateError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            match stmt.query_row(params![id], MessageRecord::from_row) {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// All messages for one session, oldest first.
pub async fn messages_for_session(
    db: &Database,
    session_id: &waygate_core::SessionId,
) -> Result<Vec<MessageRecord>, WaygateError> {
    let sid = session_id.0.clone();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE session_id = ?1
                 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![sid], MessageRecord::from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// All still-pending outbound messages, oldest first. Used to drain work
/// queued while the process was down or while the change feed lagged.
pub async fn pending_outbound(db: &Database) -> Result<Vec<MessageRecord>, WaygateError> {
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE direction = 'out' AND status = 'pending'
                 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], MessageRecord::from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Mark an outbound message accepted by the protocol layer.
pub async fn mark_sent(
    db: &Database,
    id: &MessageId,
    protocol_message_id: &str,
) -> Result<(), WaygateError> {
    let mid = id.0.clone();
    let pid = protocol_message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET status = 'sent', protocol_message_id = ?1,
                        error_message = NULL
                 WHERE id = ?2",
                params![pid, mid],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Mark an outbound message failed with a reason. Not retried here.
pub async fn mark_failed(db: &Database, id: &MessageId, error: &str) -> Result<(), WaygateError> {
    let mid = id.0.clone();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET status = 'failed', error_message = ?1 WHERE id = ?2",
                params![error, mid],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record that a webhook delivery for this inbound event succeeded.
pub async fn mark_webhook_acked(db: &Database, id: &MessageId) -> Result<(), WaygateError> {
    let mid = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET webhook_acked = 1 WHERE id = ?1",
                params![mid],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
