// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities and their rusqlite mappings.

use std::str::FromStr;

use waygate_core::{DeliveryStatus, Direction, MessageId, MessageKind, SessionId, SessionStatus};

/// One user-registered messaging identity and its lifecycle state.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub user_id: String,
    /// User-facing label, unique per owner; echoed into webhook payloads.
    pub name: String,
    pub status: SessionStatus,
    /// Transient pairing token, present only while `status == qr_ready`.
    pub qr_challenge: Option<String>,
    pub qr_expires_at: Option<String>,
    pub callback_url: Option<String>,
    /// Populated once pairing completes.
    pub phone_number: Option<String>,
    pub created_at: String,
    pub last_active: String,
}

impl Session {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: SessionId(row.get(0)?),
            user_id: row.get(1)?,
            name: row.get(2)?,
            status: parse_col(3, row.get::<_, String>(3)?)?,
            qr_challenge: row.get(4)?,
            qr_expires_at: row.get(5)?,
            callback_url: row.get(6)?,
            phone_number: row.get(7)?,
            created_at: row.get(8)?,
            last_active: row.get(9)?,
        })
    }
}

/// Column list matching [`Session::from_row`].
pub(crate) const SESSION_COLUMNS: &str = "id, user_id, name, status, qr_challenge, \
     qr_expires_at, webhook_url, phone_number, created_at, last_active";

/// One message crossing the gateway boundary, inbound or outbound.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: MessageId,
    pub session_id: SessionId,
    pub direction: Direction,
    pub kind: MessageKind,
    /// Remote peer number (destination for outbound, sender for inbound).
    pub peer: String,
    /// JSON payload: the queued content for outbound, the raw envelope for
    /// inbound.
    pub payload: String,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    /// Id assigned by the protocol layer once an outbound send is accepted.
    pub protocol_message_id: Option<String>,
    /// Whether a webhook delivery for this inbound event got a 2xx.
    pub webhook_acked: bool,
    pub created_at: String,
}

impl MessageRecord {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: MessageId(row.get(0)?),
            session_id: SessionId(row.get(1)?),
            direction: parse_col(2, row.get::<_, String>(2)?)?,
            kind: parse_col(3, row.get::<_, String>(3)?)?,
            peer: row.get(4)?,
            payload: row.get(5)?,
            status: parse_col(6, row.get::<_, String>(6)?)?,
            error_message: row.get(7)?,
            protocol_message_id: row.get(8)?,
            webhook_acked: row.get::<_, i64>(9)? != 0,
            created_at: row.get(10)?,
        })
    }
}

pub(crate) const MESSAGE_COLUMNS: &str = "id, session_id, direction, kind, peer, payload, \
     status, error_message, protocol_message_id, webhook_acked, created_at";

/// One recorded webhook POST attempt (append-only).
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    pub id: i64,
    pub message_id: MessageId,
    pub session_id: SessionId,
    pub url: String,
    pub attempt: u32,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
}

impl DeliveryAttempt {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            message_id: MessageId(row.get(1)?),
            session_id: SessionId(row.get(2)?),
            url: row.get(3)?,
            attempt: row.get(4)?,
            status_code: row.get(5)?,
            response_body: row.get(6)?,
            error: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

/// Attempt data as recorded by the dispatcher (id and timestamp are
/// assigned by the insert).
#[derive(Debug, Clone)]
pub struct NewDeliveryAttempt {
    pub message_id: MessageId,
    pub session_id: SessionId,
    pub url: String,
    pub attempt: u32,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub error: Option<String>,
}

/// Parse a TEXT column into an enum, reporting failures as conversion
/// errors on the column index.
fn parse_col<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
