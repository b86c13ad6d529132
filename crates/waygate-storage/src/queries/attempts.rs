// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook delivery attempt log. Append-only: rows are inserted by the
//! dispatcher and read for diagnostics, never mutated.

use rusqlite::params;
use waygate_core::{MessageId, WaygateError, utc_now_iso};

use crate::database::{Database, map_tr_err};
use crate::models::{DeliveryAttempt, NewDeliveryAttempt};

/// Append one attempt record. Returns the assigned row id.
pub async fn record_attempt(
    db: &Database,
    attempt: &NewDeliveryAttempt,
) -> Result<i64, WaygateError> {
    let a = attempt.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO delivery_attempts
                    (message_id, session_id, url, attempt, status_code, response_body, error,
                     created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    a.message_id.0,
                    a.session_id.0,
                    a.url,
                    a.attempt,
                    a.status_code,
                    a.response_body,
                    a.error,
                    utc_now_iso(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// All attempts recorded for one message, in attempt order.
pub async fn attempts_for_message(
    db: &Database,
    message_id: &MessageId,
) -> Result<Vec<DeliveryAttempt>, WaygateError> {
    let mid = message_id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message_id, session_id, url, attempt, status_code, response_body,
                        error, created_at
                 FROM delivery_attempts WHERE message_id = ?1 ORDER BY attempt ASC",
            )?;
            let rows = stmt.query_map(params![mid], DeliveryAttempt::from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageRecord, Session};
    use crate::queries::messages::insert_message;
    use crate::queries::quota::create_user;
    use crate::queries::sessions::create_session;
    use tempfile::tempdir;
    use waygate_core::{
        DeliveryStatus, Direction, MessageKind, SessionId, SessionStatus,
    };

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        create_user(&db, "user-1", 100).await.unwrap();
        create_session(
            &db,
            &Session {
                id: SessionId("s-1".into()),
                user_id: "user-1".into(),
                name: "main".into(),
                status: SessionStatus::Connected,
                qr_challenge: None,
                qr_expires_at: None,
                callback_url: Some("https://example.test/hook".into()),
                phone_number: None,
                created_at: utc_now_iso(),
                last_active: utc_now_iso(),
            },
        )
        .await
        .unwrap();
        insert_message(
            &db,
            &MessageRecord {
                id: MessageId("m-1".into()),
                session_id: SessionId("s-1".into()),
                direction: Direction::In,
                kind: MessageKind::Text,
                peer: "15559990000".into(),
                payload: "{}".into(),
                status: DeliveryStatus::Delivered,
                error_message: None,
                protocol_message_id: None,
                webhook_acked: false,
                created_at: utc_now_iso(),
            },
        )
        .await
        .unwrap();
        (db, dir)
    }

    fn attempt(n: u32, status: Option<u16>, error: Option<&str>) -> NewDeliveryAttempt {
        NewDeliveryAttempt {
            message_id: MessageId("m-1".into()),
            session_id: SessionId("s-1".into()),
            url: "https://example.test/hook".into(),
            attempt: n,
            status_code: status,
            response_body: status.map(|_| "ok".to_string()),
            error: error.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn attempts_accumulate_in_order() {
        let (db, _dir) = setup_db().await;

        record_attempt(&db, &attempt(1, Some(500), None)).await.unwrap();
        record_attempt(&db, &attempt(2, None, Some("connection refused")))
            .await
            .unwrap();
        record_attempt(&db, &attempt(3, Some(200), None)).await.unwrap();

        let attempts = attempts_for_message(&db, &MessageId("m-1".into()))
            .await
            .unwrap();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0].attempt, 1);
        assert_eq!(attempts[0].status_code, Some(500));
        assert_eq!(attempts[1].error.as_deref(), Some("connection refused"));
        assert!(attempts[1].status_code.is_none());
        assert_eq!(attempts[2].status_code, Some(200));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn no_attempts_is_empty_not_error() {
        let (db, _dir) = setup_db().await;
        let attempts = attempts_for_message(&db, &MessageId("m-none".into()))
            .await
            .unwrap();
        assert!(attempts.is_empty());
        db.close().await.unwrap();
    }
}
