// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session row operations.
//!
//! Updates are deliberately narrow: each function touches only the columns
//! its calling task owns, so concurrent tasks mutating the same session
//! (event pump, outbound processor, idle sweep) cannot lose each other's
//! writes.

use rusqlite::params;
use waygate_core::{SessionId, SessionStatus, WaygateError, utc_now_iso};

use crate::database::{Database, map_tr_err};
use crate::events::StoreEvent;
use crate::models::{SESSION_COLUMNS, Session};

/// Insert a new session row and announce it on the change feed.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), WaygateError> {
    let s = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, name, status, qr_challenge, qr_expires_at,
                                       webhook_url, phone_number, created_at, last_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    s.id.0,
                    s.user_id,
                    s.name,
                    s.status.to_string(),
                    s.qr_challenge,
                    s.qr_expires_at,
                    s.callback_url,
                    s.phone_number,
                    s.created_at,
                    s.last_active,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

    db.events().publish(StoreEvent::SessionCreated {
        session_id: session.id.clone(),
    });
    Ok(())
}

/// Fetch a session by id.
pub async fn get_session(db: &Database, id: &SessionId) -> Result<Option<Session>, WaygateError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            match stmt.query_row(params![id], Session::from_row) {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List sessions, optionally filtered by status.
pub async fn list_sessions(
    db: &Database,
    status: Option<SessionStatus>,
) -> Result<Vec<Session>, WaygateError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let (sql, args) = match &status {
                Some(filter) => (
                    format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions WHERE status = ?1
                         ORDER BY created_at DESC"
                    ),
                    vec![filter.clone()],
                ),
                None => (
                    format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC"),
                    Vec::new(),
                ),
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(args), Session::from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Sessions to bring back up after a process restart: everything except
/// terminal logouts and externally requested teardowns.
pub async fn restorable_sessions(db: &Database) -> Result<Vec<Session>, WaygateError> {
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE status NOT IN ('logged_out', 'disconnected')
                 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], Session::from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Update only the status column and announce the change.
pub async fn set_status(
    db: &Database,
    id: &SessionId,
    status: SessionStatus,
) -> Result<(), WaygateError> {
    let sid = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET status = ?1 WHERE id = ?2",
                params![status.to_string(), sid],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

    db.events().publish(StoreEvent::SessionStatusChanged {
        session_id: id.clone(),
        status,
    });
    Ok(())
}

/// Record a fresh pairing challenge: challenge value, expiry, and the
/// `qr_ready` status in one write.
pub async fn set_qr_challenge(
    db: &Database,
    id: &SessionId,
    challenge: &str,
    expires_at: &str,
) -> Result<(), WaygateError> {
    let sid = id.0.clone();
    let challenge = challenge.to_string();
    let expires_at = expires_at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET qr_challenge = ?1, qr_expires_at = ?2, status = 'qr_ready'
                 WHERE id = ?3",
                params![challenge, expires_at, sid],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

    db.events().publish(StoreEvent::SessionStatusChanged {
        session_id: id.clone(),
        status: SessionStatus::QrReady,
    });
    Ok(())
}

/// Record a completed pairing: phone identity set, challenge cleared,
/// status `connected`.
pub async fn set_paired(
    db: &Database,
    id: &SessionId,
    phone_number: &str,
) -> Result<(), WaygateError> {
    let sid = id.0.clone();
    let phone = phone_number.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET status = 'connected', qr_challenge = NULL,
                        qr_expires_at = NULL, phone_number = ?1, last_active = ?2
                 WHERE id = ?3",
                params![phone, utc_now_iso(), sid],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

    db.events().publish(StoreEvent::SessionStatusChanged {
        session_id: id.clone(),
        status: SessionStatus::Connected,
    });
    Ok(())
}

/// Bump `last_active` only.
pub async fn touch_last_active(db: &Database, id: &SessionId) -> Result<(), WaygateError> {
    let sid = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET last_active = ?1 WHERE id = ?2",
                params![utc_now_iso(), sid],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Set or clear the callback URL for webhook delivery.
pub async fn set_callback_url(
    db: &Database,
    id: &SessionId,
    url: Option<&str>,
) -> Result<(), WaygateError> {
    let sid = id.0.clone();
    let url = url.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET webhook_url = ?1 WHERE id = ?2",
                params![url, sid],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::quota::create_user;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        create_user(&db, "user-1", 100).await.unwrap();
        (db, dir)
    }

    fn make_session(id: &str) -> Session {
        Session {
            id: SessionId(id.to_string()),
            user_id: "user-1".to_string(),
            name: format!("label-{id}"),
            status: SessionStatus::Pending,
            qr_challenge: None,
            qr_expires_at: None,
            callback_url: None,
            phone_number: None,
            created_at: utc_now_iso(),
            last_active: utc_now_iso(),
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let (db, _dir) = setup_db().await;
        create_session(&db, &make_session("s-1")).await.unwrap();

        let session = get_session(&db, &SessionId("s-1".into())).await.unwrap();
        let session = session.unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.status, SessionStatus::Pending);
        assert!(session.qr_challenge.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_session_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(
            get_session(&db, &SessionId("ghost".into()))
                .await
                .unwrap()
                .is_none()
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn qr_challenge_then_paired_clears_challenge() {
        let (db, _dir) = setup_db().await;
        let id = SessionId("s-qr".into());
        create_session(&db, &make_session("s-qr")).await.unwrap();

        set_qr_challenge(&db, &id, "XYZ", "2026-01-01T00:01:00.000Z")
            .await
            .unwrap();
        let s = get_session(&db, &id).await.unwrap().unwrap();
        assert_eq!(s.status, SessionStatus::QrReady);
        assert_eq!(s.qr_challenge.as_deref(), Some("XYZ"));

        set_paired(&db, &id, "15551230000").await.unwrap();
        let s = get_session(&db, &id).await.unwrap().unwrap();
        assert_eq!(s.status, SessionStatus::Connected);
        assert!(s.qr_challenge.is_none());
        assert!(s.qr_expires_at.is_none());
        assert_eq!(s.phone_number.as_deref(), Some("15551230000"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_changes_are_published() {
        let (db, _dir) = setup_db().await;
        let id = SessionId("s-ev".into());
        create_session(&db, &make_session("s-ev")).await.unwrap();

        let mut rx = db.events().subscribe();
        set_status(&db, &id, SessionStatus::Disconnected).await.unwrap();

        match rx.recv().await.unwrap() {
            StoreEvent::SessionStatusChanged { session_id, status } => {
                assert_eq!(session_id, id);
                assert_eq!(status, SessionStatus::Disconnected);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn restorable_excludes_terminal_states() {
        let (db, _dir) = setup_db().await;
        for id in ["s-a", "s-b", "s-c"] {
            create_session(&db, &make_session(id)).await.unwrap();
        }
        set_status(&db, &SessionId("s-b".into()), SessionStatus::LoggedOut)
            .await
            .unwrap();
        set_status(&db, &SessionId("s-c".into()), SessionStatus::Disconnected)
            .await
            .unwrap();

        let restorable = restorable_sessions(&db).await.unwrap();
        assert_eq!(restorable.len(), 1);
        assert_eq!(restorable[0].id.0, "s-a");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_sessions_filters_by_status() {
        let (db, _dir) = setup_db().await;
        create_session(&db, &make_session("s-1")).await.unwrap();
        create_session(&db, &make_session("s-2")).await.unwrap();
        set_status(&db, &SessionId("s-2".into()), SessionStatus::Connected)
            .await
            .unwrap();

        let all = list_sessions(&db, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let connected = list_sessions(&db, Some(SessionStatus::Connected))
            .await
            .unwrap();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].id.0, "s-2");
        db.close().await.unwrap();
    }
}
