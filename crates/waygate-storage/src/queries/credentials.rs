// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sealed credential blob storage.
//!
//! The blob is opaque ciphertext produced by `waygate-credentials`; this
//! module only moves bytes. The upsert is a single statement on the single
//! writer thread, so a crash between two saves always leaves the previous
//! complete blob in place -- readers never observe a half-written value.

use rusqlite::params;
use waygate_core::{SessionId, WaygateError, utc_now_iso};

use crate::database::{Database, map_tr_err};

/// Fetch the sealed blob for a session, if one was ever saved.
pub async fn load_credential_blob(
    db: &Database,
    session: &SessionId,
) -> Result<Option<Vec<u8>>, WaygateError> {
    let sid = session.0.clone();
    db.connection()
        .call(move |conn| {
            match conn.query_row(
                "SELECT sealed FROM session_credentials WHERE session_id = ?1",
                params![sid],
                |row| row.get::<_, Vec<u8>>(0),
            ) {
                Ok(blob) => Ok(Some(blob)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite the sealed blob for a session (insert on first save).
pub async fn store_credential_blob(
    db: &Database,
    session: &SessionId,
    sealed: Vec<u8>,
) -> Result<(), WaygateError> {
    let sid = session.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO session_credentials (session_id, sealed, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id) DO UPDATE SET sealed = ?2, updated_at = ?3",
                params![sid, sealed, utc_now_iso()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Remove the blob entirely (terminal logout).
pub async fn delete_credential_blob(
    db: &Database,
    session: &SessionId,
) -> Result<(), WaygateError> {
    let sid = session.0.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM session_credentials WHERE session_id = ?1",
                params![sid],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Session;
    use crate::queries::quota::create_user;
    use crate::queries::sessions::create_session;
    use tempfile::tempdir;
    use waygate_core::SessionStatus;

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
                status: SessionStatus::Pending,
                qr_challenge: None,
                qr_expires_at: None,
                callback_url: None,
                phone_number: None,
                created_at: utc_now_iso(),
                last_active: utc_now_iso(),
            },
        )
        .await
        .unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn blob_round_trips_binary_content() {
        let (db, _dir) = setup_db().await;
        let sid = SessionId("s-1".into());
        let blob: Vec<u8> = (0..=255).collect();

        store_credential_blob(&db, &sid, blob.clone()).await.unwrap();
        let loaded = load_credential_blob(&db, &sid).await.unwrap();
        assert_eq!(loaded, Some(blob));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn second_save_overwrites_first() {
        let (db, _dir) = setup_db().await;
        let sid = SessionId("s-1".into());

        store_credential_blob(&db, &sid, vec![1, 2, 3]).await.unwrap();
        store_credential_blob(&db, &sid, vec![9, 9]).await.unwrap();

        let loaded = load_credential_blob(&db, &sid).await.unwrap();
        assert_eq!(loaded, Some(vec![9, 9]));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_then_load_returns_none() {
        let (db, _dir) = setup_db().await;
        let sid = SessionId("s-1".into());

        store_credential_blob(&db, &sid, vec![1]).await.unwrap();
        delete_credential_blob(&db, &sid).await.unwrap();
        assert!(load_credential_blob(&db, &sid).await.unwrap().is_none());

        // Deleting again is harmless.
        delete_credential_blob(&db, &sid).await.unwrap();
        db.close().await.unwrap();
    }
}
