// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic daily rate counter primitive.
//!
//! The read-limit + increment + read-count sequence runs inside one
//! transaction on the single writer thread, so concurrent callers for the
//! same owner serialize and each observes a distinct post-increment count.

use rusqlite::params;
use waygate_core::WaygateError;

use crate::database::{Database, map_tr_err};

/// Insert an account row with its daily send quota. Owned by the external
/// account layer in production; exercised directly by tests and tooling.
pub async fn create_user(db: &Database, id: &str, daily_limit: i64) -> Result<(), WaygateError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, daily_limit) VALUES (?1, ?2)",
                params![id, daily_limit],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically increment the owner's counter for `day` and return the
/// post-increment count together with the configured limit.
///
/// Returns `None` when the owner is unknown (callers fail closed).
pub async fn increment_and_read(
    db: &Database,
    user_id: &str,
    day: &str,
) -> Result<Option<(i64, i64)>, WaygateError> {
    let user_id = user_id.to_string();
    let day = day.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let limit = match tx.query_row(
                "SELECT daily_limit FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get::<_, i64>(0),
            ) {
                Ok(limit) => limit,
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };

            let count: i64 = tx.query_row(
                "INSERT INTO rate_counters (user_id, day, count) VALUES (?1, ?2, 1)
                 ON CONFLICT(user_id, day) DO UPDATE SET count = count + 1
                 RETURNING count",
                params![user_id, day],
                |row| row.get(0),
            )?;

            tx.commit()?;
            Ok(Some((count, limit)))
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn counter_is_monotonic_within_a_day() {
        let (db, _dir) = setup_db().await;
        create_user(&db, "u-1", 5).await.unwrap();

        for expected in 1..=4 {
            let (count, limit) = increment_and_read(&db, "u-1", "2026-03-01")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(count, expected);
            assert_eq!(limit, 5);
        }
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn days_count_independently() {
        let (db, _dir) = setup_db().await;
        create_user(&db, "u-1", 5).await.unwrap();

        increment_and_read(&db, "u-1", "2026-03-01").await.unwrap();
        let (count, _) = increment_and_read(&db, "u-1", "2026-03-02")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(count, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_owner_returns_none() {
        let (db, _dir) = setup_db().await;
        let result = increment_and_read(&db, "ghost", "2026-03-01").await.unwrap();
        assert!(result.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_increments_never_share_a_count() {
        let (db, _dir) = setup_db().await;
        create_user(&db, "u-1", 100).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                increment_and_read(&db, "u-1", "2026-03-01")
                    .await
                    .unwrap()
                    .unwrap()
                    .0
            }));
        }

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();
        let expected: Vec<i64> = (1..=20).collect();
        assert_eq!(counts, expected);
        db.close().await.unwrap();
    }
}
