// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread; the [`Database`] struct IS the single writer. Query modules
//! accept `&Database` and go through `connection().call()`. Do NOT create
//! additional connections for writes.

use tracing::info;
use waygate_core::WaygateError;

use crate::events::StoreEvents;
use crate::migrations;

/// Handle to the gateway database: one tokio-rusqlite connection plus the
/// change-notification hub fed by the query layer.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    events: StoreEvents,
}

impl Database {
    /// Opens (or creates) the database at `path`, applies PRAGMAs, and runs
    /// all pending migrations.
    pub async fn open(path: &str) -> Result<Self, WaygateError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| WaygateError::Storage {
                source: Box::new(e),
            })?;

        conn.call(|conn| {
            // journal_mode and busy_timeout return a result row; pragma_update
            // would error on them.
            let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
            let _: i64 = conn.query_row("PRAGMA busy_timeout=5000", [], |row| row.get(0))?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(|e| WaygateError::Storage {
                source: Box::new(e),
            })?;

        info!(path, "database opened");

        Ok(Self {
            conn,
            events: StoreEvents::new(),
        })
    }

    /// The underlying single-writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// The change-notification hub published to by the query layer.
    pub fn events(&self) -> &StoreEvents {
        &self.events
    }

    /// Closes the connection, flushing pending work on the writer thread.
    pub async fn close(self) -> Result<(), WaygateError> {
        self.conn.close().await.map_err(map_tr_err)
    }
}

/// Convert a tokio-rusqlite error into `WaygateError::Storage`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> WaygateError {
    WaygateError::Storage {
        source: Box::new(e),
    }
}
