// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Waygate gateway.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, typed queries for
//! sessions, messages, delivery attempts, credential blobs, and rate
//! counters, and a broadcast change feed that downstream tasks subscribe to
//! for new outbound work and session lifecycle changes.

pub mod database;
pub mod events;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use events::{StoreEvent, StoreEvents};
pub use models::{DeliveryAttempt, MessageRecord, NewDeliveryAttempt, Session};
