// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sealed credential persistence for Waygate sessions.
//!
//! A session's authentication material is serialized to binary-safe JSON,
//! sealed with AES-256-GCM under the gateway master key, and stored as an
//! opaque blob. The protocol layer may request saves on every key rotation,
//! so a coalescing background saver batches bursts into single writes.

pub mod saver;
pub mod sealed;
pub mod store;

pub use saver::{CredentialSaver, spawn_saver};
pub use store::CredentialStore;
