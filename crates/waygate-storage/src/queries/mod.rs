// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions, grouped per table.
//!
//! Every function takes `&Database` and runs on the single writer thread.
//! Functions that insert or change rows other tasks watch also publish a
//! [`crate::StoreEvent`] after the write commits.

pub mod attempts;
pub mod credentials;
pub mod messages;
pub mod quota;
pub mod sessions;
