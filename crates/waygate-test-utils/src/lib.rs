// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Waygate integration tests.
//!
//! [`MockTransport`] is a scriptable stand-in for the opaque protocol
//! library: tests drive pairing, inbound messages, and closes by emitting
//! events, and assert on captured sends. [`TestHarness`] wires a temporary
//! database with users, sessions, and a credential store.

// This crate only ever runs inside tests; panicking on setup failure is
// the desired behavior.
#![allow(clippy::expect_used, clippy::unwrap_used)]

pub mod harness;
pub mod mock_transport;

pub use harness::TestHarness;
pub use mock_transport::{MockLink, MockTransport};
