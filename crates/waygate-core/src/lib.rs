// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types and traits for the Waygate messaging gateway.
//!
//! Defines the error taxonomy shared by every crate, the domain types that
//! cross component boundaries (session statuses, message kinds, credential
//! material), the [`Transport`] trait seam behind which the opaque protocol
//! library lives, and the reusable [`RetryPolicy`] used by connection opens
//! and webhook delivery alike.

pub mod error;
pub mod retry;
pub mod transport;
pub mod types;

pub use error::WaygateError;
pub use retry::RetryPolicy;
pub use transport::{LinkEvent, Transport, TransportLink, TransportSession};
pub use types::{
    CloseReason, Credentials, DeliveryStatus, Direction, MessageId, MessageKind, RawBody,
    RawEnvelope, SessionId, SessionStatus, utc_now_iso,
};
