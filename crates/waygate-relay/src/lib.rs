// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session connection lifecycle and event delivery for the Waygate gateway.
//!
//! Three cooperating pieces:
//! - [`SessionConnectionManager`] owns the registry of live protocol links,
//!   applies the reconnect and idle-eviction policy, and runs one event
//!   pump task per connection.
//! - [`EventRouter`] turns raw inbound protocol events into persisted
//!   message records and webhook dispatches.
//! - [`OutboundProcessor`] watches the outbound queue and pushes pending
//!   messages through live links.

pub mod manager;
pub mod outbound;
pub mod router;
pub mod shutdown;

pub use manager::{ConnectorSettings, SessionConnectionManager};
pub use outbound::OutboundProcessor;
pub use router::EventRouter;
pub use shutdown::install_signal_handler;
