// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seam for the opaque messaging-protocol library.
//!
//! Waygate never implements the protocol wire format or its handshake; it
//! owns connection *handles*. A [`Transport`] opens one live link per
//! session and hands back a [`TransportLink`] for sends plus an explicit
//! event channel -- ordering and backpressure are plain mpsc semantics, and
//! a dedicated pump task per connection consumes the receiver.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::WaygateError;
use crate::types::{CloseReason, Credentials, MessageId, RawEnvelope, SessionId};

/// Capacity of the per-connection event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by a live protocol connection, in protocol order.
#[derive(Debug)]
pub enum LinkEvent {
    /// A pairing challenge the end user must approve within `ttl`.
    PairingChallenge { value: String, ttl: Duration },
    /// The handshake completed; `identity` is the paired phone identity.
    Opened { identity: String },
    /// The protocol layer rotated key material and wants it persisted.
    CredentialsUpdated(Credentials),
    /// A raw inbound message arrived.
    MessageReceived(RawEnvelope),
    /// The connection closed. Emitted at most once, last.
    Closed { reason: CloseReason },
}

/// A live, open protocol link for one session.
#[async_trait]
pub trait TransportLink: Send + Sync + Debug + 'static {
    /// Sends a text payload to `destination` (a protocol address).
    ///
    /// Returns the protocol-assigned message id on acceptance.
    async fn send(&self, destination: &str, text: &str) -> Result<MessageId, WaygateError>;

    /// Closes the link. The event channel ends after the final
    /// [`LinkEvent::Closed`] (or immediately on a deliberate close).
    async fn close(&self) -> Result<(), WaygateError>;
}

/// An opened connection: the send/close handle plus its event stream.
pub struct TransportSession {
    pub link: Arc<dyn TransportLink>,
    pub events: mpsc::Receiver<LinkEvent>,
}

/// Factory for protocol connections.
///
/// `open` performs the network handshake and may take seconds; callers
/// bound it with a timeout and a capped [`crate::RetryPolicy`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(
        &self,
        session: &SessionId,
        credentials: Credentials,
    ) -> Result<TransportSession, WaygateError>;
}
