// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process loopback transport for local development.
//!
//! Pairs instantly (after a visible challenge when the session has no
//! credentials yet) and reflects every outbound send back as an inbound
//! message, which exercises the full pipeline -- state machine, credential
//! saves, persistence, webhook delivery -- without a protocol server.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use waygate_core::transport::EVENT_CHANNEL_CAPACITY;
use waygate_core::types::{RawBody, RawEnvelope};
use waygate_core::{
    Credentials, LinkEvent, MessageId, SessionId, Transport, TransportLink, TransportSession,
    WaygateError,
};

const PAIRING_DELAY: Duration = Duration::from_secs(1);
const CHALLENGE_TTL: Duration = Duration::from_secs(60);

/// Loopback [`Transport`]: every open succeeds locally.
pub struct EchoTransport;

impl EchoTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EchoTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for EchoTransport {
    async fn open(
        &self,
        session: &SessionId,
        credentials: Credentials,
    ) -> Result<TransportSession, WaygateError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let link = Arc::new(EchoLink {
            events_tx: Mutex::new(Some(tx.clone())),
            closed: AtomicBool::new(false),
            counter: AtomicUsize::new(0),
        });

        let session = session.clone();
        tokio::spawn(async move {
            if let Some(identity) = credentials.paired_identity.clone() {
                let _ = tx.send(LinkEvent::Opened { identity }).await;
                return;
            }

            // No credentials yet: run a visible pairing flow.
            let challenge = uuid::Uuid::new_v4().simple().to_string();
            let _ = tx
                .send(LinkEvent::PairingChallenge {
                    value: challenge,
                    ttl: CHALLENGE_TTL,
                })
                .await;
            tokio::time::sleep(PAIRING_DELAY).await;

            let identity = format!("echo:{session}");
            let mut paired = credentials;
            paired.registration_id = 1;
            paired.paired_identity = Some(identity.clone());
            let _ = tx.send(LinkEvent::CredentialsUpdated(paired)).await;
            let _ = tx.send(LinkEvent::Opened { identity }).await;
        });

        Ok(TransportSession { link, events: rx })
    }
}

/// Loopback link: sends come back as inbound messages.
#[derive(Debug)]
pub struct EchoLink {
    events_tx: Mutex<Option<mpsc::Sender<LinkEvent>>>,
    closed: AtomicBool,
    counter: AtomicUsize,
}

#[async_trait]
impl TransportLink for EchoLink {
    async fn send(&self, destination: &str, text: &str) -> Result<MessageId, WaygateError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(WaygateError::SendFailed("echo link is closed".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("echo-{n}");

        let envelope = RawEnvelope {
            id: id.clone(),
            sender: format!("{destination}@echo"),
            from_self: false,
            timestamp: chrono::Utc::now(),
            body: Some(RawBody {
                text: Some(text.to_string()),
                ..RawBody::default()
            }),
        };
        let tx = self.events_tx.lock().await.clone();
        if let Some(tx) = tx {
            let _ = tx.send(LinkEvent::MessageReceived(envelope)).await;
        }
        Ok(MessageId(id))
    }

    async fn close(&self) -> Result<(), WaygateError> {
        self.closed.store(true, Ordering::SeqCst);
        self.events_tx.lock().await.take();
        Ok(())
    }
}
