// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable mock protocol transport for deterministic testing.
//!
//! `MockTransport` implements [`Transport`]; every `open` produces a
//! [`MockLink`] whose event stream the test drives via `emit*` methods and
//! whose `send` calls are captured for assertion.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use waygate_core::transport::EVENT_CHANNEL_CAPACITY;
use waygate_core::{
    CloseReason, Credentials, LinkEvent, MessageId, SessionId, Transport, TransportLink,
    TransportSession, WaygateError,
};

/// A mock protocol transport.
///
/// Tracks every `open` call and hands out one scriptable [`MockLink`] per
/// open. `fail_next_opens(n)` makes the next `n` opens fail, for exercising
/// retry and `ConnectionUnavailable` paths.
pub struct MockTransport {
    links: Mutex<HashMap<String, Arc<MockLink>>>,
    open_count: AtomicUsize,
    fail_opens: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            links: Mutex::new(HashMap::new()),
            open_count: AtomicUsize::new(0),
            fail_opens: AtomicUsize::new(0),
        })
    }

    /// Total `open` calls observed, including failed ones.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// Make the next `n` open calls fail.
    pub fn fail_next_opens(&self, n: usize) {
        self.fail_opens.store(n, Ordering::SeqCst);
    }

    /// The most recently opened link for a session, if any.
    pub async fn link(&self, session: &SessionId) -> Option<Arc<MockLink>> {
        self.links.lock().await.get(&session.0).cloned()
    }

    /// The credentials the manager passed to the most recent open for a
    /// session.
    pub async fn opened_with(&self, session: &SessionId) -> Option<Credentials> {
        let links = self.links.lock().await;
        links.get(&session.0).map(|link| link.opened_with.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &self,
        session: &SessionId,
        credentials: Credentials,
    ) -> Result<TransportSession, WaygateError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_opens.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_opens.store(remaining - 1, Ordering::SeqCst);
            return Err(WaygateError::Internal("scripted open failure".to_string()));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let link = Arc::new(MockLink {
            events_tx: Mutex::new(Some(tx)),
            sent: Mutex::new(Vec::new()),
            send_error: Mutex::new(None),
            closed: AtomicBool::new(false),
            send_counter: AtomicUsize::new(0),
            opened_with: credentials,
        });
        self.links
            .lock()
            .await
            .insert(session.0.clone(), link.clone());

        Ok(TransportSession {
            link: link.clone(),
            events: rx,
        })
    }
}

/// One scripted protocol link.
#[derive(Debug)]
pub struct MockLink {
    events_tx: Mutex<Option<mpsc::Sender<LinkEvent>>>,
    sent: Mutex<Vec<(String, String)>>,
    send_error: Mutex<Option<String>>,
    closed: AtomicBool,
    send_counter: AtomicUsize,
    opened_with: Credentials,
}

impl MockLink {
    /// Push an event into the link's stream.
    pub async fn emit(&self, event: LinkEvent) {
        let tx = self.events_tx.lock().await.clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    /// Emit an organic close and end the event stream, as a real protocol
    /// connection would.
    pub async fn emit_closed(&self, reason: CloseReason) {
        self.emit(LinkEvent::Closed { reason }).await;
        self.events_tx.lock().await.take();
    }

    /// Everything passed to `send` on this link, in order.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    /// Make subsequent `send` calls fail with the given message
    /// (or succeed again with `None`).
    pub async fn set_send_error(&self, message: Option<&str>) {
        *self.send_error.lock().await = message.map(str::to_string);
    }

    /// Whether `close` was called on this link.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportLink for MockLink {
    async fn send(&self, destination: &str, text: &str) -> Result<MessageId, WaygateError> {
        if self.is_closed() {
            return Err(WaygateError::SendFailed("link is closed".to_string()));
        }
        if let Some(message) = self.send_error.lock().await.clone() {
            return Err(WaygateError::SendFailed(message));
        }
        self.sent
            .lock()
            .await
            .push((destination.to_string(), text.to_string()));
        let n = self.send_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageId(format!("proto-{n}")))
    }

    async fn close(&self) -> Result<(), WaygateError> {
        self.closed.store(true, Ordering::SeqCst);
        // Ending the stream terminates the consumer's pump task.
        self.events_tx.lock().await.take();
        Ok(())
    }
}
