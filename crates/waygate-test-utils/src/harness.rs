// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared setup for integration tests: a temporary database, a credential
//! store with a random key, and a scriptable mock transport.

use std::sync::Arc;

use tempfile::TempDir;
use waygate_core::{
    Credentials, DeliveryStatus, Direction, MessageId, MessageKind, SessionId, SessionStatus,
    utc_now_iso,
};
use waygate_credentials::{CredentialStore, sealed};
use waygate_storage::queries::{messages, quota, sessions};
use waygate_storage::{Database, MessageRecord, Session};

use crate::mock_transport::MockTransport;

/// Everything a gateway integration test needs, wired against a temp
/// directory that lives as long as the harness.
pub struct TestHarness {
    pub db: Database,
    pub store: Arc<CredentialStore>,
    pub transport: Arc<MockTransport>,
    _dir: TempDir,
}

impl TestHarness {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("waygate-test.db");
        let db = Database::open(path.to_str().expect("utf-8 path"))
            .await
            .expect("open database");
        let key = sealed::generate_key().expect("random key");
        let store = Arc::new(CredentialStore::new(db.clone(), key));
        Self {
            db,
            store,
            transport: MockTransport::new(),
            _dir: dir,
        }
    }

    pub async fn create_user(&self, id: &str, daily_limit: i64) {
        quota::create_user(&self.db, id, daily_limit)
            .await
            .expect("create user");
    }

    /// Insert a session row in the given status and return its id.
    pub async fn create_session(
        &self,
        id: &str,
        user_id: &str,
        status: SessionStatus,
        callback_url: Option<String>,
    ) -> SessionId {
        let session_id = SessionId(id.to_string());
        sessions::create_session(
            &self.db,
            &Session {
                id: session_id.clone(),
                user_id: user_id.to_string(),
                name: format!("label-{id}"),
                status,
                qr_challenge: None,
                qr_expires_at: None,
                callback_url,
                phone_number: None,
                created_at: utc_now_iso(),
                last_active: utc_now_iso(),
            },
        )
        .await
        .expect("create session");
        session_id
    }

    /// Queue an outbound text message (status `pending`) and return its id.
    pub async fn queue_outbound(
        &self,
        id: &str,
        session: &SessionId,
        to: &str,
        text: &str,
    ) -> MessageId {
        let message_id = MessageId(id.to_string());
        messages::insert_message(
            &self.db,
            &MessageRecord {
                id: message_id.clone(),
                session_id: session.clone(),
                direction: Direction::Out,
                kind: MessageKind::Text,
                peer: to.to_string(),
                payload: serde_json::json!({ "text": text }).to_string(),
                status: DeliveryStatus::Pending,
                error_message: None,
                protocol_message_id: None,
                webhook_acked: false,
                created_at: utc_now_iso(),
            },
        )
        .await
        .expect("queue outbound");
        message_id
    }

    /// Persist paired credentials for a session, as if a pairing had
    /// completed in an earlier process.
    pub async fn seed_credentials(&self, session: &SessionId, identity: &str) {
        let mut creds = Credentials::initial();
        creds.registration_id = 7;
        creds.paired_identity = Some(identity.to_string());
        self.store
            .save(session, &creds)
            .await
            .expect("seed credentials");
    }
}
