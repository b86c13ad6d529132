// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable load/save of per-session credential blobs.

use tracing::{debug, warn};
use waygate_core::{Credentials, SessionId, WaygateError};
use waygate_storage::Database;
use waygate_storage::queries::credentials as blob;

use crate::sealed;

/// Loads and saves sealed credential blobs for sessions.
///
/// A blob that fails to decrypt or parse is treated as absent: the caller
/// gets freshly initialized credentials and the session re-pairs. Corrupt
/// state is logged, never fatal, and never overwrites the stored blob until
/// the next successful save.
pub struct CredentialStore {
    db: Database,
    key: [u8; 32],
}

impl CredentialStore {
    pub fn new(db: Database, key: [u8; 32]) -> Self {
        Self { db, key }
    }

    /// Returns the persisted credentials for a session, or freshly
    /// initialized empty credentials when none exist (or none survive
    /// decryption).
    pub async fn load(&self, session: &SessionId) -> Result<Credentials, WaygateError> {
        let Some(blob) = blob::load_credential_blob(&self.db, session).await? else {
            debug!(session = %session, "no stored credentials, starting fresh");
            return Ok(Credentials::initial());
        };

        match self.unseal(session, &blob) {
            Ok(creds) => Ok(creds),
            Err(e) => {
                warn!(session = %session, error = %e, "treating stored credentials as absent");
                Ok(Credentials::initial())
            }
        }
    }

    /// Serializes, seals, and overwrites the persisted blob in one
    /// statement. Safe to call at high frequency; bursts should go through
    /// the [`crate::CredentialSaver`] instead.
    pub async fn save(
        &self,
        session: &SessionId,
        credentials: &Credentials,
    ) -> Result<(), WaygateError> {
        let json = serde_json::to_vec(credentials)
            .map_err(|e| WaygateError::Internal(format!("credential serialization: {e}")))?;
        let sealed = sealed::seal(&self.key, &json)?;
        blob::store_credential_blob(&self.db, session, sealed).await
    }

    /// Removes the persisted blob. Used on terminal logout; idempotent.
    pub async fn erase(&self, session: &SessionId) -> Result<(), WaygateError> {
        blob::delete_credential_blob(&self.db, session).await
    }

    /// Whether any blob is stored for the session (diagnostics and tests).
    pub async fn has_blob(&self, session: &SessionId) -> Result<bool, WaygateError> {
        Ok(blob::load_credential_blob(&self.db, session).await?.is_some())
    }

    fn unseal(&self, session: &SessionId, sealed_blob: &[u8]) -> Result<Credentials, WaygateError> {
        let corrupt = |message: String| WaygateError::CredentialCorrupt {
            session: session.0.clone(),
            message,
        };
        let json = sealed::open(&self.key, sealed_blob).map_err(|e| corrupt(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| corrupt(e.to_string()))
    }
}
