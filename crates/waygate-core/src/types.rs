// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across Waygate component boundaries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a gateway session (one user-registered messaging
/// identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a message record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a session.
///
/// Transitions are owned by the connection manager:
/// `pending -> qr_ready -> connected`, `{qr_ready, connected} ->
/// disconnected`, `disconnected -> pending` (retry) or terminal
/// `logged_out`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No live connection yet; entered on creation or after a transient close.
    Pending,
    /// A connection is open and waiting on an unconsumed pairing challenge.
    QrReady,
    /// Pairing succeeded; the session can send and receive.
    Connected,
    /// Externally requested teardown.
    Disconnected,
    /// Remote party signed out; terminal until explicitly re-created.
    LoggedOut,
}

/// Which way a message crossed the gateway boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

/// Coarse content classification of a message payload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Unknown,
}

/// Delivery status of a message record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Outbound, queued and not yet handed to a connection.
    Pending,
    /// Outbound, accepted by the protocol layer.
    Sent,
    /// Outbound, rejected; `error_message` carries the reason.
    Failed,
    /// Inbound, received from the remote network.
    Delivered,
}

/// Why a protocol connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// The remote party signed this device out. Credentials are void.
    LoggedOut,
    /// Network-level interruption; reconnecting with the same credentials
    /// is expected to succeed.
    ConnectionLost,
    /// The protocol server asked the client to restart.
    ServerRestart,
}

impl CloseReason {
    /// Whether this close invalidates the stored credentials.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CloseReason::LoggedOut)
    }
}

/// Current UTC time as an ISO-8601 string with millisecond precision,
/// the timestamp format used throughout the persisted schema.
pub fn utc_now_iso() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

// --- Credential material ---

/// An asymmetric key pair belonging to the session's handshake state.
///
/// The bytes are opaque to Waygate; only the protocol library interprets
/// them. Serialized as base64 so the JSON form survives any text transport
/// losslessly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    #[serde(with = "b64")]
    pub public: Vec<u8>,
    #[serde(with = "b64")]
    pub secret: Vec<u8>,
}

/// Opaque per-session authentication material.
///
/// Holds whatever the protocol library needs to resume a paired session
/// without a fresh pairing flow. Waygate persists and restores this
/// structure but never inspects the key bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Long-lived transport handshake key pair.
    #[serde(default)]
    pub noise_key: KeyPair,
    /// Device identity key pair.
    #[serde(default)]
    pub identity_key: KeyPair,
    /// Protocol registration id assigned during pairing.
    #[serde(default)]
    pub registration_id: u32,
    /// Remote identity this session is paired with, once pairing completed.
    #[serde(default)]
    pub paired_identity: Option<String>,
    /// Rolling per-conversation key material, keyed `"<type>/<id>"`.
    #[serde(default, with = "b64map")]
    pub signal_keys: BTreeMap<String, Vec<u8>>,
}

impl Credentials {
    /// A freshly initialized, unpaired credential structure.
    pub fn initial() -> Self {
        Self::default()
    }

    /// Whether these credentials belong to a completed pairing.
    pub fn is_paired(&self) -> bool {
        self.paired_identity.is_some()
    }
}

/// Serde adapter encoding `Vec<u8>` as base64 text.
mod b64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(de)?;
        STANDARD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Serde adapter encoding a `BTreeMap<String, Vec<u8>>` with base64 values.
mod b64map {
    use std::collections::BTreeMap;

    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, Vec<u8>>,
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        let encoded: BTreeMap<&str, String> = map
            .iter()
            .map(|(k, v)| (k.as_str(), STANDARD.encode(v)))
            .collect();
        serde::Serialize::serialize(&encoded, ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<BTreeMap<String, Vec<u8>>, D::Error> {
        let encoded: BTreeMap<String, String> = BTreeMap::deserialize(de)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                STANDARD
                    .decode(v.as_bytes())
                    .map(|bytes| (k, bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

// --- Raw inbound protocol events ---

/// Media attachment within a raw protocol message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaPart {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Content of a raw protocol message, mirroring the protocol library's
/// field-per-content-type shape. At most one field is normally set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBody {
    /// Plain conversation text.
    #[serde(default)]
    pub text: Option<String>,
    /// Extended text (quoted replies, link previews).
    #[serde(default)]
    pub extended_text: Option<String>,
    #[serde(default)]
    pub image: Option<MediaPart>,
    #[serde(default)]
    pub video: Option<MediaPart>,
    #[serde(default)]
    pub audio: Option<MediaPart>,
    #[serde(default)]
    pub document: Option<MediaPart>,
}

/// One raw inbound event as emitted by the protocol connection.
///
/// `body` is `None` for protocol-control frames that carry no user content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEnvelope {
    /// Protocol-assigned message id.
    pub id: String,
    /// Full protocol address of the sender, e.g. `"15551230000@s.whatsapp.net"`.
    pub sender: String,
    /// Whether this is an echo of a message this session itself sent.
    pub from_self: bool,
    /// Protocol timestamp of the message.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub body: Option<RawBody>,
}

/// Sender address of the broadcast/status channel, which is never genuine
/// user content.
pub const STATUS_BROADCAST: &str = "status@broadcast";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_status_round_trips_through_strings() {
        for (status, text) in [
            (SessionStatus::Pending, "pending"),
            (SessionStatus::QrReady, "qr_ready"),
            (SessionStatus::Connected, "connected"),
            (SessionStatus::Disconnected, "disconnected"),
            (SessionStatus::LoggedOut, "logged_out"),
        ] {
            assert_eq!(status.to_string(), text);
            assert_eq!(text.parse::<SessionStatus>().ok(), Some(status));
        }
    }

    #[test]
    fn close_reason_terminality() {
        assert!(CloseReason::LoggedOut.is_terminal());
        assert!(!CloseReason::ConnectionLost.is_terminal());
        assert!(!CloseReason::ServerRestart.is_terminal());
    }

    #[test]
    fn credentials_binary_material_survives_json() {
        let mut creds = Credentials::initial();
        creds.noise_key = KeyPair {
            public: vec![0x00, 0xff, 0x7f, 0x80],
            secret: (0..=255).collect(),
        };
        creds.registration_id = 4242;
        creds
            .signal_keys
            .insert("pre-key/17".into(), vec![0xde, 0xad, 0xbe, 0xef]);

        let json = serde_json::to_string(&creds).expect("serialize");
        let back: Credentials = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, creds);
        // The wire form must stay valid UTF-8 text.
        assert!(json.is_ascii());
    }

    #[test]
    fn fresh_credentials_are_unpaired() {
        let creds = Credentials::initial();
        assert!(!creds.is_paired());
        assert!(creds.signal_keys.is_empty());
    }

    #[test]
    fn timestamp_format_has_millis_and_zulu() {
        let ts = utc_now_iso();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2026-01-01T00:00:00.000Z".len());
    }
}
