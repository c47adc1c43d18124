//! Wire envelope for presence announcements and acknowledgments.
//!
//! Logical shape (bincode-encoded, standard config):
//! ```text
//! ┌─────────┬──────────────┬──────────────┬──────────────┬────────┬──────────────┐
//! │ seq     │ src          │ v            │ p            │ r      │ error        │
//! │ varint  │ Option<str>  │ Option<u64>  │ Option<P>    │ bool   │ Option<str>  │
//! └─────────┴──────────────┴──────────────┴──────────────┴────────┴──────────────┘
//! ```
//!
//! An envelope without `src` is the server's acknowledgment of our own
//! submission. An envelope with `src` but no `v` is a server-originated
//! withdrawal for a peer that unsubscribed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Identifier of the originator of a presence announcement or operation.
///
/// The empty string denotes the local client.
pub type SourceId = String;

/// Source id of the local client.
pub const LOCAL_SOURCE: &str = "";

/// A presence message as exchanged with the relay server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEnvelope<P> {
    /// Per-source sequence number.
    pub seq: u64,
    /// Originating peer; `None` marks an ack for our own submission.
    pub src: Option<SourceId>,
    /// Document version the presence was captured at.
    pub v: Option<u64>,
    /// Presence payload; `None` withdraws the peer's presence.
    pub p: Option<P>,
    /// Sender asks every peer to re-announce its presence.
    pub r: bool,
    /// Error attached by the server (rejections on acks).
    pub error: Option<String>,
}

impl<P> PresenceEnvelope<P> {
    /// A peer's presence announcement captured at version `v`.
    pub fn announce(src: impl Into<SourceId>, seq: u64, v: u64, p: Option<P>) -> Self {
        Self {
            seq,
            src: Some(src.into()),
            v: Some(v),
            p,
            r: false,
            error: None,
        }
    }

    /// Server-signalled withdrawal for a peer that left the document.
    pub fn withdrawal(src: impl Into<SourceId>, seq: u64) -> Self {
        Self {
            seq,
            src: Some(src.into()),
            v: None,
            p: None,
            r: false,
            error: None,
        }
    }

    /// Acknowledgment of our own submission with sequence `seq`.
    pub fn ack(seq: u64) -> Self {
        Self {
            seq,
            src: None,
            v: None,
            p: None,
            r: false,
            error: None,
        }
    }

    /// Rejection of our own submission with sequence `seq`.
    pub fn ack_error(seq: u64, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::ack(seq)
        }
    }

    /// Set the request-reply flag.
    pub fn with_request_reply(mut self, r: bool) -> Self {
        self.r = r;
        self
    }

    /// Acks carry no source. An empty source is our own echo and counts too.
    pub fn is_ack(&self) -> bool {
        self.src.as_deref().map_or(true, str::is_empty)
    }
}

impl<P: Serialize> PresenceEnvelope<P> {
    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }
}

impl<P: DeserializeOwned> PresenceEnvelope<P> {
    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (envelope, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(envelope)
    }
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}
