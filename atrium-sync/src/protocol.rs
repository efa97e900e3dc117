//! Binary wire protocol for the push transport.
//!
//! Every frame on the socket is one bincode-encoded [`ChannelMessage`]:
//!
//! ```text
//! ┌──────────┬───────────┬───────────┬──────────┐
//! │ kind     │ topic     │ sender    │ payload  │
//! │ 1 byte   │ variable  │ 16 bytes  │ variable │
//! └──────────┴───────────┴───────────┴──────────┘
//! ```
//!
//! The payload encoding varies by kind: `Join` carries the joining
//! [`Participant`], `Event` carries an [`InboundEvent`], `Presence`
//! carries the full roster for the topic. `Leave`, `Ping` and `Pong`
//! have empty payloads. Typed accessors decode the payload and reject
//! frames of the wrong kind.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::InboundEvent;
use crate::presence::Participant;

/// Frame kinds on the push transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageKind {
    /// Client subscribes to a topic, payload is the joining participant.
    Join = 1,
    /// Client unsubscribes from a topic.
    Leave = 2,
    /// Server-origin entity event fanned out to topic subscribers.
    Event = 3,
    /// Full-state presence snapshot for a topic.
    Presence = 4,
    /// Heartbeat ping.
    Ping = 5,
    /// Heartbeat pong.
    Pong = 6,
}

/// Top-level protocol frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub kind: MessageKind,
    /// Topic the frame is scoped to; empty for ping/pong.
    pub topic: String,
    /// Originating identity. `Uuid::nil()` for server-origin frames.
    pub sender: Uuid,
    pub payload: Vec<u8>,
}

impl ChannelMessage {
    /// Subscribe `participant` to `topic`.
    pub fn join(topic: impl Into<String>, participant: &Participant) -> Self {
        let payload = bincode::serde::encode_to_vec(participant, bincode::config::standard())
            .unwrap_or_default();
        Self {
            kind: MessageKind::Join,
            topic: topic.into(),
            sender: participant.user_id,
            payload,
        }
    }

    /// Unsubscribe `sender` from `topic`.
    pub fn leave(topic: impl Into<String>, sender: Uuid) -> Self {
        Self {
            kind: MessageKind::Leave,
            topic: topic.into(),
            sender,
            payload: Vec::new(),
        }
    }

    /// Server-origin entity event for `topic` subscribers.
    pub fn event(topic: impl Into<String>, event: &InboundEvent) -> Self {
        let payload = bincode::serde::encode_to_vec(event, bincode::config::standard())
            .unwrap_or_default();
        Self {
            kind: MessageKind::Event,
            topic: topic.into(),
            sender: Uuid::nil(),
            payload,
        }
    }

    /// Full-state roster snapshot for `topic`.
    pub fn presence(topic: impl Into<String>, participants: &[Participant]) -> Self {
        let payload = bincode::serde::encode_to_vec(participants, bincode::config::standard())
            .unwrap_or_default();
        Self {
            kind: MessageKind::Presence,
            topic: topic.into(),
            sender: Uuid::nil(),
            payload,
        }
    }

    pub fn ping(sender: Uuid) -> Self {
        Self {
            kind: MessageKind::Ping,
            topic: String::new(),
            sender,
            payload: Vec::new(),
        }
    }

    pub fn pong(sender: Uuid) -> Self {
        Self {
            kind: MessageKind::Pong,
            topic: String::new(),
            sender,
            payload: Vec::new(),
        }
    }

    /// Serialize to the binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Deserialize from the binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        Ok(msg)
    }

    /// Parse a `Join` payload.
    pub fn participant(&self) -> Result<Participant, ProtocolError> {
        if self.kind != MessageKind::Join {
            return Err(ProtocolError::InvalidKind);
        }
        let (participant, _) =
            bincode::serde::decode_from_slice(&self.payload, bincode::config::standard())
                .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        Ok(participant)
    }

    /// Parse an `Event` payload.
    pub fn inbound_event(&self) -> Result<InboundEvent, ProtocolError> {
        if self.kind != MessageKind::Event {
            return Err(ProtocolError::InvalidKind);
        }
        let (event, _) =
            bincode::serde::decode_from_slice(&self.payload, bincode::config::standard())
                .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        Ok(event)
    }

    /// Parse a `Presence` payload.
    pub fn roster(&self) -> Result<Vec<Participant>, ProtocolError> {
        if self.kind != MessageKind::Presence {
            return Err(ProtocolError::InvalidKind);
        }
        let (roster, _) =
            bincode::serde::decode_from_slice(&self.payload, bincode::config::standard())
                .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        Ok(roster)
    }
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    Serialization(String),
    Deserialization(String),
    InvalidKind,
    ConnectionClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(e) => write!(f, "serialization error: {e}"),
            Self::Deserialization(e) => write!(f, "deserialization error: {e}"),
            Self::InvalidKind => write!(f, "payload accessor used on wrong frame kind"),
            Self::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}

// ===================================================================
// Tests
// ===================================================================
