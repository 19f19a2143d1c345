//! JSON wire protocol for the collaboration session transport.
//!
//! Every WebSocket text frame is one object carrying an `event` tag and a
//! `data` payload:
//!
//! ```text
//! {"event": "join", "data": {"roomId": "r1", "userName": "alice"}}
//! {"event": "userJoined", "data": ["alice", "bob"]}
//! ```
//!
//! The event names and payload field names are the protocol contract with
//! the editor front end and must stay camelCase. A frame that fails to
//! decode as a whole (bad JSON, unknown event, missing payload field) is
//! dropped by the server without a reply — malformed input must not become
//! a disconnect oracle.

use serde::{Deserialize, Serialize};

/// Payload of a `join` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub room_id: String,
    pub user_name: String,
}

/// Payload of a `codeChange` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CodeChangePayload {
    pub room_id: String,
    pub code: String,
}

/// Payload of a `typing` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub room_id: String,
    pub user_name: String,
}

/// Payload of a `languageChange` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LanguageChangePayload {
    pub room_id: String,
    pub language: String,
}

/// Events sent by clients.
///
/// `roomId` in the relay events (`codeChange`, `typing`, `languageChange`)
/// is taken from the payload, not from the sender's tracked session — the
/// server trusts the caller-supplied room id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Join(JoinPayload),
    CodeChange(CodeChangePayload),
    Typing(TypingPayload),
    LanguageChange(LanguageChangePayload),
    LeaveRoom,
}

/// Events sent by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full membership snapshot of a room, in join order.
    /// Sent on every join and leave, not just the first.
    UserJoined(Vec<String>),
    /// A peer's edit, relayed verbatim.
    CodeUpdate(String),
    /// A peer is typing.
    UserTyping(String),
    /// The room's editor language changed.
    LanguageUpdate(String),
}

impl ClientEvent {
    /// Serialize to a wire frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from a wire frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::DeserializationError(e.to_string()))
    }
}

impl ServerEvent {
    /// Serialize to a wire frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from a wire frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::DeserializationError(e.to_string()))
    }
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    ConnectionError(String),
    ConnectionClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::ConnectionError(e) => write!(f, "Connection error: {e}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}
