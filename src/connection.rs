//! Server-side state for one live client connection.
//!
//! The room membership of a connection lives in a single
//! `Option<RoomSession>` so the room id and display name are always set and
//! cleared together. A connection is in at most one room at any time.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::ServerEvent;

/// Opaque connection identifier, assigned at accept time and stable for the
/// connection's lifetime.
pub type ConnectionId = Uuid;

/// The room a connection currently occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSession {
    pub room_id: String,
    pub display_name: String,
}

impl RoomSession {
    pub fn new(room_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Handle to one live connection: identity, outbound channel, and the
/// current room session (None when not joined).
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<ServerEvent>,
    session: Option<RoomSession>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, outbound: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id,
            outbound,
            session: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn session(&self) -> Option<&RoomSession> {
        self.session.as_ref()
    }

    /// Mutable access to the session slot, for the presence coordinator.
    pub fn session_mut(&mut self) -> &mut Option<RoomSession> {
        &mut self.session
    }

    /// Whether this connection is currently in `room_id`.
    pub fn is_in_room(&self, room_id: &str) -> bool {
        self.session
            .as_ref()
            .map(|s| s.room_id == room_id)
            .unwrap_or(false)
    }

    /// Queue an event for this connection's writer task.
    ///
    /// Returns false when the outbound channel is full or closed — the
    /// dispatcher drops the delivery rather than blocking on a slow peer.
    pub fn try_deliver(&self, event: ServerEvent) -> bool {
        self.outbound.try_send(event).is_ok()
    }
}
