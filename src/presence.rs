//! Presence coordination: the only writer of the room registry.
//!
//! Join and leave mutate the registry and the connection's session slot
//! together, then report the membership snapshots that need broadcasting.
//! The coordinator computes *what* changed; routing the snapshots to live
//! connections is the dispatcher's job.
//!
//! State transitions:
//!
//! ```text
//! join(r, name):   [in r_old] ──leave steps──► [no room] ──add──► [in r]
//! leave():         [in r] ──remove──► [no room]      (idempotent)
//! ```

use crate::connection::RoomSession;
use crate::registry::RoomRegistry;

/// A membership change to broadcast: the room and its updated snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub room_id: String,
    pub members: Vec<String>,
}

/// Owns the room registry and applies join/leave transitions.
#[derive(Debug, Default)]
pub struct PresenceCoordinator {
    registry: RoomRegistry,
}

impl PresenceCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the registry, for snapshots and stats.
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Join a room, leaving any current room first.
    ///
    /// Returns the updates to broadcast, in order. When the connection was
    /// already in a room (even the same one) the first update is that
    /// room's post-leave snapshot; the last update is always the joined
    /// room's snapshot. Re-adding an already-present display name leaves
    /// the set unchanged but still produces the broadcast.
    pub fn join(
        &mut self,
        session: &mut Option<RoomSession>,
        room_id: &str,
        user_name: &str,
    ) -> Vec<PresenceUpdate> {
        let mut updates = Vec::with_capacity(2);

        // A connection is never a member of two rooms.
        if let Some(update) = self.leave(session) {
            updates.push(update);
        }

        *session = Some(RoomSession::new(room_id, user_name));
        self.registry.add_member(room_id, user_name);
        updates.push(PresenceUpdate {
            room_id: room_id.to_string(),
            members: self.registry.members(room_id),
        });
        updates
    }

    /// Leave the current room, clearing the session.
    ///
    /// Returns the room's post-leave snapshot to broadcast to the remaining
    /// members, or None when the connection was not in a room. Safe to call
    /// any number of times.
    pub fn leave(&mut self, session: &mut Option<RoomSession>) -> Option<PresenceUpdate> {
        let RoomSession {
            room_id,
            display_name,
        } = session.take()?;
        self.registry.remove_member(&room_id, &display_name);
        let members = self.registry.members(&room_id);
        Some(PresenceUpdate { room_id, members })
    }
}
