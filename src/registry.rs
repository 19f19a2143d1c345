//! Process-wide room membership registry.
//!
//! Maps a caller-supplied room id to the set of display names currently
//! present. The member list has set semantics (duplicates collapse) but
//! preserves insertion order so membership snapshots are deterministic.
//!
//! A room with no members is pruned; an absent room and a never-created
//! room are indistinguishable, and rejoining a pruned id recreates it.
//!
//! The registry is an owned object, constructed once and injected into the
//! presence coordinator — never a module-level singleton.

use std::collections::HashMap;

/// Room id → insertion-ordered member display names.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Vec<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a display name to a room, creating the room as needed.
    ///
    /// Returns true when the name was newly inserted. Adding a name that is
    /// already present is a no-op on the set — two connections sharing one
    /// display name collapse to a single entry.
    pub fn add_member(&mut self, room_id: &str, name: &str) -> bool {
        let members = self.rooms.entry(room_id.to_string()).or_default();
        if members.iter().any(|m| m == name) {
            return false;
        }
        members.push(name.to_string());
        true
    }

    /// Remove a display name from a room, pruning the room when it empties.
    ///
    /// Returns true when the name was present. Removing from an absent room
    /// is a no-op.
    pub fn remove_member(&mut self, room_id: &str, name: &str) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let Some(pos) = members.iter().position(|m| m == name) else {
            return false;
        };
        members.remove(pos);
        if members.is_empty() {
            self.rooms.remove(room_id);
        }
        true
    }

    /// Insertion-ordered membership snapshot; empty for an absent room.
    pub fn members(&self, room_id: &str) -> Vec<String> {
        self.rooms.get(room_id).cloned().unwrap_or_default()
    }

    /// Whether `name` is currently in `room_id`.
    pub fn contains(&self, room_id: &str, name: &str) -> bool {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().any(|m| m == name))
            .unwrap_or(false)
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
