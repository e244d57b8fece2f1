// Copyright (C) 2026 The Loom MUD Authors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use mud_common::{InstanceId, RoomId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Exit {
    pub target: RoomId,
    pub locked: bool,
    pub secret: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroundItem {
    pub name: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub contents: Vec<String>,
}

/// A room/zone modifier that changes description, exits, or events while active. Mutators are
/// content-store data the core only carries and serializes; their effects are applied by
/// scripts, not hardcoded here.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Mutator {
    pub name: String,
    pub rounds_remaining: Option<u32>,
}

/// Persistent room state as loaded from the content store, plus load-transient runtime
/// counters used only for eviction scheduling (never serialized back).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub title: String,
    pub description: String,
    pub exits: IndexMap<String, Exit>,
    #[serde(default)]
    pub present_users: HashSet<UserId>,
    #[serde(default)]
    pub present_npcs: HashSet<InstanceId>,
    #[serde(default)]
    pub ground_items: Vec<GroundItem>,
    #[serde(default)]
    pub containers: HashMap<String, Container>,
    #[serde(default)]
    pub mutators: Vec<Mutator>,
    /// Path to this room's hook script, relative to the content store's `scripts/` directory.
    /// Run on entry and on every command dispatched in the room; `None` means the room has no
    /// script attached.
    #[serde(default)]
    pub script: Option<String>,

    /// Rounds since this room was last non-empty/active; reset whenever a user or NPC is
    /// present or a relevant action occurs. Not serialized: always starts at zero on load.
    #[serde(skip, default)]
    pub idle_rounds: u64,
    /// Number of times this room has been (re)loaded after eviction, used only to decide
    /// whether a save-on-evict is owed. Not serialized.
    #[serde(skip, default)]
    pub load_count: u32,
}

impl Room {
    pub fn new(id: RoomId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            exits: IndexMap::new(),
            present_users: HashSet::new(),
            present_npcs: HashSet::new(),
            ground_items: Vec::new(),
            containers: HashMap::new(),
            mutators: Vec::new(),
            script: None,
            idle_rounds: 0,
            load_count: 0,
        }
    }

    pub fn is_empty_of_activity(&self) -> bool {
        self.present_users.is_empty() && self.present_npcs.is_empty()
    }

    pub fn is_dirty_for_save(&self) -> bool {
        !self.containers.is_empty() || !self.mutators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_then_deserialize_round_trips_persistent_fields() {
        let mut room = Room::new(RoomId(1), "Foyer", "A dim foyer.");
        room.exits.insert(
            "north".to_string(),
            Exit { target: RoomId(2), locked: false, secret: false },
        );
        room.idle_rounds = 42; // transient, should not round-trip
        let yaml = serde_yaml::to_string(&room).unwrap();
        let restored: Room = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(restored.id, room.id);
        assert_eq!(restored.title, room.title);
        assert_eq!(restored.exits.len(), 1);
        assert_eq!(restored.idle_rounds, 0);
    }
}
