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

use std::collections::{HashMap, VecDeque};

use mud_common::{InstanceId, MobId, RoomId, Turn, UserId};

use crate::world::character::Character;

/// A spawned, live instance of a mob blueprint. Distinct from its `MobId` template: two
/// instances of the same blueprint behave identically but despawn/respawn independently.
pub struct NpcInstance {
    pub id: InstanceId,
    pub mob: MobId,
    pub character: Character,
    pub home_room: RoomId,
    /// 0-100 probability-per-round weight feeding the idle-command roll.
    pub activity_level: u8,
    pub idle_commands: Vec<String>,
    pub angry_commands: Vec<String>,
    pub combat_commands: Vec<String>,
    pub group: Option<String>,
    pub hates: Vec<String>,
    pub path_queue: VecDeque<RoomId>,
    /// 0 means not in a conversation.
    pub conversation_id: u64,
    pub boredom: u32,
    pub last_command_turn: Turn,
    pub attacked_players: Vec<UserId>,
    /// Shopkeepers and similar: survive both the boredom despawn and the memory-threshold
    /// despawn gate.
    pub persistent: bool,
    /// Scratch key/value store scripts and the autonomy loop use for transient per-NPC state,
    /// e.g. the `home-impossible` marker.
    pub temp: HashMap<String, String>,
}

impl NpcInstance {
    pub fn new(id: InstanceId, mob: MobId, character: Character, home_room: RoomId) -> Self {
        Self {
            id,
            mob,
            character,
            home_room,
            activity_level: 50,
            idle_commands: Vec::new(),
            angry_commands: Vec::new(),
            combat_commands: Vec::new(),
            group: None,
            hates: Vec::new(),
            path_queue: VecDeque::new(),
            conversation_id: 0,
            boredom: 0,
            last_command_turn: Turn::ZERO,
            attacked_players: Vec::new(),
            persistent: false,
            temp: HashMap::new(),
        }
    }

    pub fn is_home_impossible(&self) -> bool {
        self.temp.get("home-impossible").is_some()
    }

    pub fn mark_home_impossible(&mut self) {
        self.temp.insert("home-impossible".to_string(), "true".to_string());
    }

    pub fn clear_home_impossible(&mut self) {
        self.temp.remove("home-impossible");
    }
}
