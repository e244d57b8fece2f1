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

//! `Character` is the avatar type shared by both players and NPCs. Keeping one type for
//! both means combat, inventory and buff code never has to branch on "is this a player"; only
//! the owning [`crate::event::Actor`] distinguishes who is driving it.

use std::collections::HashMap;

use indexmap::IndexMap;
use mud_common::RoomId;
use serde::{Deserialize, Serialize};

use crate::event::Actor;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stats {
    pub level: u32,
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub alignment: i32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            level: 1,
            health: 100,
            max_health: 100,
            mana: 100,
            max_mana: 100,
            alignment: 0,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Equipment {
    pub slots: HashMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Buff {
    pub name: String,
    pub rounds_remaining: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub room_id: RoomId,
    pub stats: Stats,
    pub equipment: Equipment,
    pub buffs: Vec<Buff>,
    pub inventory: Vec<String>,
    /// Current combat target, if any.
    pub aggro_target: Option<Actor>,
    /// Quest id -> progress token.
    pub quest_progress: IndexMap<String, String>,
}

impl Character {
    pub fn new(name: impl Into<String>, room_id: RoomId) -> Self {
        Self {
            name: name.into(),
            room_id,
            stats: Stats::default(),
            equipment: Equipment::default(),
            buffs: Vec::new(),
            inventory: Vec::new(),
            aggro_target: None,
            quest_progress: IndexMap::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.stats.health > 0
    }

    pub fn apply_damage(&mut self, amount: i32) {
        self.stats.health = (self.stats.health - amount).max(0);
    }

    pub fn tick_buffs(&mut self) {
        for buff in &mut self.buffs {
            buff.rounds_remaining = buff.rounds_remaining.saturating_sub(1);
        }
        self.buffs.retain(|b| b.rounds_remaining > 0);
    }
}
