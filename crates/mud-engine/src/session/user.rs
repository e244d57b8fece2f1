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

use std::collections::HashMap;
use std::time::SystemTime;

use mud_common::{ConnectionId, UserId};
use serde::{Deserialize, Serialize};

use crate::world::character::Character;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum Role {
    Guest,
    User,
    Admin,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Flags {
    pub muted: bool,
    pub deafened: bool,
    pub screen_reader: bool,
}

/// The persistent account record: survives logout. Invariant: at any instant a user has at
/// most one non-Zombie connection, enforced by the registry, not this struct.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub character: Character,
    pub inbox: Vec<String>,
    pub config: HashMap<String, String>,
    pub macros: HashMap<String, String>,
    pub aliases: HashMap<String, String>,
    pub flags: Flags,
    /// Ephemeral per-session scratch values, cleared on logout.
    #[serde(skip)]
    pub session_map: HashMap<String, String>,
    #[serde(skip)]
    pub bound_connection: Option<ConnectionId>,
    #[serde(skip, default = "SystemTime::now")]
    pub last_input_time: SystemTime,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>, password_hash: impl Into<String>, character: Character) -> Self {
        Self {
            id,
            username: username.into(),
            password_hash: password_hash.into(),
            role: Role::User,
            character,
            inbox: Vec::new(),
            config: HashMap::new(),
            macros: HashMap::new(),
            aliases: HashMap::new(),
            flags: Flags::default(),
            session_map: HashMap::new(),
            bound_connection: None,
            last_input_time: SystemTime::now(),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound_connection.is_some()
    }
}
