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

//! The content database (YAML room/item/mob/spell/quest/race/buff definitions) is deliberately
//! out of scope here: it's a data and presentation layer, not the engine core. This module only
//! specifies the interface the world model touches it through, so loading/eviction can be
//! exercised in tests without a real content tree on disk.

use std::fs;
use std::path::PathBuf;

use mud_common::RoomId;

use crate::world::room::Room;

#[derive(Debug, thiserror::Error)]
pub enum ContentStoreError {
    #[error("room {0} not found in content store")]
    RoomNotFound(RoomId),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
}

/// The read/write surface the world needs from the content store. A real deployment backs this
/// with a directory of YAML files; tests use [`InMemoryContentStore`].
pub trait ContentStore: Send + Sync {
    fn load_room(&self, id: RoomId) -> Result<Room, ContentStoreError>;
    fn save_room(&self, room: &Room) -> Result<(), ContentStoreError>;
}

/// Loads/saves rooms as one YAML file per room under `root/rooms/<id>.yaml`. This is the
/// production implementation the server binary wires in; the format itself belongs to the
/// out-of-scope content layer and is intentionally plain.
pub struct YamlContentStore {
    root: PathBuf,
}

impl YamlContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn room_path(&self, id: RoomId) -> PathBuf {
        self.root.join("rooms").join(format!("{}.yaml", id.0))
    }
}

impl ContentStore for YamlContentStore {
    fn load_room(&self, id: RoomId) -> Result<Room, ContentStoreError> {
        let path = self.room_path(id);
        let text = fs::read_to_string(&path).map_err(|_| ContentStoreError::RoomNotFound(id))?;
        serde_yaml::from_str(&text).map_err(|e| ContentStoreError::Parse(e.to_string()))
    }

    fn save_room(&self, room: &Room) -> Result<(), ContentStoreError> {
        let path = self.room_path(room.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_yaml::to_string(room).map_err(|e| ContentStoreError::Parse(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }
}

/// A purely in-memory store, for unit and integration tests that shouldn't depend on the
/// content directory's layout.
#[derive(Default)]
pub struct InMemoryContentStore {
    rooms: parking_lot::Mutex<std::collections::HashMap<RoomId, Room>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, room: Room) {
        self.rooms.lock().insert(room.id, room);
    }
}

impl ContentStore for InMemoryContentStore {
    fn load_room(&self, id: RoomId) -> Result<Room, ContentStoreError> {
        self.rooms
            .lock()
            .get(&id)
            .cloned()
            .ok_or(ContentStoreError::RoomNotFound(id))
    }

    fn save_room(&self, room: &Room) -> Result<(), ContentStoreError> {
        self.rooms.lock().insert(room.id, room.clone());
        Ok(())
    }
}
