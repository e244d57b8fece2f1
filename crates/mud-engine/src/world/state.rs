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

//! The `World` is the only mutable authoritative state in the process. It is
//! accessed exclusively from the scheduler's main worker, or under the global world mutex the
//! admin path also respects. It owns every loaded `Room`, every `NpcInstance`, and the
//! live `Character` of every user currently bound to a connection.

use std::collections::HashMap;
use std::sync::Arc;

use mud_common::{ConnectionId, IdSequence, InstanceId, RoomId, UserId};
use tracing::{debug, warn};

use crate::npc::instance::NpcInstance;
use crate::world::character::Character;
use crate::world::content_store::{ContentStore, ContentStoreError};
use crate::world::room::Room;

/// The live avatar of a connected user. Distinct from the persistent `User` record in
/// `session::registry`, which survives logout; this only exists while the user is bound to a
/// connection.
pub struct OnlineUser {
    pub character: Character,
    pub connection_id: ConnectionId,
}

pub struct World {
    content: Arc<dyn ContentStore>,
    room_unload_rounds: u64,
    room_unload_threshold: usize,

    rooms: HashMap<RoomId, Room>,
    online_users: HashMap<UserId, OnlineUser>,
    npc_instances: HashMap<InstanceId, NpcInstance>,
    instance_ids: IdSequence,
}

impl World {
    pub fn new(content: Arc<dyn ContentStore>, room_unload_rounds: u64, room_unload_threshold: usize) -> Self {
        Self {
            content,
            room_unload_rounds,
            room_unload_threshold,
            rooms: HashMap::new(),
            online_users: HashMap::new(),
            npc_instances: HashMap::new(),
            instance_ids: IdSequence::new(),
        }
    }

    /// Allocates a fresh `InstanceId`, unique for the process lifetime. Used when something
    /// other than the content-load path spawns an NPC instance, e.g. a script's `spawn_mob`.
    pub fn next_instance_id(&self) -> InstanceId {
        InstanceId(self.instance_ids.next())
    }

    // ---- room loading / eviction ----

    pub fn is_room_loaded(&self, id: RoomId) -> bool {
        self.rooms.contains_key(&id)
    }

    /// Loads `id` from the content store on first reference, pruning exits that point at rooms
    /// which fail to load so a dangling exit never resolves. Subsequent
    /// calls return the already-loaded room without touching the content store.
    pub fn load_room(&mut self, id: RoomId) -> Result<&mut Room, ContentStoreError> {
        if !self.rooms.contains_key(&id) {
            let mut room = self.content.load_room(id)?;
            room.load_count += 1;
            let dangling: Vec<String> = room
                .exits
                .iter()
                .filter(|(_, exit)| !self.content_has_room(exit.target))
                .map(|(name, _)| name.clone())
                .collect();
            for name in dangling {
                warn!(room = ?id, exit = %name, "pruning exit to missing room at load");
                room.exits.shift_remove(&name);
            }
            self.rooms.insert(id, room);
        }
        Ok(self.rooms.get_mut(&id).expect("just inserted"))
    }

    fn content_has_room(&self, id: RoomId) -> bool {
        // A cheap existence probe: rooms already loaded always exist; otherwise ask the store.
        // This never inserts into `self.rooms`, so it can't recurse into pruning itself.
        self.rooms.contains_key(&id) || self.content.load_room(id).is_ok()
    }

    pub fn get_room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn get_room_mut(&mut self, id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&id)
    }

    pub fn loaded_room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Advances idle counters for every loaded room and evicts those that have been empty and
    /// inactive for `room_unload_rounds` rounds, skipping eviction entirely while the loaded set
    /// is below `room_unload_threshold` to avoid churn in small worlds. NPC instances in
    /// an evicted room despawn unless `persistent`. Dirty rooms are saved back to the content
    /// store before being dropped. Returns the set of evicted room ids.
    pub fn tick_eviction(&mut self) -> Vec<RoomId> {
        for room in self.rooms.values_mut() {
            if room.is_empty_of_activity() {
                room.idle_rounds += 1;
            } else {
                room.idle_rounds = 0;
            }
        }

        if self.rooms.len() < self.room_unload_threshold {
            return Vec::new();
        }

        let candidates: Vec<RoomId> = self
            .rooms
            .values()
            .filter(|r| r.is_empty_of_activity() && r.idle_rounds >= self.room_unload_rounds)
            .map(|r| r.id)
            .collect();

        let mut despawned_npcs = Vec::new();
        for id in &candidates {
            let room = self.rooms.get(id).expect("candidate exists");
            for npc_id in &room.present_npcs {
                if let Some(npc) = self.npc_instances.get(npc_id) {
                    if !npc.persistent {
                        despawned_npcs.push(*npc_id);
                    }
                }
            }
        }
        for npc_id in despawned_npcs {
            self.npc_instances.remove(&npc_id);
        }

        for id in &candidates {
            if let Some(room) = self.rooms.get(id) {
                if room.is_dirty_for_save() {
                    if let Err(e) = self.content.save_room(room) {
                        warn!(room = ?id, error = %e, "failed to save room on evict");
                    }
                }
            }
            self.rooms.remove(id);
            debug!(room = ?id, "evicted idle room");
        }
        candidates
    }

    // ---- users (connection / account / live character) ----

    pub fn spawn_user(&mut self, user: UserId, connection_id: ConnectionId, character: Character) {
        let room_id = character.room_id;
        self.online_users.insert(user, OnlineUser { character, connection_id });
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.present_users.insert(user);
        }
    }

    pub fn despawn_user(&mut self, user: UserId) -> Option<OnlineUser> {
        let online = self.online_users.remove(&user)?;
        if let Some(room) = self.rooms.get_mut(&online.character.room_id) {
            room.present_users.remove(&user);
        }
        Some(online)
    }

    pub fn online_user(&self, user: UserId) -> Option<&OnlineUser> {
        self.online_users.get(&user)
    }

    pub fn online_user_mut(&mut self, user: UserId) -> Option<&mut OnlineUser> {
        self.online_users.get_mut(&user)
    }

    pub fn is_online(&self, user: UserId) -> bool {
        self.online_users.contains_key(&user)
    }

    /// Moves a user between rooms, updating both rooms' presence sets. A no-op if the user
    /// isn't online or the destination isn't loaded.
    pub fn move_user(&mut self, user: UserId, to: RoomId) -> Option<RoomId> {
        let online = self.online_users.get_mut(&user)?;
        let from = online.character.room_id;
        if !self.rooms.contains_key(&to) {
            return None;
        }
        if let Some(room) = self.rooms.get_mut(&from) {
            room.present_users.remove(&user);
        }
        online.character.room_id = to;
        self.rooms.get_mut(&to).expect("checked above").present_users.insert(user);
        Some(from)
    }

    // ---- NPC instances ----

    pub fn insert_npc(&mut self, npc: NpcInstance) {
        let room_id = npc.character.room_id;
        let id = npc.id;
        self.npc_instances.insert(id, npc);
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.present_npcs.insert(id);
        }
    }

    pub fn remove_npc(&mut self, id: InstanceId) -> Option<NpcInstance> {
        let npc = self.npc_instances.remove(&id)?;
        if let Some(room) = self.rooms.get_mut(&npc.character.room_id) {
            room.present_npcs.remove(&id);
        }
        Some(npc)
    }

    pub fn npc(&self, id: InstanceId) -> Option<&NpcInstance> {
        self.npc_instances.get(&id)
    }

    pub fn npc_mut(&mut self, id: InstanceId) -> Option<&mut NpcInstance> {
        self.npc_instances.get_mut(&id)
    }

    pub fn npc_ids(&self) -> Vec<InstanceId> {
        self.npc_instances.keys().copied().collect()
    }

    /// Resolves either kind of `Actor` to its live `Character`, regardless of whether it's a
    /// connected user or an NPC instance.
    pub fn actor_character(&self, actor: crate::event::Actor) -> Option<&Character> {
        match actor {
            crate::event::Actor::User(id) => self.online_users.get(&id).map(|u| &u.character),
            crate::event::Actor::Npc(id) => self.npc_instances.get(&id).map(|n| &n.character),
        }
    }

    pub fn actor_character_mut(&mut self, actor: crate::event::Actor) -> Option<&mut Character> {
        match actor {
            crate::event::Actor::User(id) => self.online_users.get_mut(&id).map(|u| &mut u.character),
            crate::event::Actor::Npc(id) => self.npc_instances.get_mut(&id).map(|n| &mut n.character),
        }
    }

    pub fn move_npc(&mut self, id: InstanceId, to: RoomId) -> Option<RoomId> {
        let npc = self.npc_instances.get_mut(&id)?;
        let from = npc.character.room_id;
        if !self.rooms.contains_key(&to) {
            return None;
        }
        if let Some(room) = self.rooms.get_mut(&from) {
            room.present_npcs.remove(&id);
        }
        npc.character.room_id = to;
        self.rooms.get_mut(&to).expect("checked above").present_npcs.insert(id);
        Some(from)
    }

    /// Moves either kind of actor, dispatching to `move_user`/`move_npc`.
    pub fn move_actor(&mut self, actor: crate::event::Actor, to: RoomId) -> Option<RoomId> {
        match actor {
            crate::event::Actor::User(id) => self.move_user(id, to),
            crate::event::Actor::Npc(id) => self.move_npc(id, to),
        }
    }

    /// Presence invariant: for every loaded room R, the set of NPC instances whose
    /// `character.room_id == R` equals R's recorded NPC-id set. Used by tests; a production
    /// server should never observe this return a mismatch.
    #[cfg(test)]
    pub fn check_presence_invariant(&self) -> bool {
        for room in self.rooms.values() {
            let actual: std::collections::HashSet<InstanceId> = self
                .npc_instances
                .values()
                .filter(|n| n.character.room_id == room.id)
                .map(|n| n.id)
                .collect();
            if actual != room.present_npcs {
                return false;
            }
        }
        true
    }
}

/// Test-only helpers for constructing a minimal `World` without a real content store.
#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::world::content_store::InMemoryContentStore;

    pub fn empty_world() -> World {
        let store = Arc::new(InMemoryContentStore::new());
        store.seed(Room::new(RoomId(1), "Start", "The starting room."));
        World::new(store, 200, 64)
    }
}
