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

//! What the engine does with the actions a script queued, once its sandbox run has returned.
//! Scripts never see `World` directly (see `api.rs`); this is the only place their queued
//! verbs actually take effect.

use mud_common::MobId;

use crate::broadcaster::Broadcaster;
use crate::event::Actor;
use crate::npc::instance::NpcInstance;
use crate::script::api::ScriptAction;
use crate::world::character::{Buff, Character};
use crate::world::room::{Exit, Mutator};
use crate::world::World;

pub fn apply_actions(actions: &[ScriptAction], world: &mut World, broadcaster: &dyn Broadcaster) {
    for action in actions {
        apply_one(action, world, broadcaster);
    }
}

fn apply_one(action: &ScriptAction, world: &mut World, broadcaster: &dyn Broadcaster) {
    match action {
        ScriptAction::SpawnMob { mob_name, room } => {
            if !world.is_room_loaded(*room) {
                return;
            }
            let id = world.next_instance_id();
            let character = Character::new(mob_name.clone(), *room);
            // No mob blueprint database exists in this core; the instance carries the script's
            // chosen name with default stats rather than a template lookup.
            world.insert_npc(NpcInstance::new(id, MobId(0), character, *room));
        }
        ScriptAction::GiveItem { user, item } => {
            if let Some(character) = world.actor_character_mut(Actor::User(*user)) {
                character.inventory.push(item.clone());
            }
        }
        ScriptAction::SendText { user, text } => {
            broadcaster.send_to_user(*user, &format!("{text}\n"));
        }
        ScriptAction::AddBuff { user, name, rounds } => {
            if let Some(character) = world.actor_character_mut(Actor::User(*user)) {
                character.buffs.push(Buff { name: name.clone(), rounds_remaining: *rounds });
            }
        }
        ScriptAction::AddTempExit { room, direction, target, rounds } => {
            if let Some(r) = world.get_room_mut(*room) {
                r.exits.insert(direction.clone(), Exit { target: *target, locked: false, secret: false });
                r.mutators.push(Mutator { name: format!("temp_exit:{direction}"), rounds_remaining: Some(*rounds) });
            }
        }
        ScriptAction::SetMutator { room, name, rounds } => {
            if let Some(r) = world.get_room_mut(*room) {
                r.mutators.push(Mutator { name: name.clone(), rounds_remaining: *rounds });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::MockBroadcaster;
    use mud_common::{RoomId, UserId};

    #[test]
    fn give_item_reaches_online_user_inventory() {
        let mut world = crate::world::test_support::empty_world();
        let user = UserId(1);
        world.spawn_user(user, mud_common::ConnectionId(1), Character::new("Hero", RoomId(1)));
        let broadcaster = MockBroadcaster::new();
        apply_actions(&[ScriptAction::GiveItem { user, item: "torch".to_string() }], &mut world, broadcaster.as_ref());
        assert_eq!(world.actor_character(Actor::User(user)).unwrap().inventory, vec!["torch".to_string()]);
    }

    #[test]
    fn send_text_goes_through_the_broadcaster() {
        let mut world = crate::world::test_support::empty_world();
        let user = UserId(2);
        let broadcaster = MockBroadcaster::new();
        apply_actions(&[ScriptAction::SendText { user, text: "hi".to_string() }], &mut world, broadcaster.as_ref());
        assert!(broadcaster.sent_to(user).iter().any(|m| m.contains("hi")));
    }

    #[test]
    fn add_temp_exit_is_visible_and_carries_a_countdown_mutator() {
        let mut world = crate::world::test_support::empty_world();
        let broadcaster = MockBroadcaster::new();
        apply_actions(
            &[ScriptAction::AddTempExit { room: RoomId(1), direction: "down".to_string(), target: RoomId(2), rounds: 5 }],
            &mut world,
            broadcaster.as_ref(),
        );
        let room = world.get_room(RoomId(1)).unwrap();
        assert!(room.exits.contains_key("down"));
        assert!(room.mutators.iter().any(|m| m.name == "temp_exit:down" && m.rounds_remaining == Some(5)));
    }
}
