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

//! Drives NPC behavior without per-NPC OS threads. `run_round` is called once per
//! `NewRound` with the full set of NPC instances whose room is loaded; it never mutates the
//! world directly beyond bookkeeping on the instances themselves (boredom, path queue, temp
//! flags) -- every actual command is queued as an `Input` event so it goes through the same
//! fairness and ordering machinery as a player's input (point 5).

use mud_common::{InstanceId, MobId, RoomId, Turn};
use rand::Rng;

use crate::event::{Actor, Event, EventBody, Priority};
use crate::npc::conversation::ConversationDriver;
use crate::npc::hostility::HostilityLedger;
use crate::npc::path::Pathfinder;
use crate::world::World;

pub struct NpcRoundConfig {
    pub max_mob_boredom: u32,
    pub mob_unload_threshold: usize,
    pub command_delay_turns: u64,
    pub home_impossible_damage_pct: f32,
}

pub struct NpcRoundOutcome {
    /// Commands queued as `Input` events for the scheduler; never executed inline.
    pub queued: Vec<Event>,
    /// NPCs that despawned this round (boredom, memory pressure, or the home-impossible
    /// self-damage path), paired with the room they died in for `MobDeath`.
    pub despawned: Vec<(InstanceId, MobId, RoomId)>,
}

/// Runs one round's autonomy pass over every NPC instance currently in a loaded room.
pub fn run_round(
    world: &mut World,
    pathfinder: &dyn Pathfinder,
    conversations: &dyn ConversationDriver,
    config: &NpcRoundConfig,
    current_turn: Turn,
    rng: &mut impl Rng,
) -> NpcRoundOutcome {
    let mut outcome = NpcRoundOutcome { queued: Vec::new(), despawned: Vec::new() };

    for id in world.npc_ids() {
        let room_loaded = world.npc(id).map(|n| world.is_room_loaded(n.character.room_id)).unwrap_or(false);
        if !room_loaded {
            continue;
        }
        let any_player_present = world
            .npc(id)
            .and_then(|n| world.get_room(n.character.room_id))
            .map(|r| !r.present_users.is_empty())
            .unwrap_or(false);

        let Some(npc) = world.npc_mut(id) else { continue };

        // 1. Combat priority preempts everything else.
        if let Some(target) = npc.character.aggro_target {
            let cmd = pick_random(&npc.combat_commands, "attack", rng);
            queue_command(&mut outcome.queued, id, cmd, npc.last_command_turn, config.command_delay_turns, current_turn);
            npc.last_command_turn = Turn(current_turn.0 + config.command_delay_turns);
            let _ = target; // target resolution is the command handler's job, not the loop's.
            continue;
        }

        // 2. Conversation drains before idle/path behavior.
        if npc.conversation_id > 0 {
            if let Some(action) = conversations.next_action(npc.conversation_id) {
                queue_command(&mut outcome.queued, id, action.text, npc.last_command_turn, config.command_delay_turns, current_turn);
                npc.last_command_turn = Turn(current_turn.0 + config.command_delay_turns);
                if action.completes {
                    npc.conversation_id = 0;
                }
            } else {
                npc.conversation_id = 0;
            }
            continue;
        }

        // 3. Path following, including the home-impossible giveaway mechanism.
        if npc.is_home_impossible() {
            let damage = (npc.character.stats.max_health as f32 * config.home_impossible_damage_pct / 100.0).ceil() as i32;
            npc.character.apply_damage(damage.max(1));
            if !npc.character.is_alive() {
                outcome.despawned.push((npc.id, npc.mob, npc.character.room_id));
            }
            continue;
        }

        if let Some(next) = npc.path_queue.pop_front() {
            queue_command(&mut outcome.queued, id, format!("goto {}", next.0), npc.last_command_turn, config.command_delay_turns, current_turn);
            npc.last_command_turn = Turn(current_turn.0 + config.command_delay_turns);
            continue;
        }

        if npc.character.room_id != npc.home_room && npc.path_queue.is_empty() {
            match pathfinder.find_path(npc.character.room_id, npc.home_room) {
                Some(route) => npc.path_queue = route,
                None => npc.mark_home_impossible(),
            }
            continue;
        }

        // 4. Idle behavior and boredom.
        if !any_player_present {
            npc.boredom += 1;
        } else {
            npc.boredom = 0;
        }

        let boredom_limit = if world.loaded_room_count() >= config.mob_unload_threshold {
            config.max_mob_boredom / 2
        } else {
            config.max_mob_boredom
        };
        if !npc.persistent && npc.boredom > boredom_limit {
            outcome.despawned.push((npc.id, npc.mob, npc.character.room_id));
            continue;
        }

        if rng.random_range(0..100) < npc.activity_level {
            let cmd = pick_random(&npc.idle_commands, "idle", rng);
            queue_command(&mut outcome.queued, id, cmd, npc.last_command_turn, config.command_delay_turns, current_turn);
            npc.last_command_turn = Turn(current_turn.0 + config.command_delay_turns);
        }
    }

    for (id, _, _) in &outcome.despawned {
        world.remove_npc(*id);
    }

    outcome
}

fn pick_random(options: &[String], fallback: &str, rng: &mut impl Rng) -> String {
    if options.is_empty() {
        fallback.to_string()
    } else {
        options[rng.random_range(0..options.len())].clone()
    }
}

fn queue_command(
    queued: &mut Vec<Event>,
    instance: InstanceId,
    text: impl Into<String>,
    last_command_turn: Turn,
    delay: u64,
    current_turn: Turn,
) {
    let ready_turn = Turn(last_command_turn.0.max(current_turn.0) + delay);
    queued.push(Event::new(
        EventBody::Input { actor: Actor::Npc(instance), text: text.into() },
        Priority::NPC,
        ready_turn,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npc::conversation::NoOpConversationDriver;
    use crate::npc::instance::NpcInstance;
    use crate::npc::path::NoOpPathfinder;
    use crate::world::character::Character;
    use mud_common::UserId;
    use rand::SeedableRng;

    fn cfg() -> NpcRoundConfig {
        NpcRoundConfig {
            max_mob_boredom: 50,
            mob_unload_threshold: 999,
            command_delay_turns: 4,
            home_impossible_damage_pct: 10.0,
        }
    }

    fn world_with_unreachable_home() -> World {
        let mut world = crate::world::state::test_support::empty_world();
        world.load_room(RoomId(1)).unwrap();
        let mut npc = NpcInstance::new(InstanceId(1), MobId(1), Character::new("Rat", RoomId(1)), RoomId(2));
        npc.character.room_id = RoomId(1);
        world.insert_npc(npc);
        world
    }

    #[test]
    fn unreachable_home_marks_impossible_then_self_damages_to_death() {
        let mut world = world_with_unreachable_home();
        let pathfinder = NoOpPathfinder;
        let conversations = NoOpConversationDriver;
        let config = cfg();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);

        // First pass: no path found, marks home-impossible, no damage yet.
        let out = run_round(&mut world, &pathfinder, &conversations, &config, Turn(0), &mut rng);
        assert!(out.despawned.is_empty());
        assert!(world.npc(InstanceId(1)).unwrap().is_home_impossible());

        // Ten subsequent passes apply 10% max health damage each; the NPC dies and is removed.
        let mut despawned = false;
        for t in 1..=10 {
            let out = run_round(&mut world, &pathfinder, &conversations, &config, Turn(t), &mut rng);
            if !out.despawned.is_empty() {
                despawned = true;
                assert_eq!(out.despawned[0].0, InstanceId(1));
                break;
            }
        }
        assert!(despawned, "expected the stuck NPC to despawn via MobDeath within ten passes");
        assert!(world.npc(InstanceId(1)).is_none());
    }

    #[test]
    fn idle_npc_with_player_present_does_not_accumulate_boredom() {
        let mut world = crate::world::state::test_support::empty_world();
        world.load_room(RoomId(1)).unwrap();
        let npc = NpcInstance::new(InstanceId(2), MobId(1), Character::new("Shopkeeper", RoomId(1)), RoomId(1));
        world.insert_npc(npc);
        world.spawn_user(UserId(1), mud_common::ConnectionId(1), Character::new("Hero", RoomId(1)));

        let pathfinder = NoOpPathfinder;
        let conversations = NoOpConversationDriver;
        let config = cfg();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        run_round(&mut world, &pathfinder, &conversations, &config, Turn(0), &mut rng);
        assert_eq!(world.npc(InstanceId(2)).unwrap().boredom, 0);
    }

    #[test]
    fn persistent_npc_never_despawns_from_boredom() {
        let mut world = crate::world::state::test_support::empty_world();
        world.load_room(RoomId(1)).unwrap();
        let mut npc = NpcInstance::new(InstanceId(3), MobId(1), Character::new("Shopkeeper", RoomId(1)), RoomId(1));
        npc.persistent = true;
        npc.boredom = 1000;
        world.insert_npc(npc);

        let pathfinder = NoOpPathfinder;
        let conversations = NoOpConversationDriver;
        let config = cfg();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let out = run_round(&mut world, &pathfinder, &conversations, &config, Turn(0), &mut rng);
        assert!(out.despawned.is_empty());
        assert!(world.npc(InstanceId(3)).is_some());
    }
}
