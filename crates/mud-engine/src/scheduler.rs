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

//! The scheduler is the single-threaded cooperative core that owns the `World`. It ticks
//! the turn/round clock, drains the event queue under its fairness rules, runs the NPC
//! autonomy pass on every `NewRound`, and is the only place `Input` events turn into actual
//! command dispatch -- everything else (script hooks, achievements, logging) subscribes through
//! the generic `ListenerRegistry` instead.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver};
use mud_common::config::{ClockConfig, NpcConfig};
use mud_common::{ConnectionId, Turn, UserId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::warn;

use crate::broadcaster::Broadcaster;
use crate::event::{Actor, DispatchFlags, Directive, Event, EventBody, Priority};
use crate::listener::{Listener, ListenerPriority, ListenerRegistry};
use crate::npc::conversation::ConversationDriver;
use crate::npc::hostility::HostilityLedger;
use crate::npc::path::Pathfinder;
use crate::npc::{self, NpcRoundConfig};
use crate::queue::EventQueue;
use crate::script::ScriptRuntime;
use crate::session::UserRegistry;
use crate::tasks::hooks::run_room_hook;
use crate::tasks::{dispatch_command, normalize, CommandContext, CommandTable, EmoteAliasTable, KeywordAliasTable};
use crate::world::World;

/// Out-of-band requests from the connection layer that mutate `World` membership rather than
/// dispatching a command: login attaches a freshly authenticated user's character, logout
/// detaches and persists it back. Kept off the `input_rx` channel since neither carries text a
/// command table would ever see -- login/logout are connection-manager events, not `Input`.
pub enum SchedulerControl {
    Login { user: UserId, connection: ConnectionId },
    Logout { user: UserId },
}

/// Runs the command dispatch table against every `Input` event, recording the resulting
/// `DispatchFlags` and any further-emitted events for the scheduler to pick up -- those events
/// become visible only on subsequent drain cycles, never the one that produced them.
struct CommandDispatchListener {
    table: Arc<CommandTable>,
    keywords: KeywordAliasTable,
    emotes: EmoteAliasTable,
    broadcaster: Arc<dyn Broadcaster>,
    scripts: ScriptRuntime,
    flags_out: Arc<Mutex<HashMap<Actor, DispatchFlags>>>,
    pending_out: Arc<Mutex<Vec<Event>>>,
}

impl Listener for CommandDispatchListener {
    fn handle(&mut self, event: &Event, world: &mut crate::world::World) -> Directive {
        let EventBody::Input { actor, text } = &event.body else {
            return Directive::Continue;
        };
        let actor = *actor;
        let Some(room) = world.actor_character(actor).map(|c| c.room_id) else {
            return Directive::Cancel; // target no longer exists
        };

        let (verb, rest) = normalize(text, &self.keywords, &self.emotes);
        let mut flags = DispatchFlags::default();
        let mut ctx = CommandContext {
            actor,
            room,
            rest: &rest,
            world,
            flags: &mut flags,
            broadcaster: self.broadcaster.as_ref(),
            emit: Vec::new(),
            scripts: Some(&self.scripts),
        };
        let outcome = dispatch_command(&self.table, &verb, &mut ctx);
        run_room_hook(&mut ctx, room, "on_command");
        let emitted = std::mem::take(&mut ctx.emit);

        if let Actor::User(user) = actor {
            if let Some(err) = &outcome.error {
                self.broadcaster.send_to_user(user, &format!("{err}\n"));
            } else if !outcome.handled {
                self.broadcaster.send_to_user(user, "Unrecognized command.\n");
            }
        }

        self.flags_out.lock().unwrap().insert(actor, flags);
        self.pending_out.lock().unwrap().extend(emitted);
        Directive::Continue
    }
}

/// Delivers `Broadcast` events to every connection via the registry-wide broadcast primitive.
/// Distinct from `CommandDispatchListener`'s per-user replies: this is how game logic (and the
/// admin shutdown countdown) reaches everyone at once.
struct BroadcastListener {
    broadcaster: Arc<dyn Broadcaster>,
}

impl Listener for BroadcastListener {
    fn handle(&mut self, event: &Event, _world: &mut crate::world::World) -> Directive {
        if let EventBody::Broadcast { message } = &event.body {
            self.broadcaster.broadcast(message);
        }
        Directive::Continue
    }
}

pub struct Scheduler {
    queue: EventQueue,
    listeners: ListenerRegistry,
    world: World,
    broadcaster: Arc<dyn Broadcaster>,

    pathfinder: Box<dyn Pathfinder>,
    conversations: Box<dyn ConversationDriver>,
    hostility: HostilityLedger,
    npc_config: NpcRoundConfig,
    rng: StdRng,

    clock: ClockConfig,
    current_turn: Turn,
    blocked_actors: HashSet<Actor>,

    command_flags: Arc<Mutex<HashMap<Actor, DispatchFlags>>>,
    pending_emitted: Arc<Mutex<Vec<Event>>>,

    registry: Arc<parking_lot::Mutex<UserRegistry>>,
    input_rx: Receiver<(Actor, String)>,
    control_rx: Receiver<SchedulerControl>,
    shutdown_rx: Receiver<()>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        world: World,
        clock: ClockConfig,
        npc: &NpcConfig,
        commands: CommandTable,
        keywords: KeywordAliasTable,
        emotes: EmoteAliasTable,
        broadcaster: Arc<dyn Broadcaster>,
        scripts: ScriptRuntime,
        pathfinder: Box<dyn Pathfinder>,
        conversations: Box<dyn ConversationDriver>,
        registry: Arc<parking_lot::Mutex<UserRegistry>>,
        input_rx: Receiver<(Actor, String)>,
        control_rx: Receiver<SchedulerControl>,
        shutdown_rx: Receiver<()>,
    ) -> Self {
        let command_flags = Arc::new(Mutex::new(HashMap::new()));
        let pending_emitted = Arc::new(Mutex::new(Vec::new()));

        let mut listeners = ListenerRegistry::new();
        listeners.register(
            crate::event::EventKind::Input,
            ListenerPriority::Normal,
            Box::new(CommandDispatchListener {
                table: Arc::new(commands),
                keywords,
                emotes,
                broadcaster: broadcaster.clone(),
                scripts,
                flags_out: command_flags.clone(),
                pending_out: pending_emitted.clone(),
            }),
        );
        listeners.register(
            crate::event::EventKind::Broadcast,
            ListenerPriority::Normal,
            Box::new(BroadcastListener { broadcaster: broadcaster.clone() }),
        );

        Self {
            queue: EventQueue::new(),
            listeners,
            world,
            broadcaster,
            pathfinder,
            conversations,
            hostility: HostilityLedger::default(),
            npc_config: NpcRoundConfig {
                max_mob_boredom: npc.max_mob_boredom,
                mob_unload_threshold: npc.mob_unload_threshold,
                command_delay_turns: npc.command_delay_turns,
                home_impossible_damage_pct: npc.home_impossible_damage_pct,
            },
            rng: StdRng::from_os_rng(),
            clock,
            current_turn: Turn::ZERO,
            blocked_actors: HashSet::new(),
            command_flags,
            pending_emitted,
            registry,
            input_rx,
            control_rx,
            shutdown_rx,
        }
    }

    /// Applies a login or logout request, run inline with the rest of the turn so `World`
    /// membership only ever changes from the scheduler's own thread.
    fn apply_control(&mut self, control: SchedulerControl) {
        match control {
            SchedulerControl::Login { user, connection } => {
                // A zombied connection reconnecting rebinds the existing online user rather
                // than spawning a second one and re-announcing PlayerSpawn.
                if let Some(online) = self.world.online_user_mut(user) {
                    online.connection_id = connection;
                    return;
                }
                let character = match self.registry.lock().user(user) {
                    Some(u) => u.character.clone(),
                    None => {
                        warn!(user = user.0, "login control for unknown user");
                        return;
                    }
                };
                let room = character.room_id;
                if let Err(e) = self.world.load_room(room) {
                    warn!(user = user.0, room = ?room, error = %e, "failed to load home room on login");
                }
                self.world.spawn_user(user, connection, character);
                self.enqueue(Event::new(EventBody::PlayerSpawn { user, room }, Priority::NOTIFY, self.current_turn));
            }
            SchedulerControl::Logout { user } => {
                if let Some(online) = self.world.despawn_user(user) {
                    let room = online.character.room_id;
                    if let Some(registry_user) = self.registry.lock().user_mut(user) {
                        registry_user.character = online.character;
                    }
                    self.enqueue(Event::new(EventBody::PlayerDespawn { user, room }, Priority::NOTIFY, self.current_turn));
                }
            }
        }
    }

    pub fn current_turn(&self) -> Turn {
        self.current_turn
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn listeners_mut(&mut self) -> &mut ListenerRegistry {
        &mut self.listeners
    }

    /// Queues an event for dispatch, subject to the queue's own dedup/defer rules.
    pub fn enqueue(&mut self, event: Event) -> bool {
        self.queue.enqueue(event, self.current_turn)
    }

    pub fn submit_input(&mut self, actor: Actor, text: String) -> bool {
        self.enqueue(Event::new(EventBody::Input { actor, text }, Priority::INPUT, self.current_turn))
    }

    /// Advances the clock by exactly one turn: promotes deferred events, emits `NewTurn`/
    /// `NewRound`, runs the NPC autonomy pass on round boundaries, then drains ready events under
    /// the per-turn work budget and fairness rules.
    pub fn tick(&mut self) {
        self.current_turn = self.current_turn.succ();
        self.queue.promote_ready(self.current_turn);

        self.enqueue(Event::new(EventBody::NewTurn { turn: self.current_turn }, Priority::CLOCK, self.current_turn));

        if self.current_turn.0 % self.clock.turns_per_round == 0 {
            let round = self.current_turn.round(self.clock.turns_per_round);
            self.enqueue(Event::new(EventBody::NewRound { round }, Priority::CLOCK, self.current_turn));
            self.run_npc_round();
            self.hostility.decay();
            for evicted in self.world.tick_eviction() {
                tracing::debug!(room = ?evicted, "room evicted on round boundary");
            }
        }

        self.drain_turn();
    }

    fn run_npc_round(&mut self) {
        let outcome = npc::run_round(
            &mut self.world,
            self.pathfinder.as_ref(),
            self.conversations.as_ref(),
            &self.npc_config,
            self.current_turn,
            &mut self.rng,
        );
        for event in outcome.queued {
            self.enqueue(event);
        }
        for (instance, mob, room) in outcome.despawned {
            self.enqueue(Event::new(
                EventBody::MobDeath { instance, mob, room },
                Priority::NOTIFY,
                self.current_turn,
            ));
        }
    }

    fn drain_turn(&mut self) {
        let mut input_done_this_turn: HashSet<Actor> = HashSet::new();
        let mut requeue_for_next: Vec<Event> = Vec::new();
        let next_turn = self.current_turn.succ();
        let mut drained = 0usize;

        while drained < self.clock.per_turn_work_budget {
            let Some(mut event) = self.queue.pop_ready() else { break };
            drained += 1;

            if let Some(actor) = event.body.fairness_actor() {
                if input_done_this_turn.contains(&actor) || self.blocked_actors.contains(&actor) {
                    // Fairness rule 1/2: hold this actor's second input (or a blocked actor's
                    // input) for the next turn rather than dispatching it now.
                    event.is_requeue = true;
                    event.ready_turn = next_turn;
                    requeue_for_next.push(event);
                    continue;
                }
            }

            let directive = self.listeners.dispatch(&event, &mut self.world);

            if let Some(actor) = event.body.fairness_actor() {
                input_done_this_turn.insert(actor);
                if let Some(flags) = self.command_flags.lock().unwrap().remove(&actor) {
                    if flags.block_input {
                        self.blocked_actors.insert(actor);
                    }
                    if flags.unblock_input {
                        self.blocked_actors.remove(&actor);
                    }
                    // `block_input_until_complete` blocks only for the handler's own (already
                    // synchronous) execution, so by the time we observe the flag there is
                    // nothing further to hold.
                }
            }

            match directive {
                Directive::Continue | Directive::Cancel => {}
                Directive::CancelAndRequeue => {
                    if event.is_requeue {
                        warn!(?event, "dropping event after exceeding one requeue cycle");
                    } else {
                        event.is_requeue = true;
                        event.ready_turn = next_turn;
                        requeue_for_next.push(event);
                    }
                }
            }
        }

        // Work that exceeded the budget is requeued rather than dropped.
        while let Some(mut event) = self.queue.pop_ready() {
            event.is_requeue = true;
            event.ready_turn = next_turn;
            requeue_for_next.push(event);
        }

        for event in requeue_for_next {
            self.queue.enqueue(event, self.current_turn);
        }

        // Events emitted by listeners/handlers during this drain become visible only next cycle.
        let emitted: Vec<Event> = self.pending_emitted.lock().unwrap().drain(..).collect();
        for event in emitted {
            self.queue.enqueue(event, self.current_turn);
        }
    }

    /// The main worker loop: ticks every `turn_ms`, draining the connection-input channel
    /// and the shutdown channel cooperatively in between ticks. Returns when the shutdown channel
    /// fires, always finishing the turn already in progress first.
    pub fn run(mut self) {
        let turn_period = Duration::from_millis(self.clock.turn_ms);
        loop {
            let tick_deadline = Instant::now() + turn_period;
            loop {
                let remaining = tick_deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                select! {
                    recv(self.input_rx) -> msg => {
                        if let Ok((actor, text)) = msg {
                            self.submit_input(actor, text);
                        }
                    }
                    recv(self.control_rx) -> msg => {
                        if let Ok(control) = msg {
                            self.apply_control(control);
                        }
                    }
                    recv(self.shutdown_rx) -> _ => return,
                    default(remaining) => break,
                }
            }
            self.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::MockBroadcaster;
    use crate::npc::conversation::NoOpConversationDriver;
    use crate::npc::path::NoOpPathfinder;
    use mud_common::UserId;

    fn scheduler_for_tests() -> (Scheduler, Arc<MockBroadcaster>, crossbeam_channel::Sender<(Actor, String)>) {
        // Leaked rather than threaded through every call site: these are short-lived unit tests,
        // not a long-running process, so the directory's lifetime doesn't matter.
        let registry_dir = Box::leak(Box::new(tempfile::tempdir().unwrap()));
        let world = crate::world::test_support::empty_world();
        let commands = crate::tasks::builtin_table();
        let broadcaster = MockBroadcaster::new();
        let (input_tx, input_rx) = crossbeam_channel::unbounded();
        let (_control_tx, control_rx) = crossbeam_channel::unbounded();
        let (_shutdown_tx, shutdown_rx) = crossbeam_channel::unbounded();
        let registry = UserRegistry::open(registry_dir.path().join("users.idx"), &mud_common::config::SessionConfig::default())
            .unwrap();
        let scripts = crate::script::ScriptRuntime::new(
            Arc::new(crate::script::ScriptHost::new(mud_common::config::ScriptConfig::default())),
            registry_dir.path().join("scripts"),
        );
        let scheduler = Scheduler::new(
            world,
            ClockConfig::default(),
            &NpcConfig::default(),
            commands,
            KeywordAliasTable::new(),
            EmoteAliasTable::new(),
            broadcaster.clone() as Arc<dyn Broadcaster>,
            scripts,
            Box::new(NoOpPathfinder),
            Box::new(NoOpConversationDriver),
            Arc::new(parking_lot::Mutex::new(registry)),
            input_rx,
            control_rx,
            shutdown_rx,
        );
        (scheduler, broadcaster, input_tx)
    }

    #[test]
    fn second_input_for_same_actor_in_one_turn_is_deferred_to_the_next() {
        let (mut scheduler, broadcaster, _tx) = scheduler_for_tests();
        let user = UserId(1);
        scheduler.world_mut().spawn_user(
            user,
            mud_common::ConnectionId(1),
            crate::world::character::Character::new("Hero", mud_common::RoomId(1)),
        );
        broadcaster.mark_connected(user);

        scheduler.submit_input(Actor::User(user), "look".to_string());
        scheduler.submit_input(Actor::User(user), "look".to_string());
        scheduler.tick();
        // Only one of the two dispatched this turn; the other should still be waiting.
        assert_eq!(broadcaster.sent_to(user).len(), 1);

        scheduler.tick();
        assert_eq!(broadcaster.sent_to(user).len(), 2);
    }

    #[test]
    fn new_round_event_fires_every_turns_per_round_turns() {
        let (mut scheduler, _broadcaster, _tx) = scheduler_for_tests();
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        struct RoundCounter(Arc<std::sync::atomic::AtomicUsize>);
        impl Listener for RoundCounter {
            fn handle(&mut self, event: &Event, _world: &mut World) -> Directive {
                if matches!(event.body, EventBody::NewRound { .. }) {
                    self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
                Directive::Continue
            }
        }
        scheduler
            .listeners_mut()
            .register_wildcard(ListenerPriority::Last, Box::new(RoundCounter(count.clone())));

        let turns_per_round = scheduler.clock.turns_per_round;
        for _ in 0..turns_per_round {
            scheduler.tick();
        }
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn unrecognized_verb_reports_back_to_the_user() {
        let (mut scheduler, broadcaster, _tx) = scheduler_for_tests();
        let user = UserId(7);
        scheduler.world_mut().spawn_user(
            user,
            mud_common::ConnectionId(1),
            crate::world::character::Character::new("Hero", mud_common::RoomId(1)),
        );
        broadcaster.mark_connected(user);
        scheduler.submit_input(Actor::User(user), "frobnicate".to_string());
        scheduler.tick();
        assert!(broadcaster.sent_to(user).iter().any(|m| m.contains("Unrecognized")));
    }
}
