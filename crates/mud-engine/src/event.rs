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

//! Events are value-typed: every variant carries ids, never references, so a queued event can
//! outlive the handler that produced it without entangling lifetimes with the world. See
//! `DESIGN.md` for why this is a tagged union rather than dynamic dispatch.

use mud_common::{ConnectionId, InstanceId, MobId, RoomId, Turn, UserId};

/// Discriminant used to key the listener registry. Kept separate from `EventBody` so wildcard
/// listener lookups and dedup bookkeeping don't need to match on payloads.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum EventKind {
    Input,
    NewTurn,
    NewRound,
    RoomChange,
    Broadcast,
    Communication,
    RedrawPrompt,
    RebuildMap,
    Buff,
    PlayerSpawn,
    PlayerDespawn,
    LevelUp,
    MobDeath,
    PlayerDeath,
    DayNightCycle,
}

/// The actor a queued command is executed on behalf of: a logged-in player or an NPC instance.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Actor {
    User(UserId),
    Npc(InstanceId),
}

/// An event awaiting dedup or wait-queue keying. Only a handful of kinds carry one; see
/// `EventBody::unique_key`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UniqueKey {
    RedrawPrompt(UserId),
    RebuildMap(RoomId),
}

/// Flags a command handler may set on the event it is processing. These ride along on the
/// dispatch context rather than the event itself, since they're produced *during* handling.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct DispatchFlags {
    /// Suppresses further `Input` events for this actor until `unblock_input` or
    /// `block_until_complete` clears.
    pub block_input: bool,
    pub unblock_input: bool,
    /// Combines `block_input` with automatic clearing when the handler returns.
    pub block_input_until_complete: bool,
    /// Suppresses room-observer messages generated directly by the executing handler. This
    /// does not propagate to events the handler goes on to enqueue; only its own direct room
    /// messages are suppressed.
    pub secretly: bool,
    /// Skips invoking any script hook (e.g. onCommand) for this dispatch.
    pub skip_scripts: bool,
}

/// The payload carried by a queued event.
#[derive(Clone, Debug)]
pub enum EventBody {
    Input {
        actor: Actor,
        text: String,
    },
    NewTurn {
        turn: Turn,
    },
    NewRound {
        round: mud_common::Round,
    },
    RoomChange {
        who: Actor,
        from: Option<RoomId>,
        to: RoomId,
    },
    Broadcast {
        message: String,
    },
    Communication {
        from: Actor,
        to_room: RoomId,
        message: String,
    },
    RedrawPrompt {
        user: UserId,
    },
    RebuildMap {
        root_room: RoomId,
    },
    Buff {
        target: Actor,
        buff_name: String,
    },
    PlayerSpawn {
        user: UserId,
        room: RoomId,
    },
    PlayerDespawn {
        user: UserId,
        room: RoomId,
    },
    LevelUp {
        user: UserId,
        new_level: u32,
    },
    MobDeath {
        instance: InstanceId,
        mob: MobId,
        room: RoomId,
    },
    PlayerDeath {
        user: UserId,
        room: RoomId,
    },
    DayNightCycle {
        is_day: bool,
    },
}

impl EventBody {
    pub fn kind(&self) -> EventKind {
        match self {
            EventBody::Input { .. } => EventKind::Input,
            EventBody::NewTurn { .. } => EventKind::NewTurn,
            EventBody::NewRound { .. } => EventKind::NewRound,
            EventBody::RoomChange { .. } => EventKind::RoomChange,
            EventBody::Broadcast { .. } => EventKind::Broadcast,
            EventBody::Communication { .. } => EventKind::Communication,
            EventBody::RedrawPrompt { .. } => EventKind::RedrawPrompt,
            EventBody::RebuildMap { .. } => EventKind::RebuildMap,
            EventBody::Buff { .. } => EventKind::Buff,
            EventBody::PlayerSpawn { .. } => EventKind::PlayerSpawn,
            EventBody::PlayerDespawn { .. } => EventKind::PlayerDespawn,
            EventBody::LevelUp { .. } => EventKind::LevelUp,
            EventBody::MobDeath { .. } => EventKind::MobDeath,
            EventBody::PlayerDeath { .. } => EventKind::PlayerDeath,
            EventBody::DayNightCycle { .. } => EventKind::DayNightCycle,
        }
    }

    /// Events whose queued instance should collapse to at-most-one per key. Most kinds have no
    /// unique key and are never deduplicated.
    pub fn unique_key(&self) -> Option<UniqueKey> {
        match self {
            EventBody::RedrawPrompt { user } => Some(UniqueKey::RedrawPrompt(*user)),
            EventBody::RebuildMap { root_room } => Some(UniqueKey::RebuildMap(*root_room)),
            _ => None,
        }
    }

    /// The actor this event is dispatched "as", for fairness bookkeeping. Only `Input` events
    /// participate in the one-per-turn/per-actor fairness rule.
    pub fn fairness_actor(&self) -> Option<Actor> {
        match self {
            EventBody::Input { actor, .. } => Some(*actor),
            _ => None,
        }
    }
}

/// Priority class; lower dispatches first. Ties within a class break on insertion order
/// (`insertion_seq`), giving FIFO ordering among equally-prioritized, equally-ready events.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Priority(pub u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(0);
    pub const CLOCK: Priority = Priority(10);
    pub const INPUT: Priority = Priority(20);
    pub const NPC: Priority = Priority(30);
    pub const NOTIFY: Priority = Priority(40);
    pub const LOWEST: Priority = Priority(255);
}

/// A queued scheduler record: the payload plus its ordering keys. `ready_turn` defers dispatch
/// until the clock reaches it; `is_requeue` marks events that were bounced back for fairness or
/// by a `CancelAndRequeue` listener, so a handler can refuse to requeue twice.
#[derive(Clone, Debug)]
pub struct Event {
    pub body: EventBody,
    pub priority: Priority,
    pub ready_turn: Turn,
    pub is_requeue: bool,
    pub flags: DispatchFlags,
    pub(crate) insertion_seq: u64,
}

impl Event {
    pub fn new(body: EventBody, priority: Priority, ready_turn: Turn) -> Self {
        Self {
            body,
            priority,
            ready_turn,
            is_requeue: false,
            flags: DispatchFlags::default(),
            insertion_seq: 0,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }

    pub fn unique_key(&self) -> Option<UniqueKey> {
        self.body.unique_key()
    }
}

/// What a listener wants the scheduler to do next with the event it just saw.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Directive {
    /// Run the next listener for this event.
    Continue,
    /// Stop processing this event; no further listeners run.
    Cancel,
    /// Reinsert the event for the next scheduler cycle. A listener that sees `is_requeue`
    /// already set on the event must not return this again, to bound requeuing to one cycle.
    CancelAndRequeue,
}
