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

//! The engine core: event model, scheduler, world state, NPC autonomy, session/auth, the script
//! sandbox, and the built-in command surface. Everything in here is connection-agnostic; the
//! `mud-server` binary supplies transports and wires a [`Broadcaster`] so this crate never has to
//! know what a telnet socket or a WebSocket frame looks like.

pub mod broadcaster;
pub mod event;
pub mod listener;
pub mod npc;
pub mod queue;
pub mod scheduler;
pub mod script;
pub mod session;
pub mod tasks;
pub mod world;

pub use broadcaster::Broadcaster;
pub use event::{Actor, DispatchFlags, Directive, Event, EventBody, EventKind, Priority};
pub use listener::{Listener, ListenerPriority, ListenerRegistry};
pub use queue::EventQueue;
pub use scheduler::{Scheduler, SchedulerControl};
pub use world::World;
