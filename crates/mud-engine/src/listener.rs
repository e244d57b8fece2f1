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

use tracing::warn;

use crate::event::{Directive, Event, EventKind};
use crate::world::World;

/// Where in a type's listener chain a subscriber runs. Wildcard and typed listeners are kept in
/// separate buckets but dispatched First -> Normal -> Last within each, wildcard first so
/// cross-cutting concerns (logging, hooks) see the event before type-specific handling.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ListenerPriority {
    First,
    Normal,
    Last,
}

/// A subscriber to one event kind (or every kind, via the wildcard registration). Listeners run
/// on the main worker and must not suspend.
pub trait Listener: Send {
    fn handle(&mut self, event: &Event, world: &mut World) -> Directive;
}

struct Registration {
    priority: ListenerPriority,
    order: u64,
    listener: Box<dyn Listener>,
}

/// Registry of listeners keyed by event kind, plus a wildcard bucket that sees everything.
/// Registration is expected at startup and by dynamic script subscribers; lookups happen every
/// tick, so the per-kind vectors are kept pre-sorted by `(priority, order)`.
#[derive(Default)]
pub struct ListenerRegistry {
    by_kind: HashMap<EventKind, Vec<Registration>>,
    wildcard: Vec<Registration>,
    next_order: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: EventKind, priority: ListenerPriority, listener: Box<dyn Listener>) {
        let order = self.next_order;
        self.next_order += 1;
        let reg = Registration { priority, order, listener };
        let bucket = self.by_kind.entry(kind).or_default();
        bucket.push(reg);
        bucket.sort_by_key(|r| (priority_rank(r.priority), r.order));
    }

    pub fn register_wildcard(&mut self, priority: ListenerPriority, listener: Box<dyn Listener>) {
        let order = self.next_order;
        self.next_order += 1;
        self.wildcard.push(Registration { priority, order, listener });
        self.wildcard.sort_by_key(|r| (priority_rank(r.priority), r.order));
    }

    /// Runs every applicable listener (wildcard first, then typed) for `event` against `world`.
    /// A listener panic or internal error is caught and logged as `Continue`: one faulty
    /// listener must never stop the rest of dispatch. Returns the final
    /// directive: `Cancel`/`CancelAndRequeue` short-circuit the remaining chain.
    pub fn dispatch(&mut self, event: &Event, world: &mut World) -> Directive {
        for reg in self.wildcard.iter_mut() {
            match run_listener_guarded(reg.listener.as_mut(), event, world) {
                Directive::Continue => continue,
                other => return other,
            }
        }
        if let Some(bucket) = self.by_kind.get_mut(&event.kind()) {
            for reg in bucket.iter_mut() {
                match run_listener_guarded(reg.listener.as_mut(), event, world) {
                    Directive::Continue => continue,
                    other => return other,
                }
            }
        }
        Directive::Continue
    }
}

fn priority_rank(p: ListenerPriority) -> u8 {
    match p {
        ListenerPriority::First => 0,
        ListenerPriority::Normal => 1,
        ListenerPriority::Last => 2,
    }
}

fn run_listener_guarded(listener: &mut dyn Listener, event: &Event, world: &mut World) -> Directive {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener.handle(event, world))) {
        Ok(directive) => directive,
        Err(_) => {
            warn!(?event, "listener panicked; treating as Continue");
            Directive::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Actor, EventBody, Priority};
    use crate::world::test_support::empty_world;
    use mud_common::{Turn, UserId};

    struct Counter(std::sync::Arc<std::sync::atomic::AtomicUsize>);
    impl Listener for Counter {
        fn handle(&mut self, _event: &Event, _world: &mut World) -> Directive {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Directive::Continue
        }
    }

    struct Canceler;
    impl Listener for Canceler {
        fn handle(&mut self, _event: &Event, _world: &mut World) -> Directive {
            Directive::Cancel
        }
    }

    #[test]
    fn wildcard_runs_before_typed_and_both_run_on_continue() {
        let mut reg = ListenerRegistry::new();
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        reg.register_wildcard(ListenerPriority::Normal, Box::new(Counter(count.clone())));
        reg.register(EventKind::Input, ListenerPriority::Normal, Box::new(Counter(count.clone())));
        let mut world = empty_world();
        let event = Event::new(
            EventBody::Input { actor: Actor::User(UserId(1)), text: "x".into() },
            Priority::INPUT,
            Turn(0),
        );
        reg.dispatch(&event, &mut world);
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn cancel_stops_remaining_listeners() {
        let mut reg = ListenerRegistry::new();
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        reg.register(EventKind::Input, ListenerPriority::First, Box::new(Canceler));
        reg.register(EventKind::Input, ListenerPriority::Normal, Box::new(Counter(count.clone())));
        let mut world = empty_world();
        let event = Event::new(
            EventBody::Input { actor: Actor::User(UserId(1)), text: "x".into() },
            Priority::INPUT,
            Turn(0),
        );
        let directive = reg.dispatch(&event, &mut world);
        assert_eq!(directive, Directive::Cancel);
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
