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

//! The event queue orders by `(priority, insertion_sequence)`, defers events whose `ready_turn`
//! hasn't arrived into a side table indexed by turn, and collapses duplicate unique-keyed
//! events on enqueue. None of this needs a binary heap: events enter in small bursts per turn,
//! so a sorted insert into a small `Vec` is simpler and fast enough for the turn-paced workload
//! this is built for.

use std::collections::{BTreeMap, HashSet};

use mud_common::Turn;

use crate::event::{Event, UniqueKey};

#[derive(Default)]
pub struct EventQueue {
    /// Events whose ready_turn has already passed (or equals) the last-seen current turn,
    /// ordered by (priority, insertion_seq).
    ready: Vec<Event>,
    /// Events deferred until a future turn, indexed by that turn so the scheduler doesn't have
    /// to rescan the whole queue every tick.
    waiting: BTreeMap<u64, Vec<Event>>,
    /// Unique keys currently present in either `ready` or `waiting`, for O(1) dedup checks.
    pending_keys: HashSet<UniqueKey>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `event` for dispatch. Returns `false` if it was dropped due to a unique-key
    /// collision with an already-pending event of the same key.
    pub fn enqueue(&mut self, mut event: Event, current_turn: Turn) -> bool {
        if let Some(key) = event.unique_key() {
            if self.pending_keys.contains(&key) {
                return false;
            }
            self.pending_keys.insert(key);
        }
        event.insertion_seq = self.next_seq;
        self.next_seq += 1;

        if event.ready_turn.0 > current_turn.0 {
            self.waiting.entry(event.ready_turn.0).or_default().push(event);
        } else {
            insert_sorted(&mut self.ready, event);
        }
        true
    }

    /// Promote any waiting events whose `ready_turn` has arrived into the ready list. Called
    /// once per tick before draining.
    pub fn promote_ready(&mut self, current_turn: Turn) {
        let due: Vec<u64> = self
            .waiting
            .range(..=current_turn.0)
            .map(|(k, _)| *k)
            .collect();
        for turn in due {
            if let Some(events) = self.waiting.remove(&turn) {
                for event in events {
                    insert_sorted(&mut self.ready, event);
                }
            }
        }
    }

    /// Pop the next ready event in priority/FIFO order, if any.
    pub fn pop_ready(&mut self) -> Option<Event> {
        let event = if self.ready.is_empty() {
            None
        } else {
            Some(self.ready.remove(0))
        };
        if let Some(event) = &event {
            if let Some(key) = event.unique_key() {
                self.pending_keys.remove(&key);
            }
        }
        event
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_idle(&self) -> bool {
        self.ready.is_empty() && self.waiting.is_empty()
    }

    #[cfg(test)]
    pub fn waiting_len(&self) -> usize {
        self.waiting.values().map(|v| v.len()).sum()
    }
}

/// Insertion sort keyed on `(priority, insertion_seq)`. The ready list stays small (bounded by
/// the per-turn work budget plus whatever a burst enqueues), so linear insert beats the
/// bookkeeping overhead of a heap with removal-by-key support.
fn insert_sorted(ready: &mut Vec<Event>, event: Event) {
    let pos = ready
        .binary_search_by(|e| {
            (e.priority, e.insertion_seq).cmp(&(event.priority, event.insertion_seq))
        })
        .unwrap_or_else(|i| i);
    ready.insert(pos, event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Actor, Event, EventBody, Priority};
    use mud_common::UserId;

    fn input(user: u64, turn: u64) -> Event {
        Event::new(
            EventBody::Input {
                actor: Actor::User(UserId(user)),
                text: "look".to_string(),
            },
            Priority::INPUT,
            Turn(turn),
        )
    }

    #[test]
    fn fifo_within_same_priority() {
        let mut q = EventQueue::new();
        q.enqueue(input(1, 0), Turn(0));
        q.enqueue(input(2, 0), Turn(0));
        q.enqueue(input(3, 0), Turn(0));
        let EventBody::Input { actor: Actor::User(UserId(a)), .. } = q.pop_ready().unwrap().body else { panic!() };
        let EventBody::Input { actor: Actor::User(UserId(b)), .. } = q.pop_ready().unwrap().body else { panic!() };
        let EventBody::Input { actor: Actor::User(UserId(c)), .. } = q.pop_ready().unwrap().body else { panic!() };
        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[test]
    fn higher_priority_dispatches_first() {
        let mut q = EventQueue::new();
        let mut low = input(1, 0);
        low.priority = Priority::NOTIFY;
        let mut high = input(2, 0);
        high.priority = Priority::HIGHEST;
        q.enqueue(low, Turn(0));
        q.enqueue(high, Turn(0));
        let first = q.pop_ready().unwrap();
        assert_eq!(first.priority, Priority::HIGHEST);
    }

    #[test]
    fn ready_turn_in_the_future_is_deferred_not_dropped() {
        let mut q = EventQueue::new();
        q.enqueue(input(1, 5), Turn(0));
        assert_eq!(q.ready_len(), 0);
        assert_eq!(q.waiting_len(), 1);
        q.promote_ready(Turn(4));
        assert_eq!(q.ready_len(), 0);
        q.promote_ready(Turn(5));
        assert_eq!(q.ready_len(), 1);
    }

    #[test]
    fn unique_key_collision_drops_the_new_event() {
        let mut q = EventQueue::new();
        let redraw = |u| Event::new(EventBody::RedrawPrompt { user: UserId(u) }, Priority::NOTIFY, Turn(0));
        for _ in 0..10 {
            q.enqueue(redraw(42), Turn(0));
        }
        assert_eq!(q.ready_len(), 1);
    }

    #[test]
    fn distinct_keys_do_not_collide() {
        let mut q = EventQueue::new();
        let redraw = |u| Event::new(EventBody::RedrawPrompt { user: UserId(u) }, Priority::NOTIFY, Turn(0));
        q.enqueue(redraw(1), Turn(0));
        q.enqueue(redraw(2), Turn(0));
        assert_eq!(q.ready_len(), 2);
    }

    #[test]
    fn popping_frees_the_key_for_reuse() {
        let mut q = EventQueue::new();
        let redraw = || Event::new(EventBody::RedrawPrompt { user: UserId(1) }, Priority::NOTIFY, Turn(0));
        q.enqueue(redraw(), Turn(0));
        q.pop_ready();
        assert!(q.enqueue(redraw(), Turn(0)));
    }
}
