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

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }
    };
}

id_type!(ConnectionId, "A connection accepted by the connection manager, unique for the process lifetime.");
id_type!(UserId, "A registered account, stable across reconnects.");
id_type!(RoomId, "A room in the content store's room graph.");
id_type!(MobId, "A blueprint identifier for an NPC species/template, from the content store.");
id_type!(InstanceId, "A live NPC instance spawned from a MobId, distinct across respawns.");

/// Monotonic generator for [`ConnectionId`] and [`InstanceId`] values. The connection manager
/// and the world each own one; ids are never reused within a process run.
#[derive(Debug, Default)]
pub struct IdSequence(AtomicU64);

impl IdSequence {
    pub const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// The scheduler's turn counter. Turns advance at a fixed configured period regardless of
/// wall-clock drift; see [`crate::config::ClockConfig::turn_ms`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Turn(pub u64);

impl Turn {
    pub const ZERO: Turn = Turn(0);

    pub fn succ(self) -> Turn {
        Turn(self.0 + 1)
    }

    pub fn round(self, turns_per_round: u64) -> Round {
        Round(self.0 / turns_per_round.max(1))
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn {}", self.0)
    }
}

/// A coarser cycle of N turns; NPC passes and other round-scoped bookkeeping happen here.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Round(pub u64);

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_to_round_floor_divides() {
        assert_eq!(Turn(0).round(80), Round(0));
        assert_eq!(Turn(79).round(80), Round(0));
        assert_eq!(Turn(80).round(80), Round(1));
        assert_eq!(Turn(161).round(80), Round(2));
    }

    #[test]
    fn id_sequence_is_monotonic_and_never_repeats() {
        let seq = IdSequence::new();
        let a = seq.next();
        let b = seq.next();
        let c = seq.next();
        assert!(a < b && b < c);
    }
}
