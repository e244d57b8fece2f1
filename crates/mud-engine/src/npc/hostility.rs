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

//! Threat assessment combines group allegiance, race/hates lists, alignment spread, and
//! explicit attacked-player history. The ledger decays independently of any
//! single NPC so a player who angers one member of a group stays "hot" with the whole group for
//! a bounded number of rounds even after that particular NPC despawns.

use std::collections::HashMap;

use mud_common::UserId;

use crate::npc::instance::NpcInstance;
use crate::world::character::Character;

/// group -> user -> rounds remaining before the grudge expires.
#[derive(Default)]
pub struct HostilityLedger {
    entries: HashMap<String, HashMap<UserId, u32>>,
}

impl HostilityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attack(&mut self, group: &str, user: UserId, decay_rounds: u32) {
        self.entries
            .entry(group.to_string())
            .or_default()
            .insert(user, decay_rounds);
    }

    pub fn is_hot(&self, group: &str, user: UserId) -> bool {
        self.entries
            .get(group)
            .and_then(|m| m.get(&user))
            .map(|rounds| *rounds > 0)
            .unwrap_or(false)
    }

    /// Decays every entry by one round, dropping any that reach zero. Called once per round.
    pub fn decay(&mut self) {
        for group_entries in self.entries.values_mut() {
            group_entries.retain(|_, rounds| {
                *rounds = rounds.saturating_sub(1);
                *rounds > 0
            });
        }
        self.entries.retain(|_, m| !m.is_empty());
    }
}

/// Returns whether `npc` should consider `candidate` hostile, combining group allegiance, race
/// hatred, alignment spread above `alignment_threshold` (with the opposite-side rule: only
/// meaningful when the two characters' alignments sit on opposite sides of zero), and any
/// explicit attacked-player history.
pub fn is_hostile_to(
    npc: &NpcInstance,
    candidate_user: UserId,
    candidate: &Character,
    ledger: &HostilityLedger,
    alignment_threshold: i32,
) -> bool {
    if npc.attacked_players.contains(&candidate_user) {
        return true;
    }
    if let Some(group) = &npc.group {
        if ledger.is_hot(group, candidate_user) {
            return true;
        }
    }
    let spread = (npc.character.stats.alignment - candidate.stats.alignment).abs();
    let opposite_sides = npc.character.stats.alignment.signum() != candidate.stats.alignment.signum();
    if spread > alignment_threshold && opposite_sides {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use mud_common::RoomId;

    fn npc_with_alignment(alignment: i32) -> NpcInstance {
        let mut npc = NpcInstance::new(mud_common::InstanceId(1), mud_common::MobId(1), Character::new("Orc", RoomId(1)), RoomId(1));
        npc.character.stats.alignment = alignment;
        npc
    }

    #[test]
    fn opposite_alignment_beyond_threshold_is_hostile() {
        let npc = npc_with_alignment(-900);
        let mut candidate = Character::new("Hero", RoomId(1));
        candidate.stats.alignment = 900;
        let ledger = HostilityLedger::new();
        assert!(is_hostile_to(&npc, UserId(1), &candidate, &ledger, 500));
    }

    #[test]
    fn same_side_large_spread_is_not_hostile() {
        let npc = npc_with_alignment(900);
        let mut candidate = Character::new("Hero", RoomId(1));
        candidate.stats.alignment = 100;
        let ledger = HostilityLedger::new();
        assert!(!is_hostile_to(&npc, UserId(1), &candidate, &ledger, 500));
    }

    #[test]
    fn attacked_players_history_always_hostile() {
        let mut npc = npc_with_alignment(0);
        npc.attacked_players.push(UserId(7));
        let candidate = Character::new("Hero", RoomId(1));
        let ledger = HostilityLedger::new();
        assert!(is_hostile_to(&npc, UserId(7), &candidate, &ledger, 500));
    }

    #[test]
    fn ledger_decays_to_zero_and_then_expires() {
        let mut ledger = HostilityLedger::new();
        ledger.record_attack("bandits", UserId(1), 1);
        assert!(ledger.is_hot("bandits", UserId(1)));
        ledger.decay();
        assert!(!ledger.is_hot("bandits", UserId(1)));
    }
}
