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

//! Configuration is loaded once at startup (by the server binary, via `figment`, from a
//! content-store-provided tree plus environment overrides) and then handed down through the
//! scheduler to every component that needs it, exactly as the rest of the core does not hold
//! any free-floating globals. A subset of keys may be changed at runtime; keys named in
//! [`Config::locked_keys`] require a restart.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub listen: ListenConfig,
    pub clock: ClockConfig,
    pub connection: ConnectionConfig,
    pub world: WorldConfig,
    pub npc: NpcConfig,
    pub script: ScriptConfig,
    pub session: SessionConfig,
    /// Config keys that may not be changed without a restart. Dotted paths, e.g.
    /// `"connection.max_connections"`.
    pub locked_keys: HashSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut locked_keys = HashSet::new();
        locked_keys.insert("listen.telnet_port".to_string());
        locked_keys.insert("listen.ws_port".to_string());
        locked_keys.insert("connection.max_connections".to_string());
        locked_keys.insert("connection.loopback_admin_port".to_string());
        locked_keys.insert("script.load_timeout_ms".to_string());
        Self {
            listen: ListenConfig::default(),
            clock: ClockConfig::default(),
            connection: ConnectionConfig::default(),
            world: WorldConfig::default(),
            npc: NpcConfig::default(),
            script: ScriptConfig::default(),
            session: SessionConfig::default(),
            locked_keys,
        }
    }
}

/// Listen addresses for the two transports. Binding is a startup-only concern, so both
/// ports are restart-required.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListenConfig {
    pub bind_addr: std::net::IpAddr,
    pub telnet_port: u16,
    pub ws_port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            telnet_port: 7777,
            ws_port: 7778,
        }
    }
}

impl Config {
    /// Returns an error describing why `key` cannot be mutated at runtime, or `Ok(())` if it's
    /// safe to apply.
    pub fn check_mutable(&self, key: &str) -> Result<(), String> {
        if self.locked_keys.contains(key) {
            Err(format!("config key '{key}' is locked; restart required"))
        } else {
            Ok(())
        }
    }

    pub fn turn_duration(&self) -> Duration {
        Duration::from_millis(self.clock.turn_ms)
    }
}

/// Scheduler turn/round clock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Period of a single turn tick, in milliseconds.
    pub turn_ms: u64,
    /// Number of turns per round.
    pub turns_per_round: u64,
    /// Maximum number of ready events the scheduler will drain in a single turn before
    /// requeuing the rest for the next tick.
    pub per_turn_work_budget: usize,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            turn_ms: 50,
            turns_per_round: 80,
            per_turn_work_budget: 512,
        }
    }
}

/// Connection manager and transport negotiation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub max_connections: usize,
    /// A loopback-only admin port that ignores `max_connections`.
    pub loopback_admin_port: Option<u16>,
    pub default_screen_width: u16,
    pub default_screen_height: u16,
    pub history_size: usize,
    /// Seconds a disconnected-but-attached session is preserved awaiting reconnect. Zero means
    /// immediate removal on transport failure.
    pub zombie_seconds: u64,
    /// Framed-transport heartbeat: interval between pings.
    pub ping_period: Duration,
    /// Framed-transport heartbeat: time allowed for a pong after a ping.
    pub pong_wait: Duration,
    /// Authentication failures tolerated per connection before it is closed.
    pub max_auth_failures: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_connections: 256,
            loopback_admin_port: Some(4242),
            default_screen_width: 80,
            default_screen_height: 24,
            history_size: 10,
            zombie_seconds: 60,
            ping_period: Duration::from_secs(20),
            pong_wait: Duration::from_secs(10),
            max_auth_failures: 5,
        }
    }
}

/// World/room lazy loading and eviction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Rounds a room must be empty and inactive before it becomes eviction-eligible.
    pub room_unload_rounds: u64,
    /// Eviction is skipped while fewer than this many rooms are loaded.
    pub room_unload_threshold: usize,
    pub content_path: std::path::PathBuf,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            room_unload_rounds: 200,
            room_unload_threshold: 64,
            content_path: std::path::PathBuf::from("content"),
        }
    }
}

/// Autonomous NPC loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NpcConfig {
    /// Rounds of no-player-present boredom before a non-persistent NPC despawns.
    pub max_mob_boredom: u32,
    /// Memory-pressure gate: NPCs in rooms beyond this loaded-room count are eligible for the
    /// boredom despawn path even at low boredom values. Persistent NPCs (e.g. shopkeepers)
    /// override both gates.
    pub mob_unload_threshold: usize,
    /// Delay, in turns, between successive queued NPC commands.
    pub command_delay_turns: u64,
    /// Self-damage percentage (of max health) applied per failed `home-impossible` pass.
    pub home_impossible_damage_pct: f32,
    /// Alignment delta above which two characters are considered hostile absent other signals.
    pub alignment_hostility_threshold: i32,
    /// Rounds a hostility-ledger entry persists before decaying to zero.
    pub hostility_decay_rounds: u32,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            max_mob_boredom: 50,
            mob_unload_threshold: 64,
            command_delay_turns: 4,
            home_impossible_damage_pct: 10.0,
            alignment_hostility_threshold: 500,
            hostility_decay_rounds: 1,
        }
    }
}

/// Embedded script sandbox deadlines.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptConfig {
    pub load_timeout_ms: u64,
    pub room_timeout_ms: u64,
    /// Lua instruction-count sampling interval for the deadline hook; smaller catches tight
    /// loops sooner at the cost of more hook invocations.
    pub hook_instruction_interval: u32,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: 500,
            room_timeout_ms: 50,
            hook_instruction_interval: 1000,
        }
    }
}

/// Session/user registry, auth and idle policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    pub afk_seconds: u64,
    pub max_idle_seconds: u64,
    pub exempt_admins_from_idle: bool,
    /// Regex new usernames must match.
    pub username_pattern: String,
    /// Ban patterns: exact, `prefix*`, `*suffix`, or `*contains*`.
    pub banned_username_patterns: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            afk_seconds: 300,
            max_idle_seconds: 3600,
            exempt_admins_from_idle: true,
            username_pattern: r"^[A-Za-z][A-Za-z0-9_]{2,15}$".to_string(),
            banned_username_patterns: vec!["admin*".to_string(), "*slur*".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_keys_reject_runtime_mutation() {
        let cfg = Config::default();
        assert!(cfg.check_mutable("connection.max_connections").is_err());
        assert!(cfg.check_mutable("npc.max_mob_boredom").is_ok());
    }
}
