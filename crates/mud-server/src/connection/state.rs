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

//! Per-connection bookkeeping: lifecycle state, negotiated client settings, and the bounded
//! scrollback history used by the input pipeline's history handler.

use std::collections::VecDeque;
use std::time::Instant;

use mud_common::{ConnectionId, UserId};
use tokio::sync::mpsc::UnboundedSender;

/// Where a connection sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, negotiating or showing the login prompt. Not yet associated with a `UserId`.
    Login,
    /// Authenticated and attached to a live character in the world.
    LoggedIn,
    /// Heartbeat timed out (no pong within `pong_wait`) or the socket went quiet past
    /// `zombie_seconds`. Kept around so a reconnect can reclaim the session instead of losing it.
    Zombie,
}

/// Negotiated or defaulted terminal characteristics, refreshed by `NAWS`/charset negotiation on
/// telnet and by an initial control frame on WebSocket.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub screen_width: u16,
    pub screen_height: u16,
    pub supports_charset: bool,
    pub echo_enabled: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self { screen_width: 80, screen_height: 24, supports_charset: false, echo_enabled: true }
    }
}

/// A fixed-capacity ring of previously submitted lines, walked by the history handler when the
/// client sends an up/down-arrow escape sequence.
#[derive(Debug, Clone)]
pub struct History {
    lines: VecDeque<String>,
    capacity: usize,
    /// Cursor into `lines` while replaying; `None` means "not currently browsing history".
    cursor: Option<usize>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self { lines: VecDeque::with_capacity(capacity), capacity, cursor: None }
    }

    pub fn push(&mut self, line: String) {
        if line.trim().is_empty() {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        self.cursor = None;
    }

    /// Moves the cursor one step older and returns that line, or `None` at the oldest entry.
    pub fn older(&mut self) -> Option<&str> {
        if self.lines.is_empty() {
            return None;
        }
        let next = match self.cursor {
            None => self.lines.len() - 1,
            Some(0) => 0,
            Some(n) => n - 1,
        };
        self.cursor = Some(next);
        self.lines.get(next).map(String::as_str)
    }

    /// Moves the cursor one step newer; returns `None` (and clears browsing) once past the end.
    pub fn newer(&mut self) -> Option<&str> {
        let cursor = self.cursor?;
        if cursor + 1 >= self.lines.len() {
            self.cursor = None;
            return None;
        }
        self.cursor = Some(cursor + 1);
        self.lines.get(cursor + 1).map(String::as_str)
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }
}

/// Everything the connection manager tracks about one socket.
pub struct ConnectionDetails {
    pub id: ConnectionId,
    pub remote_addr: String,
    pub state: ConnectionState,
    pub user: Option<UserId>,
    pub history: History,
    pub settings: ClientSettings,
    pub connected_at: Instant,
    pub last_input_at: Instant,
    pub auth_failures: u32,
    /// Outbound line sink back to this connection's write task.
    pub outbox: UnboundedSender<String>,
}

impl ConnectionDetails {
    pub fn new(id: ConnectionId, remote_addr: String, history_capacity: usize, outbox: UnboundedSender<String>) -> Self {
        let now = Instant::now();
        Self {
            id,
            remote_addr,
            state: ConnectionState::Login,
            user: None,
            history: History::new(history_capacity),
            settings: ClientSettings::default(),
            connected_at: now,
            last_input_at: now,
            auth_failures: 0,
            outbox,
        }
    }

    pub fn touch(&mut self) {
        self.last_input_at = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_replay_walks_oldest_to_newest_then_stops() {
        let mut h = History::new(3);
        h.push("look".into());
        h.push("say hi".into());
        h.push("inventory".into());
        assert_eq!(h.older(), Some("inventory"));
        assert_eq!(h.older(), Some("say hi"));
        assert_eq!(h.older(), Some("look"));
        // Already at oldest: stays put rather than wrapping.
        assert_eq!(h.older(), Some("look"));
        assert_eq!(h.newer(), Some("say hi"));
        assert_eq!(h.newer(), Some("inventory"));
        assert_eq!(h.newer(), None);
    }

    #[test]
    fn history_drops_oldest_past_capacity() {
        let mut h = History::new(2);
        h.push("a".into());
        h.push("b".into());
        h.push("c".into());
        assert_eq!(h.older(), Some("c"));
        assert_eq!(h.older(), Some("b"));
        assert_eq!(h.older(), Some("b"));
    }

    #[test]
    fn blank_lines_are_not_recorded() {
        let mut h = History::new(2);
        h.push("   ".into());
        assert_eq!(h.older(), None);
    }
}
