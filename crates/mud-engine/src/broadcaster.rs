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

//! `Broadcaster` is the scheduler's only window onto connections. The engine never reaches
//! across into the connection manager directly: room text delivery is routed through the user
//! registry and out through this trait, so messaging never crosses the scheduler boundary
//! directly. The server binary supplies the real implementation, backed by the
//! connection registry; tests use [`MockBroadcaster`].

use std::sync::{Arc, Mutex};

use mud_common::UserId;

pub trait Broadcaster: Send + Sync {
    /// Deliver narrative text to one user's active connection, if any. Silently a no-op if the
    /// user has no non-Zombie connection (the event that produced this message is not replayed).
    fn send_to_user(&self, user: UserId, text: &str);

    /// Force-disconnect a user's connection, e.g. on kick or fatal auth failure.
    fn disconnect(&self, user: UserId);

    fn is_connected(&self, user: UserId) -> bool;

    /// Deliver `text` to every connection, logged in or not. Used for server-wide announcements
    /// (the shutdown countdown, a `Broadcast` event) rather than per-user narrative text.
    fn broadcast(&self, text: &str);
}

/// Discards everything. Used where a `Broadcaster` is required but output isn't observed, e.g.
/// background NPC-only test scenarios.
#[derive(Default)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn send_to_user(&self, _user: UserId, _text: &str) {}
    fn disconnect(&self, _user: UserId) {}
    fn is_connected(&self, _user: UserId) -> bool {
        false
    }
    fn broadcast(&self, _text: &str) {}
}

/// Collects everything sent, for assertions in engine-level tests that don't want to stand up
/// the real connection manager.
#[derive(Default)]
pub struct MockBroadcaster {
    inner: Mutex<MockInner>,
}

#[derive(Default)]
struct MockInner {
    sent: Vec<(UserId, String)>,
    connected: std::collections::HashSet<UserId>,
    disconnected: Vec<UserId>,
}

impl MockBroadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mark_connected(&self, user: UserId) {
        self.inner.lock().unwrap().connected.insert(user);
    }

    pub fn sent_to(&self, user: UserId) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn disconnected(&self) -> Vec<UserId> {
        self.inner.lock().unwrap().disconnected.clone()
    }
}

impl Broadcaster for MockBroadcaster {
    fn send_to_user(&self, user: UserId, text: &str) {
        self.inner.lock().unwrap().sent.push((user, text.to_string()));
    }

    fn disconnect(&self, user: UserId) {
        let mut inner = self.inner.lock().unwrap();
        inner.connected.remove(&user);
        inner.disconnected.push(user);
    }

    fn is_connected(&self, user: UserId) -> bool {
        self.inner.lock().unwrap().connected.contains(&user)
    }

    fn broadcast(&self, text: &str) {
        let mut inner = self.inner.lock().unwrap();
        let recipients: Vec<UserId> = inner.connected.iter().copied().collect();
        for user in recipients {
            inner.sent.push((user, text.to_string()));
        }
    }
}
