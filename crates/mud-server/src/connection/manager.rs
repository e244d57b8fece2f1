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

//! The connection registry: the one place that knows the mapping between sockets and
//! users. The scheduler never touches this directly -- it only sees a [`mud_engine::Broadcaster`]
//! implemented in `session_bridge` on top of this registry.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use mud_common::{ConnectionId, UserId};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::connection::state::{ConnectionDetails, ConnectionState};

/// Registry of live connections, keyed both by socket and by the user attached to it. Built to be
/// shared across every accept loop and the write side of the session bridge via `Arc`.
pub struct ConnectionManager {
    connections: DashMap<ConnectionId, ConnectionDetails>,
    by_user: DashMap<UserId, ConnectionId>,
    next_id: AtomicU64,
    history_capacity: usize,
    connect_count: AtomicUsize,
    max_connections: usize,
}

impl ConnectionManager {
    pub fn new(history_capacity: usize, max_connections: usize) -> Arc<Self> {
        Arc::new(Self {
            connections: DashMap::new(),
            by_user: DashMap::new(),
            next_id: AtomicU64::new(1),
            history_capacity,
            connect_count: AtomicUsize::new(0),
            max_connections,
        })
    }

    pub fn connected(&self) -> usize {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Registers a freshly accepted socket and returns its new id, unconditionally. The
    /// connection starts in [`ConnectionState::Login`]. Use [`Self::accept_public`] on a
    /// capacity-limited port; this is for the loopback admin port, which ignores the cap.
    pub fn accept(&self, remote_addr: String, outbox: UnboundedSender<String>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let details = ConnectionDetails::new(id, remote_addr, self.history_capacity, outbox);
        self.connections.insert(id, details);
        self.connect_count.fetch_add(1, Ordering::Relaxed);
        debug!(connection = id.0, "accepted connection");
        id
    }

    /// Registers a freshly accepted socket on a public, capacity-limited port. Returns `None`
    /// without registering anything once `max_connections` live connections are already held --
    /// the caller is expected to write a rejection and close the socket.
    pub fn accept_public(&self, remote_addr: String, outbox: UnboundedSender<String>) -> Option<ConnectionId> {
        if self.connect_count.load(Ordering::Relaxed) >= self.max_connections {
            return None;
        }
        Some(self.accept(remote_addr, outbox))
    }

    /// Sends `text` down every registered connection's write task, logged in or not. A
    /// connection whose outbox has already closed is removed once the sweep finishes rather
    /// than while iterating, since a removal during a `DashMap` iteration can deadlock against
    /// the shard lock the iterator holds.
    pub fn broadcast(&self, text: &str) {
        let mut dead = Vec::new();
        for entry in self.connections.iter() {
            if entry.outbox.send(text.to_string()).is_err() {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.remove(id);
        }
    }

    /// Attaches `user` to `connection`, evicting any prior connection that same user held --
    /// reconnect replaces a zombie rather than stacking sessions.
    pub fn set_logged_in(&self, connection: ConnectionId, user: UserId) -> Option<ConnectionId> {
        let previous = self.by_user.insert(user, connection);
        if let Some(mut entry) = self.connections.get_mut(&connection) {
            entry.state = ConnectionState::LoggedIn;
            entry.user = Some(user);
        }
        if let Some(prev_conn) = previous {
            if prev_conn != connection {
                info!(user = user.0, old = prev_conn.0, new = connection.0, "reconnect replaced prior session");
                self.disconnect(prev_conn);
            }
        }
        previous
    }

    pub fn set_zombie(&self, connection: ConnectionId) {
        if let Some(mut entry) = self.connections.get_mut(&connection) {
            entry.state = ConnectionState::Zombie;
        }
    }

    pub fn remove(&self, connection: ConnectionId) {
        if let Some((_, details)) = self.connections.remove(&connection) {
            if let Some(user) = details.user {
                // Only clear the index if it still points at this connection -- a reconnect may
                // already have overwritten it with a newer one.
                self.by_user.remove_if(&user, |_, v| *v == connection);
            }
            self.connect_count.fetch_sub(1, Ordering::Relaxed);
            debug!(connection = connection.0, "removed connection");
        }
    }

    pub fn resolve_user(&self, user: UserId) -> Option<ConnectionId> {
        self.by_user.get(&user).map(|e| *e)
    }

    pub fn is_logged_in(&self, user: UserId) -> bool {
        self.resolve_user(user)
            .and_then(|id| self.connections.get(&id).map(|c| c.state == ConnectionState::LoggedIn))
            .unwrap_or(false)
    }

    /// Sends `text` down the given connection's write task. Silently drops the line if the
    /// connection no longer exists or its write half has gone away.
    pub fn send_line(&self, connection: ConnectionId, text: &str) {
        if let Some(entry) = self.connections.get(&connection) {
            let _ = entry.outbox.send(text.to_string());
        }
    }

    pub fn send_to_user(&self, user: UserId, text: &str) {
        if let Some(connection) = self.resolve_user(user) {
            self.send_line(connection, text);
        }
    }

    /// Marks a user's connection as disconnected -- the write task notices the closed channel and
    /// tears down the socket on its own.
    pub fn disconnect_user(&self, user: UserId) {
        if let Some(connection) = self.resolve_user(user) {
            self.disconnect(connection);
        }
    }

    pub fn disconnect(&self, connection: ConnectionId) {
        self.remove(connection);
    }

    pub fn record_input(&self, connection: ConnectionId, line: String) {
        if let Some(mut entry) = self.connections.get_mut(&connection) {
            entry.touch();
            entry.history.push(line);
        }
    }

    pub fn with_details<R>(&self, connection: ConnectionId, f: impl FnOnce(&ConnectionDetails) -> R) -> Option<R> {
        self.connections.get(&connection).map(|e| f(&e))
    }

    pub fn with_details_mut<R>(&self, connection: ConnectionId, f: impl FnOnce(&mut ConnectionDetails) -> R) -> Option<R> {
        self.connections.get_mut(&connection).map(|mut e| f(&mut e))
    }

    /// Connections that have been quiet past `zombie_seconds`, to be swept into
    /// [`ConnectionState::Zombie`] by the periodic maintenance task.
    pub fn idle_past(&self, zombie_seconds: u64) -> Vec<ConnectionId> {
        let limit = std::time::Duration::from_secs(zombie_seconds);
        self.connections
            .iter()
            .filter(|e| e.state == ConnectionState::LoggedIn && e.last_input_at.elapsed() > limit)
            .map(|e| *e.key())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> (UnboundedSender<String>, tokio::sync::mpsc::UnboundedReceiver<String>) {
        tokio::sync::mpsc::unbounded_channel()
    }

    #[test]
    fn reconnect_evicts_the_prior_connection_for_the_same_user() {
        let manager = ConnectionManager::new(10, 100);
        let (tx1, _rx1) = sink();
        let (tx2, _rx2) = sink();
        let first = manager.accept("127.0.0.1:1".into(), tx1);
        let second = manager.accept("127.0.0.1:2".into(), tx2);

        manager.set_logged_in(first, UserId(1));
        assert_eq!(manager.connected(), 2);
        manager.set_logged_in(second, UserId(1));

        assert_eq!(manager.resolve_user(UserId(1)), Some(second));
        assert_eq!(manager.connected(), 1);
    }

    #[test]
    fn removing_a_connection_only_clears_the_index_if_it_still_points_there() {
        let manager = ConnectionManager::new(10, 100);
        let (tx1, _rx1) = sink();
        let (tx2, _rx2) = sink();
        let first = manager.accept("a".into(), tx1);
        let second = manager.accept("b".into(), tx2);
        manager.set_logged_in(first, UserId(1));
        manager.set_logged_in(second, UserId(1)); // evicts `first`'s registry entry already

        // Removing the now-stale `first` id a second time must not clobber `second`'s mapping.
        manager.remove(first);
        assert_eq!(manager.resolve_user(UserId(1)), Some(second));
    }
}
