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

//! Bridges the engine's connection-agnostic [`Broadcaster`] onto the real [`ConnectionManager`].
//! This is the only file in the binary that both crates' words for "a live client" meet in.

use std::sync::Arc;

use mud_common::UserId;
use mud_engine::Broadcaster;

use crate::connection::ConnectionManager;

pub struct EngineBroadcaster(pub Arc<ConnectionManager>);

impl Broadcaster for EngineBroadcaster {
    fn send_to_user(&self, user: UserId, text: &str) {
        self.0.send_to_user(user, text);
    }

    fn disconnect(&self, user: UserId) {
        self.0.disconnect_user(user);
    }

    fn is_connected(&self, user: UserId) -> bool {
        self.0.is_logged_in(user)
    }

    fn broadcast(&self, text: &str) {
        self.0.broadcast(text);
    }
}
