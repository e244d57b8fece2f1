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

//! Identifiers, configuration and error types shared between the engine core
//! and the connection-facing server binary. Kept dependency-light so both
//! sides can use it without pulling in tokio or the script sandbox.

pub mod config;
pub mod error;
pub mod ids;

pub use config::Config;
pub use error::{CoreError, FatalError};
pub use ids::{ConnectionId, IdSequence, InstanceId, MobId, RoomId, Round, Turn, UserId};
