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

use thiserror::Error;

use crate::ids::{ConnectionId, RoomId, UserId};

/// Non-fatal error kinds the core can produce. None of these ever abort the process; see
/// [`FatalError`] for the handful that do.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    /// A malformed in-band control sequence on a connection. Bytes are dropped, the
    /// connection continues.
    #[error("protocol error on {0}: {1}")]
    Protocol(ConnectionId, String),

    /// Wrong credential or a banned username.
    #[error("authentication failed for connection {0}")]
    AuthenticationFailed(ConnectionId),

    /// Read/write error or missed heartbeat.
    #[error("transport failure on {0}: {1}")]
    TransportFailure(ConnectionId, String),

    /// A listener, command handler, or script raised an error mid-dispatch. The triggering
    /// event is still considered handled.
    #[error("handler error: {0}")]
    HandlerError(String),

    /// A script exceeded its per-call deadline.
    #[error("script timeout after {0}ms")]
    ScriptTimeout(u64),

    /// The target of an event (user, mob, room) no longer exists; the event is dropped.
    #[error("missing entity: {0}")]
    MissingEntity(String),

    /// A room/item/mob failed to load from the content store.
    #[error("content load error for room {0}: {1}")]
    ContentLoad(RoomId, String),

    #[error("no such user {0}")]
    NoSuchUser(UserId),
}

/// Startup/migration failures that are allowed to abort the process with a nonzero exit code.
/// Only pre-readiness errors may terminate the process this way.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("port bind failure on {0}: {1}")]
    PortBind(String, std::io::Error),

    #[error("username index corrupt after rebuild attempt: {0}")]
    CorruptUsernameIndex(String),

    #[error("content validation failed: {0}")]
    ContentValidation(String),

    #[error("migration failed: {0}")]
    Migration(String),
}

impl FatalError {
    /// The process exit code this failure should produce. `0` is reserved for normal shutdown;
    /// every fatal startup error is nonzero and distinguishes its category for operators.
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::Config(_) => 2,
            FatalError::PortBind(_, _) => 3,
            FatalError::CorruptUsernameIndex(_) => 4,
            FatalError::ContentValidation(_) => 5,
            FatalError::Migration(_) => 6,
        }
    }
}
