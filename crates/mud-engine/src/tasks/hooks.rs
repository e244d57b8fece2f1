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

//! The two points at which a room's script runs: on entry, and once per command dispatched
//! while an actor stands in the room. Both funnel through [`run_room_hook`].

use mud_common::RoomId;
use tracing::warn;

use crate::script::{apply_actions, ScriptApiContext};
use crate::tasks::dispatch::CommandContext;

/// Runs `room`'s script, if it has one, applying whatever actions it queues. A no-op if
/// scripting isn't wired up, the room has no script, or `ctx.flags.skip_scripts` is set --
/// the flag is read here rather than by the caller so every trigger honors it uniformly.
pub fn run_room_hook(ctx: &mut CommandContext, room: RoomId, trigger: &'static str) {
    if ctx.flags.skip_scripts {
        return;
    }
    let Some(runtime) = ctx.scripts else { return };
    let Some(relative) = ctx.world.get_room(room).and_then(|r| r.script.clone()) else { return };
    let path = runtime.resolve(&relative);
    let context = ScriptApiContext { self_room: Some(room), actions: Vec::new() };
    match runtime.host.run_hook(&path, context) {
        Ok(actions) => apply_actions(&actions, ctx.world, ctx.broadcaster),
        Err(error) => warn!(room = ?room, %trigger, %error, "room script hook failed"),
    }
}
