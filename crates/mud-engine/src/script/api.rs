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

//! The bounded surface a room/mob script is allowed to touch: scripts never get a
//! reference to `World`, only a handful of narrow verbs that queue `ScriptAction`s for the
//! scheduler to apply after the script returns. This keeps a misbehaving or malicious script from
//! reaching anything outside its own room.

use std::sync::{Arc, Mutex};

use mlua::{Lua, Table};
use mud_common::{RoomId, UserId};

#[derive(Clone, Debug)]
pub enum ScriptAction {
    SpawnMob { mob_name: String, room: RoomId },
    GiveItem { user: UserId, item: String },
    SendText { user: UserId, text: String },
    AddBuff { user: UserId, name: String, rounds: u32 },
    AddTempExit { room: RoomId, direction: String, target: RoomId, rounds: u32 },
    SetMutator { room: RoomId, name: String, rounds: Option<u32> },
}

/// Per-invocation scratch the Lua globals write into. One of these is created fresh for every
/// script run so actions from one invocation never leak into the next.
#[derive(Default)]
pub struct ScriptApiContext {
    pub self_room: Option<RoomId>,
    pub actions: Vec<ScriptAction>,
}

pub type SharedContext = Arc<Mutex<ScriptApiContext>>;

/// Installs the `engine.*` table of host functions into `lua`'s globals. Every function just
/// pushes a `ScriptAction`; none of them touch the world directly.
pub fn install(lua: &Lua, context: SharedContext) -> mlua::Result<()> {
    let engine: Table = lua.create_table()?;

    {
        let context = context.clone();
        let f = lua.create_function(move |_, (mob_name, room): (String, u64)| {
            context.lock().unwrap().actions.push(ScriptAction::SpawnMob { mob_name, room: RoomId(room) });
            Ok(())
        })?;
        engine.set("spawn_mob", f)?;
    }
    {
        let context = context.clone();
        let f = lua.create_function(move |_, (user, item): (u64, String)| {
            context.lock().unwrap().actions.push(ScriptAction::GiveItem { user: UserId(user), item });
            Ok(())
        })?;
        engine.set("give_item", f)?;
    }
    {
        let context = context.clone();
        let f = lua.create_function(move |_, (user, text): (u64, String)| {
            context.lock().unwrap().actions.push(ScriptAction::SendText { user: UserId(user), text });
            Ok(())
        })?;
        engine.set("send_text", f)?;
    }
    {
        let context = context.clone();
        let f = lua.create_function(move |_, (user, name, rounds): (u64, String, u32)| {
            context.lock().unwrap().actions.push(ScriptAction::AddBuff { user: UserId(user), name, rounds });
            Ok(())
        })?;
        engine.set("add_buff", f)?;
    }
    {
        let context = context.clone();
        let f = lua.create_function(move |_, (room, direction, target, rounds): (u64, String, u64, u32)| {
            context.lock().unwrap().actions.push(ScriptAction::AddTempExit {
                room: RoomId(room),
                direction,
                target: RoomId(target),
                rounds,
            });
            Ok(())
        })?;
        engine.set("add_temp_exit", f)?;
    }
    {
        let context = context.clone();
        let f = lua.create_function(move |_, (room, name, rounds): (u64, String, Option<u32>)| {
            context.lock().unwrap().actions.push(ScriptAction::SetMutator { room: RoomId(room), name, rounds });
            Ok(())
        })?;
        engine.set("set_mutator", f)?;
    }
    {
        let context = context.clone();
        let f = lua.create_function(move |_, ()| Ok(context.lock().unwrap().self_room.map(|r| r.0)))?;
        engine.set("self_room", f)?;
    }

    lua.globals().set("engine", engine)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installed_functions_queue_actions() {
        let lua = Lua::new();
        let context: SharedContext = Arc::new(Mutex::new(ScriptApiContext::default()));
        install(&lua, context.clone()).unwrap();
        lua.load(r#"engine.send_text(7, "hello")"#).exec().unwrap();
        let ctx = context.lock().unwrap();
        assert_eq!(ctx.actions.len(), 1);
        assert!(matches!(&ctx.actions[0], ScriptAction::SendText { user, text } if user.0 == 7 && text == "hello"));
    }

    #[test]
    fn self_room_reflects_context() {
        let lua = Lua::new();
        let context: SharedContext = Arc::new(Mutex::new(ScriptApiContext { self_room: Some(RoomId(3)), actions: Vec::new() }));
        install(&lua, context).unwrap();
        let room: Option<u64> = lua.load("return engine.self_room()").eval().unwrap();
        assert_eq!(room, Some(3));
    }
}
