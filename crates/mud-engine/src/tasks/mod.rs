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

pub mod dispatch;
pub mod handlers;
pub mod hooks;

pub use dispatch::{
    dispatch as dispatch_command, normalize, CommandContext, CommandOutcome, CommandTable, CommandTableBuilder,
    EmoteAliasTable, KeywordAliasTable,
};

/// Builds the standard command table with the built-in verbs registered. Content packs and
/// plugins extend this at startup before the scheduler freezes it.
pub fn builtin_table() -> CommandTable {
    CommandTableBuilder::new()
        .register("look", handlers::look)
        .register("say", handlers::say)
        .register("emote", handlers::emote)
        .register("inventory", handlers::inventory)
        .register("go", handlers::go_verb)
        .register("attack", handlers::attack)
        .register("quit", handlers::quit)
        .build()
}
