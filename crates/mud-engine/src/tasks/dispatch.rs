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

//! Verb resolution and the command dispatch table. The table is a
//! `map<string, fn(...)>` built mutable at startup for plugin registration, then frozen: once
//! `CommandTableBuilder::build` returns a `CommandTable`, nothing can add or remove an entry.

use std::collections::HashMap;

use mud_common::RoomId;

use crate::broadcaster::Broadcaster;
use crate::event::{Actor, DispatchFlags, Event};
use crate::script::ScriptRuntime;
use crate::world::World;

pub struct CommandOutcome {
    pub handled: bool,
    pub error: Option<String>,
}

impl CommandOutcome {
    pub fn handled() -> Self {
        Self { handled: true, error: None }
    }

    pub fn unhandled() -> Self {
        Self { handled: false, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { handled: true, error: Some(error.into()) }
    }
}

/// Everything a handler needs: the `handler(rest, actor, room, flags)` signature plus the world
/// access every real handler needs to do anything. `emit` collects further
/// events the handler wants the scheduler to queue once it returns.
pub struct CommandContext<'a> {
    pub actor: Actor,
    pub room: RoomId,
    pub rest: &'a str,
    pub world: &'a mut World,
    pub flags: &'a mut DispatchFlags,
    pub broadcaster: &'a dyn Broadcaster,
    pub emit: Vec<Event>,
    /// The room script sandbox, if scripting is wired up for this dispatch. `None` only in
    /// tests that exercise handlers without a script host.
    pub scripts: Option<&'a ScriptRuntime>,
}

pub type HandlerFn = fn(&mut CommandContext) -> CommandOutcome;

#[derive(Default)]
pub struct CommandTableBuilder {
    entries: HashMap<String, HandlerFn>,
}

impl CommandTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `verb`, overwriting any prior registration for the same name. Only meaningful
    /// before `build()`: a plugin that wants to add a verb does so at startup, not at runtime.
    pub fn register(mut self, verb: &str, handler: HandlerFn) -> Self {
        self.entries.insert(verb.to_string(), handler);
        self
    }

    pub fn build(self) -> CommandTable {
        CommandTable { entries: self.entries }
    }
}

/// Immutable once built. There is deliberately no `insert`/`remove` here: the table must remain
/// mutable at startup and immutable thereafter.
pub struct CommandTable {
    entries: HashMap<String, HandlerFn>,
}

impl CommandTable {
    pub fn get(&self, verb: &str) -> Option<HandlerFn> {
        self.entries.get(verb).copied()
    }
}

/// Global verb aliases, e.g. `"n"` -> `"go north"`. Resolved before emote aliasing.
#[derive(Default, Clone)]
pub struct KeywordAliasTable {
    entries: HashMap<String, String>,
}

impl KeywordAliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, alias: &str, canonical: &str) -> Self {
        self.entries.insert(alias.to_string(), canonical.to_string());
        self
    }

    fn resolve(&self, verb: &str) -> Option<&str> {
        self.entries.get(verb).map(String::as_str)
    }
}

/// Emote shorthand, e.g. `"smile"` -> `"smiles warmly."` which becomes `emote smiles warmly.`
#[derive(Default, Clone)]
pub struct EmoteAliasTable {
    entries: HashMap<String, String>,
}

impl EmoteAliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, verb: &str, expansion: &str) -> Self {
        self.entries.insert(verb.to_string(), expansion.to_string());
        self
    }

    fn resolve(&self, verb: &str) -> Option<&str> {
        self.entries.get(verb).map(String::as_str)
    }
}

/// Splits a submitted line into `(verb, rest)`, applying the LambdaMOO-style punctuation
/// shorthand (`"hi` -> `say hi`, `:waves` -> `emote waves`) before word-splitting.
fn split_verb(line: &str) -> (String, String) {
    let line = line.trim_start();
    let mut rewritten = line.to_string();
    match line.chars().next() {
        Some('"') => rewritten.replace_range(..1, "say "),
        Some(':') => rewritten.replace_range(..1, "emote "),
        _ => {}
    }
    let mut parts = rewritten.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or_default().to_string();
    let rest = parts.next().unwrap_or_default().trim_start().to_string();
    (verb, rest)
}

/// Normalizes a raw input line into `(verb, rest)`: lowercases the verb, resolves it through the
/// keyword alias table, then the emote alias table. A keyword alias may itself expand to
/// multiple words (`"n"` -> `"go north"`), in which case its trailing words are prepended to
/// `rest`.
pub fn normalize(line: &str, keywords: &KeywordAliasTable, emotes: &EmoteAliasTable) -> (String, String) {
    let (verb, rest) = split_verb(line);
    let verb = verb.to_lowercase();

    let (verb, rest) = match keywords.resolve(&verb) {
        Some(canonical) => {
            let mut parts = canonical.splitn(2, ' ');
            let canonical_verb = parts.next().unwrap_or_default().to_string();
            let canonical_rest = parts.next().unwrap_or_default();
            let merged = if rest.is_empty() {
                canonical_rest.to_string()
            } else if canonical_rest.is_empty() {
                rest
            } else {
                format!("{canonical_rest} {rest}")
            };
            (canonical_verb, merged)
        }
        None => (verb, rest),
    };

    match emotes.resolve(&verb) {
        Some(expansion) => ("emote".to_string(), expansion.to_string()),
        None => (verb, rest),
    }
}

/// Dispatches a normalized `(verb, rest)` against `table`. Unknown verbs fall through to
/// movement (treating the verb itself as an exit name), then to "unrecognized".
pub fn dispatch(table: &CommandTable, verb: &str, ctx: &mut CommandContext) -> CommandOutcome {
    if let Some(handler) = table.get(verb) {
        return handler(ctx);
    }

    if let Some(room) = ctx.world.get_room(ctx.room) {
        if room.exits.contains_key(verb) {
            return crate::tasks::handlers::go(ctx, verb);
        }
    }

    CommandOutcome::unhandled()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_prefix_rewrites_to_say() {
        let keywords = KeywordAliasTable::new();
        let emotes = EmoteAliasTable::new();
        let (verb, rest) = normalize("\"hello there", &keywords, &emotes);
        assert_eq!(verb, "say");
        assert_eq!(rest, "hello there");
    }

    #[test]
    fn colon_prefix_rewrites_to_emote() {
        let keywords = KeywordAliasTable::new();
        let emotes = EmoteAliasTable::new();
        let (verb, rest) = normalize(":waves happily", &keywords, &emotes);
        assert_eq!(verb, "emote");
        assert_eq!(rest, "waves happily");
    }

    #[test]
    fn keyword_alias_expands_to_canonical_verb_and_rest() {
        let keywords = KeywordAliasTable::new().with("n", "go north");
        let emotes = EmoteAliasTable::new();
        let (verb, rest) = normalize("n", &keywords, &emotes);
        assert_eq!(verb, "go");
        assert_eq!(rest, "north");
    }

    #[test]
    fn emote_alias_rewrites_verb_to_emote_with_expansion() {
        let keywords = KeywordAliasTable::new();
        let emotes = EmoteAliasTable::new().with("smile", "smiles warmly.");
        let (verb, rest) = normalize("smile", &keywords, &emotes);
        assert_eq!(verb, "emote");
        assert_eq!(rest, "smiles warmly.");
    }

    #[test]
    fn unregistered_verb_falls_through_to_unhandled_when_no_matching_exit() {
        let table = CommandTableBuilder::new().build();
        let mut world = crate::world::test_support::empty_world();
        let mut flags = DispatchFlags::default();
        let broadcaster = crate::broadcaster::NoopBroadcaster;
        let mut ctx = CommandContext {
            actor: Actor::User(mud_common::UserId(1)),
            room: RoomId(1),
            rest: "",
            world: &mut world,
            flags: &mut flags,
            broadcaster: &broadcaster,
            emit: Vec::new(),
            scripts: None,
        };
        let outcome = dispatch(&table, "frobnicate", &mut ctx);
        assert!(!outcome.handled);
    }
}
