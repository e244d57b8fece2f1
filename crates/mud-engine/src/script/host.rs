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

//! Loads and runs room/mob Lua scripts under a wall-clock deadline. A fresh `Lua` VM is
//! built per invocation so one script's globals can never bleed into another's; only the source
//! text is cached, keyed by path, to avoid re-reading disk on every room tick.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mlua::{HookTriggers, Lua};
use mud_common::config::ScriptConfig;
use thiserror::Error;

use crate::script::api::{self, ScriptAction, ScriptApiContext, SharedContext};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("io error reading script {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("script error: {0}")]
    Lua(#[from] mlua::Error),
    #[error("script at {0} exceeded its {1}ms deadline")]
    Timeout(PathBuf, u64),
}

struct CachedSource {
    source: String,
}

pub struct ScriptHost {
    config: ScriptConfig,
    cache: Mutex<HashMap<PathBuf, CachedSource>>,
}

impl ScriptHost {
    pub fn new(config: ScriptConfig) -> Self {
        Self { config, cache: Mutex::new(HashMap::new()) }
    }

    /// Drops a cached script so the next run re-reads it from disk. Call this after an author
    /// edits a room's script file.
    pub fn invalidate(&self, path: &Path) {
        self.cache.lock().unwrap().remove(path);
    }

    /// Drops every cached script. Called on an admin `/reload`, since at that point any room's
    /// script may have changed and there's no cheaper way to know which.
    pub fn invalidate_all(&self) {
        self.cache.lock().unwrap().clear();
    }

    fn source_for(&self, path: &Path) -> Result<String, ScriptError> {
        if let Some(cached) = self.cache.lock().unwrap().get(path) {
            return Ok(cached.source.clone());
        }
        let source = std::fs::read_to_string(path).map_err(|e| ScriptError::Io(path.to_path_buf(), e))?;
        self.cache.lock().unwrap().insert(path.to_path_buf(), CachedSource { source: source.clone() });
        Ok(source)
    }

    /// Validates that `path` parses and loads cleanly, under `load_timeout_ms`. Run once at
    /// content-load time, not per tick.
    pub fn load_check(&self, path: &Path) -> Result<(), ScriptError> {
        let source = self.source_for(path)?;
        self.run_with_deadline(path, Duration::from_millis(self.config.load_timeout_ms), |lua| {
            lua.load(&source).set_name(path.to_string_lossy().as_ref()).exec()
        })
    }

    /// Runs a room/mob hook script with `context` installed as the `engine` table, under
    /// `room_timeout_ms`. Returns the actions the script queued.
    pub fn run_hook(&self, path: &Path, context: ScriptApiContext) -> Result<Vec<ScriptAction>, ScriptError> {
        let source = self.source_for(path)?;
        let shared: SharedContext = Arc::new(Mutex::new(context));
        let shared_for_run = shared.clone();
        self.run_with_deadline(path, Duration::from_millis(self.config.room_timeout_ms), move |lua| {
            api::install(lua, shared_for_run.clone())?;
            lua.load(&source).set_name(path.to_string_lossy().as_ref()).exec()
        })?;
        let ctx = Arc::try_unwrap(shared).map_err(|_| mlua::Error::RuntimeError("script context still borrowed".into()))?;
        Ok(ctx.into_inner().unwrap().actions)
    }

    fn run_with_deadline(
        &self,
        path: &Path,
        timeout: Duration,
        body: impl FnOnce(&Lua) -> mlua::Result<()>,
    ) -> Result<(), ScriptError> {
        let lua = Lua::new();
        let deadline = Instant::now() + timeout;
        // Sampling every `hook_instruction_interval` VM instructions bounds how late a tight
        // loop can be caught without checking the wall clock on every single instruction.
        let triggers = HookTriggers {
            every_nth_instruction: Some(self.config.hook_instruction_interval),
            ..HookTriggers::default()
        };
        lua.set_hook(triggers, move |_lua, _debug| {
            if Instant::now() >= deadline {
                Err(mlua::Error::RuntimeError("deadline exceeded".to_string()))
            } else {
                Ok(())
            }
        });

        match body(&lua) {
            Ok(()) => Ok(()),
            Err(mlua::Error::RuntimeError(msg)) if msg == "deadline exceeded" => {
                Err(ScriptError::Timeout(path.to_path_buf(), timeout.as_millis() as u64))
            }
            Err(other) => Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn script_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_check_accepts_valid_script() {
        let file = script_file("local x = 1 + 1");
        let host = ScriptHost::new(ScriptConfig::default());
        host.load_check(file.path()).unwrap();
    }

    #[test]
    fn load_check_rejects_syntax_errors() {
        let file = script_file("this is not lua (((");
        let host = ScriptHost::new(ScriptConfig::default());
        assert!(host.load_check(file.path()).is_err());
    }

    #[test]
    fn run_hook_collects_queued_actions() {
        let file = script_file(r#"engine.send_text(1, "hi there")"#);
        let host = ScriptHost::new(ScriptConfig::default());
        let actions = host.run_hook(file.path(), ScriptApiContext::default()).unwrap();
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn infinite_loop_is_killed_by_deadline() {
        let file = script_file("while true do end");
        let mut config = ScriptConfig::default();
        config.room_timeout_ms = 20;
        let host = ScriptHost::new(config);
        let err = host.run_hook(file.path(), ScriptApiContext::default()).unwrap_err();
        assert!(matches!(err, ScriptError::Timeout(_, _)));
    }

    #[test]
    fn invalidate_all_forces_reread_of_every_cached_script() {
        let mut file = script_file("local x = 1");
        let host = ScriptHost::new(ScriptConfig::default());
        host.load_check(file.path()).unwrap();
        file.as_file_mut().set_len(0).unwrap();
        file.write_all(b"this is not lua (((").unwrap();
        host.invalidate_all();
        assert!(host.load_check(file.path()).is_err());
    }

    #[test]
    fn invalidate_forces_reread_from_disk() {
        let mut file = script_file("local x = 1");
        let host = ScriptHost::new(ScriptConfig::default());
        host.load_check(file.path()).unwrap();
        file.as_file_mut().set_len(0).unwrap();
        file.write_all(b"this is not lua (((").unwrap();
        host.invalidate(file.path());
        assert!(host.load_check(file.path()).is_err());
    }
}
