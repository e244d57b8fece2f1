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

//! Maps usernames to user ids via the persistent index, authenticates, and tracks the
//! active-user set's idle/AFK state. The index is rebuilt on startup if missing or
//! version-mismatched; this module is the only thing that touches `index_file` directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use mud_common::{config::SessionConfig, UserId};
use rand::rngs::OsRng;
use regex::Regex;
use thiserror::Error;

use crate::session::index_file::{self, IndexRecord};
use crate::session::user::{Role, User};
use crate::world::character::Character;
use mud_common::RoomId;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no such user")]
    NoSuchUser,
    #[error("wrong password")]
    WrongPassword,
    #[error("username '{0}' is banned")]
    Banned(String),
    #[error("username '{0}' does not match the required pattern")]
    InvalidUsername(String),
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),
    #[error("index file error: {0}")]
    Index(#[from] index_file::IndexFileError),
    #[error("password hashing error: {0}")]
    Hash(String),
}

pub struct UserRegistry {
    index_path: PathBuf,
    records: Vec<IndexRecord>,
    users: HashMap<UserId, User>,
    next_id: i64,
    username_pattern: Regex,
    ban_patterns: Vec<String>,
    afk_seconds: u64,
    max_idle_seconds: u64,
    exempt_admins_from_idle: bool,
}

impl UserRegistry {
    /// Loads the index at `index_path`, rebuilding an empty one if it's missing or
    /// version/record-size mismatched.
    pub fn open(index_path: impl AsRef<Path>, config: &SessionConfig) -> Result<Self, AuthError> {
        let index_path = index_path.as_ref().to_path_buf();
        let records = match index_file::read_all(&index_path) {
            Ok(records) => records,
            Err(_) => {
                index_file::rebuild_exclusive(&index_path, &[])?;
                Vec::new()
            }
        };
        let username_pattern = Regex::new(&config.username_pattern)
            .map_err(|e| AuthError::Hash(format!("bad username pattern: {e}")))?;
        Ok(Self {
            index_path,
            records,
            users: HashMap::new(),
            next_id: 1,
            username_pattern,
            ban_patterns: config.banned_username_patterns.clone(),
            afk_seconds: config.afk_seconds,
            max_idle_seconds: config.max_idle_seconds,
            exempt_admins_from_idle: config.exempt_admins_from_idle,
        })
    }

    pub fn is_banned(&self, username: &str) -> bool {
        self.ban_patterns.iter().any(|p| matches_ban_pattern(p, username))
    }

    /// Creates a new account, hashing the password and persisting the updated index under an
    /// exclusive rebuild.
    pub fn create_account(&mut self, username: &str, password: &str) -> Result<UserId, AuthError> {
        if !self.username_pattern.is_match(username) {
            return Err(AuthError::InvalidUsername(username.to_string()));
        }
        if self.is_banned(username) {
            return Err(AuthError::Banned(username.to_string()));
        }
        if index_file::lookup(&self.records, username).is_some() {
            return Err(AuthError::UsernameTaken(username.to_string()));
        }

        let hash = hash_password(password)?;
        let id = UserId(self.next_id as u64);
        self.next_id += 1;

        let character = Character::new(username, RoomId(1));
        let user = User::new(id, username, hash, character);
        self.users.insert(id, user);
        self.records.push(IndexRecord { user_id: id.0 as i64, username: username.to_string() });
        index_file::rebuild_exclusive(&self.index_path, &self.records)?;
        Ok(id)
    }

    /// Authenticates by username/password. Accepts either a legacy plaintext match or an argon2
    /// hash match: new accounts always hash, but pre-existing plaintext records (from an older
    /// deployment) still work.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<UserId, AuthError> {
        let id = index_file::lookup(&self.records, username).ok_or(AuthError::NoSuchUser)?;
        let id = UserId(id as u64);
        let user = self.users.get(&id).ok_or(AuthError::NoSuchUser)?;

        if user.password_hash == password {
            return Ok(id); // legacy plaintext record
        }
        if verify_password(password, &user.password_hash) {
            return Ok(id);
        }
        Err(AuthError::WrongPassword)
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn user_mut(&mut self, id: UserId) -> Option<&mut User> {
        self.users.get_mut(&id)
    }

    pub fn record_input(&mut self, id: UserId, at: SystemTime) {
        if let Some(user) = self.users.get_mut(&id) {
            user.last_input_time = at;
        }
    }

    pub fn is_afk(&self, id: UserId, now: SystemTime) -> bool {
        self.idle_for(id, now).map(|d| d.as_secs() >= self.afk_seconds).unwrap_or(false)
    }

    pub fn should_force_disconnect(&self, id: UserId, now: SystemTime) -> bool {
        let Some(user) = self.users.get(&id) else { return false };
        if self.exempt_admins_from_idle && user.role == Role::Admin {
            return false;
        }
        self.idle_for(id, now).map(|d| d.as_secs() >= self.max_idle_seconds).unwrap_or(false)
    }

    fn idle_for(&self, id: UserId, now: SystemTime) -> Option<Duration> {
        let user = self.users.get(&id)?;
        now.duration_since(user.last_input_time).ok()
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else { return false };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Matches `prefix*`, `*suffix`, `*contains*`, or an exact (case-insensitive) match.
fn matches_ban_pattern(pattern: &str, username: &str) -> bool {
    let pattern_lower = pattern.to_lowercase();
    let username_lower = username.to_lowercase();
    if let Some(inner) = pattern_lower.strip_prefix('*').and_then(|s| s.strip_suffix('*')) {
        username_lower.contains(inner)
    } else if let Some(prefix) = pattern_lower.strip_suffix('*') {
        username_lower.starts_with(prefix)
    } else if let Some(suffix) = pattern_lower.strip_prefix('*') {
        username_lower.ends_with(suffix)
    } else {
        username_lower == pattern_lower
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn registry() -> (tempfile::TempDir, UserRegistry) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.idx");
        let config = SessionConfig::default();
        let reg = UserRegistry::open(&path, &config).unwrap();
        (dir, reg)
    }

    #[test]
    fn create_then_authenticate_round_trips() {
        let (_dir, mut reg) = registry();
        let id = reg.create_account("tester", "secretpw").unwrap();
        let authed = reg.authenticate("tester", "secretpw").unwrap();
        assert_eq!(id, authed);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let (_dir, mut reg) = registry();
        reg.create_account("tester", "secretpw").unwrap();
        assert!(matches!(reg.authenticate("tester", "wrong"), Err(AuthError::WrongPassword)));
    }

    #[test]
    fn legacy_plaintext_record_still_authenticates() {
        let (_dir, mut reg) = registry();
        let id = reg.create_account("legacy", "whatever").unwrap();
        // Simulate a record migrated from a pre-hash deployment.
        reg.user_mut(id).unwrap().password_hash = "plaintext-secret".to_string();
        assert_eq!(reg.authenticate("legacy", "plaintext-secret").unwrap(), id);
    }

    #[test]
    fn banned_prefix_pattern_rejects_account_creation() {
        let (_dir, mut reg) = registry();
        assert!(matches!(reg.create_account("admin_fake", "x"), Err(AuthError::Banned(_))));
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let (_dir, mut reg) = registry();
        reg.create_account("dup", "pw1").unwrap();
        assert!(matches!(reg.create_account("dup", "pw2"), Err(AuthError::UsernameTaken(_))));
    }

    #[test]
    fn ban_pattern_matching_covers_all_forms() {
        assert!(matches_ban_pattern("admin*", "admin99"));
        assert!(matches_ban_pattern("*bot", "spambot"));
        assert!(matches_ban_pattern("*slur*", "xxslurxx"));
        assert!(matches_ban_pattern("exactname", "exactname"));
        assert!(!matches_ban_pattern("exactname", "notit"));
    }
}
