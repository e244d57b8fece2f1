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

//! Tab-completion: Tab asks a completer for the first keyword or exit name matching the partial
//! word being typed. Suggestions are visual-only until accepted with space.

/// Produces the next completion candidate for a partial word, given the verbs and exit/keyword
/// vocabulary currently in scope (room-specific callers filter `vocabulary` before calling).
pub trait Completer: Send + Sync {
    fn suggest(&self, partial: &str, vocabulary: &[String]) -> Option<String>;
}

/// Case-insensitive longest-common-prefix match against a static or room-scoped word list,
/// returning the first alphabetically-sorted match so repeated Tab presses on the same partial
/// are deterministic.
pub struct KeywordCompleter;

impl Completer for KeywordCompleter {
    fn suggest(&self, partial: &str, vocabulary: &[String]) -> Option<String> {
        if partial.is_empty() {
            return None;
        }
        let lower = partial.to_lowercase();
        let mut candidates: Vec<&str> =
            vocabulary.iter().filter(|w| w.to_lowercase().starts_with(&lower)).map(String::as_str).collect();
        candidates.sort_unstable();
        candidates.first().map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_the_first_matching_keyword_alphabetically() {
        let completer = KeywordCompleter;
        let words = vec!["north".to_string(), "northeast".to_string(), "south".to_string()];
        assert_eq!(completer.suggest("nor", &words), Some("north".to_string()));
    }

    #[test]
    fn empty_partial_suggests_nothing() {
        let completer = KeywordCompleter;
        let words = vec!["north".to_string()];
        assert_eq!(completer.suggest("", &words), None);
    }

    #[test]
    fn no_match_returns_none() {
        let completer = KeywordCompleter;
        let words = vec!["north".to_string()];
        assert_eq!(completer.suggest("xyz", &words), None);
    }
}
