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

//! Config loading: a hierarchical tree loaded from a YAML file at startup, with environment
//! overrides permitted for the content path and logging level only.

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use mud_common::config::Config;

/// Builds the effective config: defaults, then the YAML file if one was given, then a narrow set
/// of environment overrides. Server-wide settings outside `content_path`/log level are
/// deliberately not environment-overridable.
pub fn load(path: Option<&Path>) -> Result<Config, figment::Error> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
    if let Some(path) = path {
        figment = figment.merge(Yaml::file(path));
    }
    figment = figment.merge(Env::prefixed("MUD_").only(&["world.content_path"]).split("__"));
    figment.extract()
}

pub fn log_filter() -> String {
    std::env::var("MUD_LOG").unwrap_or_else(|_| "info".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let config = load(None).unwrap();
        assert_eq!(config.clock.turn_ms, 50);
    }
}
