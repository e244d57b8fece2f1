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

use std::path::PathBuf;

use clap::Parser;

/// Command-line surface: flags for config overrides, a version print, and a simple
/// port-availability probe.
#[derive(Parser, Debug)]
#[command(name = "mud-server", version, about = "A turn-based text-adventure engine server")]
pub struct Args {
    /// Path to the YAML config file. Defaults are used for anything it doesn't set.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the telnet listen port.
    #[arg(long)]
    pub telnet_port: Option<u16>,

    /// Override the WebSocket listen port.
    #[arg(long)]
    pub ws_port: Option<u16>,

    /// Probe whether `telnet_port` (or the configured one) is free, print the result, and exit
    /// without starting the server.
    #[arg(long)]
    pub probe_port: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_no_arguments() {
        let args = Args::parse_from(["mud-server"]);
        assert!(args.config.is_none());
        assert!(!args.probe_port);
    }

    #[test]
    fn parses_port_overrides() {
        let args = Args::parse_from(["mud-server", "--telnet-port", "4000", "--probe-port"]);
        assert_eq!(args.telnet_port, Some(4000));
        assert!(args.probe_port);
    }
}
