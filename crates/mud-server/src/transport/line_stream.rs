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

//! The telnet / raw line-oriented transport. We don't implement a full IAC state machine -- the
//! negotiation this server cares about is a fixed, one-shot set of options sent at accept time,
//! after which the stream is a plain newline-delimited byte pipe and `LinesCodec` does the rest.
//! The read and write halves are split so a connection's read loop and its write task can run
//! concurrently without fighting over a single mutable handle.

use eyre::Context;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

const IAC: u8 = 255;
const WILL: u8 = 251;
const WONT: u8 = 252;
const DO: u8 = 253;

const OPT_ECHO: u8 = 1;
const OPT_SUPPRESS_GA: u8 = 3;
const OPT_LINEMODE: u8 = 34;
const OPT_NAWS: u8 = 31;
const OPT_CHARSET: u8 = 42;
const OPT_MSSP: u8 = 70;

/// The option negotiation this server offers on every telnet accept:
/// "will suppress-go-ahead", "won't line-mode", "will echo", "do window-size-report",
/// "request-charset", "enable-sound-protocol", "suppress-go-ahead".
fn negotiation_bytes() -> Vec<u8> {
    vec![
        IAC, WILL, OPT_SUPPRESS_GA,
        IAC, WONT, OPT_LINEMODE,
        IAC, WILL, OPT_ECHO,
        IAC, DO, OPT_NAWS,
        IAC, DO, OPT_CHARSET,
        IAC, WILL, OPT_MSSP,
        IAC, WILL, OPT_SUPPRESS_GA,
    ]
}

pub struct LineWriter(SplitSink<Framed<TcpStream, LinesCodec>, String>);
pub struct LineReader(SplitStream<Framed<TcpStream, LinesCodec>>);

/// Writes the fixed negotiation sequence, then wraps the socket in a `LinesCodec` and splits it.
/// Telnet clients that don't understand an option silently ignore it, which is why this is
/// fire-and-forget rather than awaiting individual option replies.
pub async fn accept(mut socket: TcpStream) -> eyre::Result<(LineWriter, LineReader)> {
    use tokio::io::AsyncWriteExt;
    socket.write_all(&negotiation_bytes()).await.context("writing telnet option negotiation")?;
    socket.set_nodelay(true).ok();
    let framed = Framed::new(socket, LinesCodec::new_with_max_length(8192));
    let (sink, stream) = framed.split();
    Ok((LineWriter(sink), LineReader(stream)))
}

impl LineReader {
    pub async fn read_line(&mut self) -> Option<std::io::Result<String>> {
        self.0.next().await.map(|r| r.map_err(std::io::Error::other))
    }
}

impl LineWriter {
    /// `LinesCodec` appends its own `\n` terminator, so this only strips any stray `\r`/`\n` the
    /// caller embedded to avoid a doubled-up line ending.
    pub async fn write_line(&mut self, text: &str) -> std::io::Result<()> {
        let cleaned = text.trim_end_matches(['\r', '\n']);
        self.0.send(cleaned.to_string()).await.map_err(std::io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_matches_the_fixed_option_set() {
        let bytes = negotiation_bytes();
        assert_eq!(bytes.len(), 21);
        assert!(bytes.chunks(3).all(|c| c[0] == IAC));
    }
}
