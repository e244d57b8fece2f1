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

//! The WebSocket transport. Each text frame is one line of input; the manager sends a ping
//! every `ping_period` and expects a pong within `pong_wait`, transitioning to Zombie on miss.
//! Only one task per framed connection writes control frames, so in async Rust this is a single
//! owned `SplitSink` that only the write task ever touches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub struct FramedWriter(SplitSink<WebSocketStream<TcpStream>, Message>);
pub struct FramedReader(SplitStream<WebSocketStream<TcpStream>>);

pub async fn accept(raw: TcpStream) -> eyre::Result<(FramedWriter, FramedReader)> {
    let socket = tokio_tungstenite::accept_async(raw).await?;
    let (sink, stream) = socket.split();
    Ok((FramedWriter(sink), FramedReader(stream)))
}

impl FramedReader {
    /// One text frame is one submitted line; anything else (binary, close) surfaces as `None`
    /// so the caller can decide whether that's an end-of-connection signal. Pong frames are
    /// swallowed here and reported through the return value so the caller can feed the
    /// heartbeat controller.
    pub async fn read_event(&mut self) -> Option<FramedEvent> {
        loop {
            match self.0.next().await? {
                Ok(Message::Text(text)) => return Some(FramedEvent::Line(text.to_string())),
                Ok(Message::Pong(_)) => return Some(FramedEvent::Pong),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }
}

pub enum FramedEvent {
    Line(String),
    Pong,
}

impl FramedWriter {
    pub async fn write_line(&mut self, text: &str) -> eyre::Result<()> {
        self.0.send(Message::Text(text.to_string().into())).await?;
        Ok(())
    }

    pub async fn send_ping(&mut self) -> eyre::Result<()> {
        self.0.send(Message::Ping(Vec::new().into())).await?;
        Ok(())
    }
}

/// Tracks the last pong time for a framed connection so the periodic maintenance sweep can
/// decide whether `pong_wait` has elapsed, transitioning the connection to Zombie exactly once.
pub struct HeartbeatController {
    last_pong: Mutex<Instant>,
    zombied: AtomicBool,
}

impl HeartbeatController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { last_pong: Mutex::new(Instant::now()), zombied: AtomicBool::new(false) })
    }

    pub fn record_pong(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    /// Returns `true` the first time `pong_wait` has been exceeded; returns `false` on every
    /// subsequent call so the caller transitions to Zombie exactly once.
    pub fn check_timeout(&self, pong_wait: Duration) -> bool {
        if self.zombied.load(Ordering::Relaxed) {
            return false;
        }
        if self.last_pong.lock().elapsed() > pong_wait {
            self.zombied.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_fires_zombie_transition_exactly_once() {
        let hb = HeartbeatController::new();
        std::thread::sleep(Duration::from_millis(5));
        assert!(hb.check_timeout(Duration::from_millis(1)));
        assert!(!hb.check_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn recording_a_pong_resets_the_window() {
        let hb = HeartbeatController::new();
        std::thread::sleep(Duration::from_millis(5));
        hb.record_pong();
        assert!(!hb.check_timeout(Duration::from_millis(1000)));
    }
}
