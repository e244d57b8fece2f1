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

//! The per-connection handler chain. Per-byte handlers (protocol-escape, escape-sequence,
//! input-cleanser) run on every byte and can consume it outright; per-line handlers (login-prompt,
//! history, system-command) run once a line is complete and decide whether it ever becomes an
//! `Input` event. Named insertion lets content packs splice in extra stages without forking the
//! whole chain.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::connection::state::History;

/// What a handler decided to do with the byte or line it just saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Let the next handler in the chain see this byte/line.
    Continue,
    /// Fully consumed; no further handler in this chain runs, and (for line handlers) no `Input`
    /// event is produced from it.
    Stop,
}

/// What the pipeline produced after consuming one byte.
pub enum PipelineEvent {
    /// Nothing submission-worthy happened yet (still mid-line, or the byte was pure control).
    None,
    /// A full line was submitted and should become an `Input` event for the scheduler.
    Submit(String),
    /// A full line was submitted but fully absorbed by a line handler (login step, admin
    /// command, etc.) -- never becomes an `Input` event.
    Consumed,
    /// The accumulator (and any echoed text) changed and the caller should re-render the prompt,
    /// e.g. after a backspace or an accepted suggestion.
    Redraw,
}

/// The stage of the pre-login handshake the login-prompt handler is in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStage {
    Username,
    Password { username: String },
    NewAccountConfirm { username: String },
    NewAccountPassword { username: String },
    Email { username: String },
    Done,
}

/// Mutable state threaded through every handler in the chain for one connection. Handlers
/// communicate with each other only through this shared map and the well-known fields, never
/// directly.
pub struct PipelineContext {
    pub accumulator: String,
    pub logged_in: bool,
    pub is_admin: bool,
    pub echo_secret: bool,
    pub suggestion: Option<String>,
    pub login_stage: LoginStage,
    pub history: History,
    pub shared: HashMap<String, String>,
    pub last_submit: Option<Instant>,
    pub min_submit_interval: Duration,
    in_iac: bool,
    in_escape: EscapeState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeState {
    None,
    SawEsc,
    SawBracket,
}

impl PipelineContext {
    pub fn new(history_capacity: usize, min_submit_interval: Duration) -> Self {
        Self {
            accumulator: String::new(),
            logged_in: false,
            is_admin: false,
            echo_secret: false,
            suggestion: None,
            login_stage: LoginStage::Username,
            history: History::new(history_capacity),
            shared: HashMap::new(),
            last_submit: None,
            min_submit_interval,
            in_iac: false,
            in_escape: EscapeState::None,
        }
    }

    /// Command-flood guard: enforces a minimum interval of `turn_ms` between submitted inputs.
    /// `true` means this submission is too soon and should be dropped rather than queued.
    fn flood_gate(&mut self) -> bool {
        let now = Instant::now();
        let blocked = self.last_submit.map(|t| now.duration_since(t) < self.min_submit_interval).unwrap_or(false);
        if !blocked {
            self.last_submit = Some(now);
        }
        blocked
    }
}

pub trait ByteHandler: Send {
    fn name(&self) -> &'static str;
    fn handle(&mut self, byte: u8, ctx: &mut PipelineContext) -> HandlerOutcome;
}

pub trait LineHandler: Send {
    fn name(&self) -> &'static str;
    fn handle(&mut self, line: &str, ctx: &mut PipelineContext) -> HandlerOutcome;
}

/// The ordered chain for one connection. Line-stream transports install the full eight-stage
/// chain; framed transports skip protocol-escape, escape-sequence, and echo.
pub struct Pipeline {
    byte_handlers: Vec<(&'static str, Box<dyn ByteHandler>)>,
    line_handlers: Vec<(&'static str, Box<dyn LineHandler>)>,
    ctx: PipelineContext,
}

impl Pipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { byte_handlers: Vec::new(), line_handlers: Vec::new(), ctx }
    }

    pub fn push_byte_handler(&mut self, handler: Box<dyn ByteHandler>) {
        self.byte_handlers.push((handler.name(), handler));
    }

    pub fn push_line_handler(&mut self, handler: Box<dyn LineHandler>) {
        self.line_handlers.push((handler.name(), handler));
    }

    /// Inserts a handler immediately after the named predecessor, or at the front if no such
    /// predecessor is registered.
    pub fn insert_line_handler_after(&mut self, predecessor: &'static str, handler: Box<dyn LineHandler>) {
        let pos = self.line_handlers.iter().position(|(name, _)| *name == predecessor).map(|i| i + 1).unwrap_or(0);
        self.line_handlers.insert(pos, (handler.name(), handler));
    }

    pub fn remove_line_handler(&mut self, name: &str) {
        self.line_handlers.retain(|(n, _)| *n != name);
    }

    pub fn ctx(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut PipelineContext {
        &mut self.ctx
    }

    /// Feeds one byte through the per-byte handlers, then -- if it terminates a line -- through
    /// the per-line handlers.
    pub fn feed_byte(&mut self, byte: u8) -> PipelineEvent {
        for (_, handler) in self.byte_handlers.iter_mut() {
            if handler.handle(byte, &mut self.ctx) == HandlerOutcome::Stop {
                return if self.ctx.accumulator.ends_with('\n') {
                    self.finish_line()
                } else {
                    PipelineEvent::Redraw
                };
            }
        }

        if byte == b'\n' {
            return self.finish_line();
        }
        if byte == b'\r' {
            return PipelineEvent::None;
        }
        self.ctx.accumulator.push(byte as char);
        PipelineEvent::Redraw
    }

    fn finish_line(&mut self) -> PipelineEvent {
        let line = std::mem::take(&mut self.ctx.accumulator).trim_end_matches(['\r', '\n']).to_string();
        self.ctx.suggestion = None;

        for (_, handler) in self.line_handlers.iter_mut() {
            if handler.handle(&line, &mut self.ctx) == HandlerOutcome::Stop {
                return PipelineEvent::Consumed;
            }
        }

        if !self.ctx.logged_in {
            return PipelineEvent::Consumed;
        }
        if self.ctx.flood_gate() {
            return PipelineEvent::Consumed;
        }
        PipelineEvent::Submit(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::handlers::{HistoryHandler, InputCleanser};

    fn logged_in_pipeline() -> Pipeline {
        let mut ctx = PipelineContext::new(10, Duration::from_millis(0));
        ctx.logged_in = true;
        let mut pipeline = Pipeline::new(ctx);
        pipeline.push_byte_handler(Box::new(InputCleanser::default()));
        pipeline.push_line_handler(Box::new(HistoryHandler));
        pipeline
    }

    #[test]
    fn a_full_line_submits_once_logged_in() {
        let mut pipeline = logged_in_pipeline();
        let mut last = PipelineEvent::None;
        for byte in b"look\n" {
            last = pipeline.feed_byte(*byte);
        }
        match last {
            PipelineEvent::Submit(line) => assert_eq!(line, "look"),
            _ => panic!("expected a submission"),
        }
    }

    #[test]
    fn lines_before_login_are_consumed_not_submitted() {
        let mut ctx = PipelineContext::new(10, Duration::from_millis(0));
        ctx.logged_in = false;
        let mut pipeline = Pipeline::new(ctx);
        for byte in b"hello\n" {
            let event = pipeline.feed_byte(*byte);
            if byte == &b'\n' {
                assert!(matches!(event, PipelineEvent::Consumed));
            }
        }
    }

    #[test]
    fn submitted_lines_are_recorded_in_history() {
        let mut pipeline = logged_in_pipeline();
        for byte in b"say hi\n" {
            pipeline.feed_byte(*byte);
        }
        assert_eq!(pipeline.ctx_mut().history.older(), Some("say hi"));
    }
}
