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

//! The eight named handlers of the standard chain. Each is deliberately small -- the chain's
//! job is sequencing, not any one stage doing a lot of work.

use std::sync::Arc;

use mud_engine::session::UserRegistry;
use parking_lot::Mutex;

use crate::input::pipeline::{HandlerOutcome, LoginStage, PipelineContext};

// --- per-byte handlers --------------------------------------------------------------------

/// Consumes telnet IAC option-negotiation replies and sub-negotiation sequences so they never
/// reach the accumulator. Line-stream only -- framed transports omit this stage entirely.
#[derive(Default)]
pub struct ProtocolEscapeHandler {
    remaining: u8,
}

impl super::pipeline::ByteHandler for ProtocolEscapeHandler {
    fn name(&self) -> &'static str {
        "protocol-escape"
    }

    fn handle(&mut self, byte: u8, _ctx: &mut PipelineContext) -> HandlerOutcome {
        const IAC: u8 = 255;
        if self.remaining > 0 {
            self.remaining -= 1;
            return HandlerOutcome::Stop;
        }
        if byte == IAC {
            self.remaining = 2; // command + option byte
            return HandlerOutcome::Stop;
        }
        HandlerOutcome::Continue
    }
}

/// Interprets cursor/keycode escape sequences: arrow up/down walk history, Tab cycles the active
/// suggestion, backspace edits the accumulator in place.
#[derive(Default)]
pub struct EscapeSequenceHandler {
    state: EscState,
}

#[derive(Default, PartialEq, Eq)]
enum EscState {
    #[default]
    None,
    SawEsc,
    SawBracket,
}

impl super::pipeline::ByteHandler for EscapeSequenceHandler {
    fn name(&self) -> &'static str {
        "escape-sequence"
    }

    fn handle(&mut self, byte: u8, ctx: &mut PipelineContext) -> HandlerOutcome {
        const ESC: u8 = 0x1b;
        const TAB: u8 = 0x09;
        const BACKSPACE: u8 = 0x08;
        const DEL: u8 = 0x7f;

        match self.state {
            EscState::None => {
                if byte == ESC {
                    self.state = EscState::SawEsc;
                    return HandlerOutcome::Stop;
                }
                if byte == TAB {
                    if let Some(suggestion) = ctx.suggestion.take() {
                        ctx.accumulator = suggestion;
                    }
                    return HandlerOutcome::Stop;
                }
                if byte == BACKSPACE || byte == DEL {
                    ctx.accumulator.pop();
                    return HandlerOutcome::Stop;
                }
                HandlerOutcome::Continue
            }
            EscState::SawEsc => {
                if byte == b'[' {
                    self.state = EscState::SawBracket;
                } else {
                    self.state = EscState::None;
                }
                HandlerOutcome::Stop
            }
            EscState::SawBracket => {
                self.state = EscState::None;
                match byte {
                    b'A' => {
                        if let Some(line) = ctx.history.older() {
                            ctx.accumulator = line.to_string();
                        }
                    }
                    b'B' => {
                        ctx.accumulator = ctx.history.newer().map(str::to_string).unwrap_or_default();
                    }
                    _ => {}
                }
                HandlerOutcome::Stop
            }
        }
    }
}

/// Strips bytes outside printable ASCII / common whitespace and caps line length so a runaway
/// client can't grow the accumulator unbounded.
pub struct InputCleanser {
    max_len: usize,
}

impl Default for InputCleanser {
    fn default() -> Self {
        Self { max_len: 1024 }
    }
}

impl super::pipeline::ByteHandler for InputCleanser {
    fn name(&self) -> &'static str {
        "input-cleanser"
    }

    fn handle(&mut self, byte: u8, ctx: &mut PipelineContext) -> HandlerOutcome {
        if byte == b'\n' || byte == b'\r' {
            return HandlerOutcome::Continue;
        }
        if !(0x20..0x7f).contains(&byte) {
            return HandlerOutcome::Stop; // drop disallowed control bytes silently
        }
        if ctx.accumulator.len() >= self.max_len {
            return HandlerOutcome::Stop;
        }
        HandlerOutcome::Continue
    }
}

/// Echoes typed characters straight back to the connection, masking with `*` while
/// `ctx.echo_secret` is set (password entry). Writes accumulate in `ctx.shared["echo_out"]`,
/// which the write task drains after every byte -- this handler never touches the socket
/// directly, so it stays testable without one. Post-login chains install this.
#[derive(Default)]
pub struct EchoHandler;

impl super::pipeline::ByteHandler for EchoHandler {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn handle(&mut self, byte: u8, ctx: &mut PipelineContext) -> HandlerOutcome {
        if byte == b'\n' || byte == b'\r' {
            return HandlerOutcome::Continue;
        }
        let shown = if ctx.echo_secret { '*' } else { byte as char };
        ctx.shared.entry("echo_out".to_string()).or_default().push(shown);
        HandlerOutcome::Continue
    }
}

/// Traps interrupt-equivalent key chords (Ctrl-C) and records that the connection asked to be
/// interrupted, without itself deciding what that means (the worker loop checks `shared`).
#[derive(Default)]
pub struct SignalHandler;

impl super::pipeline::ByteHandler for SignalHandler {
    fn name(&self) -> &'static str {
        "signal"
    }

    fn handle(&mut self, byte: u8, ctx: &mut PipelineContext) -> HandlerOutcome {
        const CTRL_C: u8 = 0x03;
        if byte == CTRL_C {
            ctx.shared.insert("interrupt".to_string(), "1".to_string());
            return HandlerOutcome::Stop;
        }
        HandlerOutcome::Continue
    }
}

// --- per-line handlers ---------------------------------------------------------------------

/// Drives the pre-login state machine: username, password, optional new-account confirm, email.
/// On success it stores the resolved `UserId` in `ctx.shared["user_id"]` and flips
/// `ctx.logged_in`; the outer worker loop removes this handler once that happens.
pub struct LoginPromptHandler {
    registry: Arc<Mutex<UserRegistry>>,
}

impl LoginPromptHandler {
    pub fn new(registry: Arc<Mutex<UserRegistry>>) -> Self {
        Self { registry }
    }
}

impl super::pipeline::LineHandler for LoginPromptHandler {
    fn name(&self) -> &'static str {
        "login-prompt"
    }

    fn handle(&mut self, line: &str, ctx: &mut PipelineContext) -> HandlerOutcome {
        if ctx.logged_in {
            return HandlerOutcome::Continue;
        }

        match ctx.login_stage.clone() {
            LoginStage::Username => {
                let username = line.trim().to_string();
                if username.is_empty() {
                    return HandlerOutcome::Stop;
                }
                ctx.login_stage = LoginStage::Password { username };
                ctx.echo_secret = true;
                HandlerOutcome::Stop
            }
            LoginStage::Password { username } => {
                ctx.echo_secret = false;
                let mut registry = self.registry.lock();
                match registry.authenticate(&username, line) {
                    Ok(user_id) => {
                        ctx.shared.insert("user_id".to_string(), user_id.0.to_string());
                        ctx.logged_in = true;
                        ctx.login_stage = LoginStage::Done;
                    }
                    Err(mud_engine::session::AuthError::NoSuchUser) => {
                        ctx.login_stage = LoginStage::NewAccountConfirm { username };
                    }
                    Err(_) => {
                        ctx.login_stage = LoginStage::Username;
                    }
                }
                HandlerOutcome::Stop
            }
            LoginStage::NewAccountConfirm { username } => {
                if line.trim().eq_ignore_ascii_case("y") {
                    ctx.login_stage = LoginStage::NewAccountPassword { username };
                    ctx.echo_secret = true;
                } else {
                    ctx.login_stage = LoginStage::Username;
                }
                HandlerOutcome::Stop
            }
            LoginStage::NewAccountPassword { username } => {
                ctx.echo_secret = false;
                let mut registry = self.registry.lock();
                match registry.create_account(&username, line) {
                    Ok(user_id) => {
                        ctx.shared.insert("user_id".to_string(), user_id.0.to_string());
                        ctx.logged_in = true;
                        ctx.login_stage = LoginStage::Done;
                    }
                    Err(_) => {
                        ctx.login_stage = LoginStage::Username;
                    }
                }
                HandlerOutcome::Stop
            }
            LoginStage::Email { .. } | LoginStage::Done => HandlerOutcome::Stop,
        }
    }
}

/// Appends every submitted line to the connection's scrollback ring.
pub struct HistoryHandler;

impl super::pipeline::LineHandler for HistoryHandler {
    fn name(&self) -> &'static str {
        "history"
    }

    fn handle(&mut self, line: &str, ctx: &mut PipelineContext) -> HandlerOutcome {
        ctx.history.push(line.to_string());
        HandlerOutcome::Continue
    }
}

/// Intercepts the admin escape commands `/quit`, `/reload`, `/shutdown [<seconds>]` outside the
/// normal game command stream. Only installed for admin sessions.
pub struct SystemCommandHandler;

impl super::pipeline::LineHandler for SystemCommandHandler {
    fn name(&self) -> &'static str {
        "system-command"
    }

    fn handle(&mut self, line: &str, ctx: &mut PipelineContext) -> HandlerOutcome {
        if !ctx.is_admin {
            return HandlerOutcome::Continue;
        }
        let trimmed = line.trim();
        if trimmed == "/quit" {
            ctx.shared.insert("admin_quit".to_string(), "1".to_string());
            return HandlerOutcome::Stop;
        }
        if trimmed == "/reload" {
            ctx.shared.insert("admin_reload".to_string(), "1".to_string());
            return HandlerOutcome::Stop;
        }
        if let Some(rest) = trimmed.strip_prefix("/shutdown") {
            let seconds = rest.trim().parse::<u64>().unwrap_or(0);
            ctx.shared.insert("admin_shutdown".to_string(), seconds.to_string());
            return HandlerOutcome::Stop;
        }
        HandlerOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::pipeline::{ByteHandler, LineHandler};

    fn ctx() -> PipelineContext {
        PipelineContext::new(10, std::time::Duration::from_millis(0))
    }

    #[test]
    fn backspace_edits_the_accumulator() {
        let mut ctx = ctx();
        ctx.accumulator = "loo".to_string();
        let mut handler = EscapeSequenceHandler::default();
        assert_eq!(handler.handle(0x08, &mut ctx), HandlerOutcome::Stop);
        assert_eq!(ctx.accumulator, "lo");
    }

    #[test]
    fn tab_accepts_the_pending_suggestion() {
        let mut ctx = ctx();
        ctx.suggestion = Some("north".to_string());
        let mut handler = EscapeSequenceHandler::default();
        handler.handle(0x09, &mut ctx);
        assert_eq!(ctx.accumulator, "north");
    }

    #[test]
    fn cleanser_drops_non_printable_bytes() {
        let mut ctx = ctx();
        let mut handler = InputCleanser::default();
        assert_eq!(handler.handle(0x01, &mut ctx), HandlerOutcome::Stop);
    }

    #[test]
    fn cleanser_passes_printable_bytes_through() {
        let mut ctx = ctx();
        let mut handler = InputCleanser::default();
        assert_eq!(handler.handle(b'a', &mut ctx), HandlerOutcome::Continue);
    }

    #[test]
    fn system_command_is_ignored_for_non_admins() {
        let mut ctx = ctx();
        ctx.is_admin = false;
        let mut handler = SystemCommandHandler;
        assert_eq!(handler.handle("/shutdown", &mut ctx), HandlerOutcome::Continue);
        assert!(!ctx.shared.contains_key("admin_shutdown"));
    }

    #[test]
    fn system_command_is_trapped_for_admins() {
        let mut ctx = ctx();
        ctx.is_admin = true;
        let mut handler = SystemCommandHandler;
        assert_eq!(handler.handle("/shutdown 30", &mut ctx), HandlerOutcome::Stop);
        assert_eq!(ctx.shared.get("admin_shutdown"), Some(&"30".to_string()));
    }

    #[test]
    fn signal_handler_traps_ctrl_c() {
        let mut ctx = ctx();
        let mut handler = SignalHandler;
        assert_eq!(handler.handle(0x03, &mut ctx), HandlerOutcome::Stop);
        assert!(ctx.shared.contains_key("interrupt"));
    }
}
