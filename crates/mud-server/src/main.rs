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

//! Process entry point. Everything up to here has been connection-agnostic (`mud-engine`) or a
//! standalone piece of server plumbing (`connection`, `transport`, `input`); this is the only
//! place that wires them into one running process and the only place that owns an async runtime.

mod args;
mod config;
mod connection;
mod input;
mod session_bridge;
mod transport;

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mud_common::config::Config;
use mud_common::{FatalError, UserId};
use mud_engine::npc::conversation::NoOpConversationDriver;
use mud_engine::npc::path::NoOpPathfinder;
use mud_engine::script::{ScriptHost, ScriptRuntime};
use mud_engine::session::{Role, UserRegistry};
use mud_engine::world::content_store::YamlContentStore;
use mud_engine::world::World;
use mud_engine::{Actor, Scheduler, SchedulerControl};
use parking_lot::Mutex as PlMutex;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::connection::ConnectionManager;
use crate::input::handlers::{
    EchoHandler, EscapeSequenceHandler, HistoryHandler, InputCleanser, LoginPromptHandler, ProtocolEscapeHandler,
    SignalHandler, SystemCommandHandler,
};
use crate::input::pipeline::{Pipeline, PipelineContext, PipelineEvent};
use crate::session_bridge::EngineBroadcaster;
use crate::transport::framed::{FramedEvent, HeartbeatController};
use crate::transport::{framed, line_stream};

/// Top-level error funnel. Fatal startup errors carry their own exit-code mapping (see
/// [`FatalError::exit_code`]); anything else that escapes `try_main` (a dependency error, an
/// unclassified `eyre::Report`) still gets a readable trace via `color-eyre` but exits `1`
/// rather than silently defaulting to the wrong category.
fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    if let Err(report) = try_main() {
        if let Some(fatal) = report.downcast_ref::<FatalError>() {
            error!("{report:?}");
            std::process::exit(fatal.exit_code());
        }
        eprintln!("{report:?}");
        std::process::exit(1);
    }
    Ok(())
}

fn try_main() -> eyre::Result<()> {
    let args = args::Args::parse();

    let mut cfg = config::load(args.config.as_deref()).map_err(|e| FatalError::Config(e.to_string()))?;
    if let Some(port) = args.telnet_port {
        cfg.listen.telnet_port = port;
    }
    if let Some(port) = args.ws_port {
        cfg.listen.ws_port = port;
    }

    tracing_subscriber::fmt().with_env_filter(config::log_filter()).init();

    if args.probe_port {
        let addr = SocketAddr::new(cfg.listen.bind_addr, cfg.listen.telnet_port);
        match StdTcpListener::bind(addr) {
            Ok(_) => {
                println!("port {} is free", cfg.listen.telnet_port);
                return Ok(());
            }
            Err(e) => {
                println!("port {} is busy: {e}", cfg.listen.telnet_port);
                std::process::exit(1);
            }
        }
    }

    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(run(cfg))
}

async fn run(cfg: Config) -> eyre::Result<()> {
    std::fs::create_dir_all(&cfg.world.content_path).ok();
    let index_path = cfg.world.content_path.join("users.idx");
    let registry = UserRegistry::open(&index_path, &cfg.session)
        .map_err(|e| FatalError::CorruptUsernameIndex(e.to_string()))?;
    let registry = Arc::new(PlMutex::new(registry));

    let content = Arc::new(YamlContentStore::new(cfg.world.content_path.clone()));
    let world = World::new(content, cfg.world.room_unload_rounds, cfg.world.room_unload_threshold);

    let connections = ConnectionManager::new(cfg.connection.history_size, cfg.connection.max_connections);
    let broadcaster = Arc::new(EngineBroadcaster(connections.clone())) as Arc<dyn mud_engine::Broadcaster>;

    let commands = mud_engine::tasks::builtin_table();
    let keywords = mud_engine::tasks::KeywordAliasTable::new();
    let emotes = mud_engine::tasks::EmoteAliasTable::new();

    let script_host = Arc::new(ScriptHost::new(cfg.script.clone()));
    let scripts = ScriptRuntime::new(script_host.clone(), cfg.world.content_path.join("scripts"));

    let (input_tx, input_rx) = crossbeam_channel::unbounded::<(Actor, String)>();
    let (control_tx, control_rx) = crossbeam_channel::unbounded::<SchedulerControl>();
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::unbounded::<()>();

    let scheduler = Scheduler::new(
        world,
        cfg.clock.clone(),
        &cfg.npc,
        commands,
        keywords,
        emotes,
        broadcaster,
        scripts,
        Box::new(NoOpPathfinder),
        Box::new(NoOpConversationDriver),
        registry.clone(),
        input_rx,
        control_rx,
        shutdown_rx,
    );
    let scheduler_handle = std::thread::Builder::new()
        .name("scheduler".to_string())
        .spawn(move || scheduler.run())
        .expect("failed to spawn scheduler thread");

    let telnet_addr = SocketAddr::new(cfg.listen.bind_addr, cfg.listen.telnet_port);
    let telnet_listener = TcpListener::bind(telnet_addr)
        .await
        .map_err(|e| FatalError::PortBind(telnet_addr.to_string(), e))?;
    info!(%telnet_addr, "telnet transport listening");

    let ws_addr = SocketAddr::new(cfg.listen.bind_addr, cfg.listen.ws_port);
    let ws_listener = TcpListener::bind(ws_addr).await.map_err(|e| FatalError::PortBind(ws_addr.to_string(), e))?;
    info!(%ws_addr, "websocket transport listening");

    let telnet_task = tokio::spawn(accept_telnet_loop(
        telnet_listener,
        connections.clone(),
        registry.clone(),
        input_tx.clone(),
        control_tx.clone(),
        shutdown_tx.clone(),
        cfg.clone(),
        script_host.clone(),
        true,
    ));
    let ws_task = tokio::spawn(accept_ws_loop(
        ws_listener,
        connections.clone(),
        registry.clone(),
        input_tx.clone(),
        control_tx.clone(),
        shutdown_tx.clone(),
        cfg.clone(),
        script_host.clone(),
    ));
    let maintenance_task = tokio::spawn(maintenance_loop(connections.clone(), cfg.clone()));

    let admin_task = if let Some(port) = cfg.connection.loopback_admin_port {
        let admin_addr = SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), port);
        let admin_listener = TcpListener::bind(admin_addr).await.map_err(|e| FatalError::PortBind(admin_addr.to_string(), e))?;
        info!(%admin_addr, "loopback admin transport listening");
        Some(tokio::spawn(accept_telnet_loop(
            admin_listener,
            connections.clone(),
            registry.clone(),
            input_tx.clone(),
            control_tx.clone(),
            shutdown_tx.clone(),
            cfg.clone(),
            script_host.clone(),
            false,
        )))
    } else {
        None
    };

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown requested, draining connections");
    let _ = shutdown_tx.send(());
    telnet_task.abort();
    ws_task.abort();
    maintenance_task.abort();
    if let Some(task) = admin_task {
        task.abort();
    }

    tokio::task::spawn_blocking(move || scheduler_handle.join())
        .await
        .ok();
    Ok(())
}

/// Periodic sweep: logged-in connections quiet past
/// `zombie_seconds` become zombies rather than being torn down outright, so a reconnect within
/// the grace window can rebind the same user instead of spawning a fresh one.
async fn maintenance_loop(connections: Arc<ConnectionManager>, cfg: Config) {
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    loop {
        ticker.tick().await;
        for conn in connections.idle_past(cfg.connection.zombie_seconds) {
            connections.set_zombie(conn);
        }
    }
}

fn full_pipeline(history_capacity: usize, min_submit_interval: Duration, registry: Arc<PlMutex<UserRegistry>>) -> Pipeline {
    let ctx = PipelineContext::new(history_capacity, min_submit_interval);
    let mut pipeline = Pipeline::new(ctx);
    pipeline.push_byte_handler(Box::new(ProtocolEscapeHandler::default()));
    pipeline.push_byte_handler(Box::new(EscapeSequenceHandler::default()));
    pipeline.push_byte_handler(Box::new(InputCleanser::default()));
    pipeline.push_byte_handler(Box::new(EchoHandler));
    pipeline.push_byte_handler(Box::new(SignalHandler));
    pipeline.push_line_handler(Box::new(LoginPromptHandler::new(registry)));
    pipeline.push_line_handler(Box::new(HistoryHandler));
    pipeline.push_line_handler(Box::new(SystemCommandHandler));
    pipeline
}

/// Framed transports skip protocol-escape, escape-sequence and echo -- one frame is already one
/// submission, so there is no raw byte stream to negotiate or echo over.
fn framed_pipeline(history_capacity: usize, min_submit_interval: Duration, registry: Arc<PlMutex<UserRegistry>>) -> Pipeline {
    let ctx = PipelineContext::new(history_capacity, min_submit_interval);
    let mut pipeline = Pipeline::new(ctx);
    pipeline.push_line_handler(Box::new(LoginPromptHandler::new(registry)));
    pipeline.push_line_handler(Box::new(HistoryHandler));
    pipeline.push_line_handler(Box::new(SystemCommandHandler));
    pipeline
}

/// Resolves pending login/admin state from a pipeline's shared map after a line has been
/// consumed, applying the side effects the handler chain itself only recorded. Returns `true` if
/// the caller should tear the connection down (the admin `/quit` escape).
fn apply_pipeline_side_effects(
    pipeline: &mut Pipeline,
    conn_id: mud_common::ConnectionId,
    connections: &ConnectionManager,
    registry: &PlMutex<UserRegistry>,
    control_tx: &crossbeam_channel::Sender<SchedulerControl>,
    logged_in_announced: &mut bool,
    shutdown_tx: &crossbeam_channel::Sender<()>,
    scripts: &ScriptHost,
) -> bool {
    let ctx = pipeline.ctx_mut();

    if !*logged_in_announced && ctx.logged_in {
        *logged_in_announced = true;
        if let Some(id_str) = ctx.shared.get("user_id").cloned() {
            if let Ok(raw_id) = id_str.parse::<u64>() {
                let user = UserId(raw_id);
                connections.set_logged_in(conn_id, user);
                if let Some(record) = registry.lock().user(user) {
                    if record.role == Role::Admin {
                        ctx.is_admin = true;
                    }
                }
                connections.send_line(conn_id, "Welcome.");
                let _ = control_tx.send(SchedulerControl::Login { user, connection: conn_id });
            }
        }
    }

    if ctx.shared.remove("admin_quit").is_some() {
        return true;
    }
    if ctx.shared.remove("admin_reload").is_some() {
        scripts.invalidate_all();
        info!("admin reload requested; script cache invalidated");
    }
    if let Some(seconds) = ctx.shared.remove("admin_shutdown") {
        let seconds: u64 = seconds.parse().unwrap_or(0);
        connections.broadcast(&format!("*** Server shutting down in {seconds}s ***"));
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            let _ = shutdown_tx.send(());
        });
    }
    false
}

async fn accept_telnet_loop(
    listener: TcpListener,
    connections: Arc<ConnectionManager>,
    registry: Arc<PlMutex<UserRegistry>>,
    input_tx: crossbeam_channel::Sender<(Actor, String)>,
    control_tx: crossbeam_channel::Sender<SchedulerControl>,
    shutdown_tx: crossbeam_channel::Sender<()>,
    cfg: Config,
    scripts: Arc<ScriptHost>,
    capacity_limited: bool,
) {
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "telnet accept failed");
                continue;
            }
        };
        let connections = connections.clone();
        let registry = registry.clone();
        let input_tx = input_tx.clone();
        let control_tx = control_tx.clone();
        let shutdown_tx = shutdown_tx.clone();
        let cfg = cfg.clone();
        let scripts = scripts.clone();
        tokio::spawn(async move {
            if let Err(e) =
                handle_telnet(socket, addr, connections, registry, input_tx, control_tx, shutdown_tx, cfg, scripts, capacity_limited)
                    .await
            {
                warn!(error = %e, "telnet connection ended with error");
            }
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_telnet(
    socket: tokio::net::TcpStream,
    addr: SocketAddr,
    connections: Arc<ConnectionManager>,
    registry: Arc<PlMutex<UserRegistry>>,
    input_tx: crossbeam_channel::Sender<(Actor, String)>,
    control_tx: crossbeam_channel::Sender<SchedulerControl>,
    shutdown_tx: crossbeam_channel::Sender<()>,
    cfg: Config,
    scripts: Arc<ScriptHost>,
    capacity_limited: bool,
) -> eyre::Result<()> {
    let (mut writer, mut reader) = line_stream::accept(socket).await?;
    let (outbox_tx, mut outbox_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let conn_id = if capacity_limited {
        match connections.accept_public(addr.to_string(), outbox_tx) {
            Some(id) => id,
            None => {
                let _ = writer.write_line("*** server is full, try again later ***").await;
                return Ok(());
            }
        }
    } else {
        connections.accept(addr.to_string(), outbox_tx)
    };

    let write_task = tokio::spawn(async move {
        while let Some(line) = outbox_rx.recv().await {
            if writer.write_line(&line).await.is_err() {
                break;
            }
        }
    });

    let mut pipeline = full_pipeline(cfg.connection.history_size, cfg.turn_duration(), registry.clone());
    let mut logged_in_announced = false;

    loop {
        let Some(Ok(line)) = reader.read_line().await else { break };
        connections.record_input(conn_id, line.clone());

        let mut last = PipelineEvent::None;
        for byte in line.as_bytes() {
            last = pipeline.feed_byte(*byte);
        }
        last = pipeline.feed_byte(b'\n');

        match last {
            PipelineEvent::Submit(text) => {
                if let Some(id_str) = pipeline.ctx().shared.get("user_id").cloned() {
                    if let Ok(raw_id) = id_str.parse::<u64>() {
                        let _ = input_tx.send((Actor::User(UserId(raw_id)), text));
                    }
                }
            }
            PipelineEvent::Consumed | PipelineEvent::Redraw | PipelineEvent::None => {}
        }

        let should_close = apply_pipeline_side_effects(
            &mut pipeline, conn_id, &connections, &registry, &control_tx, &mut logged_in_announced, &shutdown_tx, &scripts,
        );
        if should_close {
            break;
        }
    }

    write_task.abort();
    finish_connection(conn_id, &pipeline, &connections, &control_tx, cfg.connection.zombie_seconds);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn accept_ws_loop(
    listener: TcpListener,
    connections: Arc<ConnectionManager>,
    registry: Arc<PlMutex<UserRegistry>>,
    input_tx: crossbeam_channel::Sender<(Actor, String)>,
    control_tx: crossbeam_channel::Sender<SchedulerControl>,
    shutdown_tx: crossbeam_channel::Sender<()>,
    cfg: Config,
    scripts: Arc<ScriptHost>,
) {
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "websocket accept failed");
                continue;
            }
        };
        let connections = connections.clone();
        let registry = registry.clone();
        let input_tx = input_tx.clone();
        let control_tx = control_tx.clone();
        let shutdown_tx = shutdown_tx.clone();
        let cfg = cfg.clone();
        let scripts = scripts.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_ws(socket, addr, connections, registry, input_tx, control_tx, shutdown_tx, cfg, scripts).await {
                warn!(error = %e, "websocket connection ended with error");
            }
        });
    }
}

/// What the write task does with one slot from its queue: a text frame, or a bare ping. Kept as
/// one channel (rather than racing two receivers) so frame ordering on the wire matches send
/// order exactly.
enum WsOutbound {
    Line(String),
    Ping,
}

#[allow(clippy::too_many_arguments)]
async fn handle_ws(
    socket: tokio::net::TcpStream,
    addr: SocketAddr,
    connections: Arc<ConnectionManager>,
    registry: Arc<PlMutex<UserRegistry>>,
    input_tx: crossbeam_channel::Sender<(Actor, String)>,
    control_tx: crossbeam_channel::Sender<SchedulerControl>,
    shutdown_tx: crossbeam_channel::Sender<()>,
    cfg: Config,
    scripts: Arc<ScriptHost>,
) -> eyre::Result<()> {
    let (mut writer, mut reader) = framed::accept(socket).await?;

    // `ConnectionManager` only knows how to forward plain `String` lines (the broadcaster's
    // entire surface), so pings ride a second, server-local channel merged into the same write
    // task rather than widening that shared type for one transport's heartbeat.
    let (outbox_tx, mut outbox_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let (ping_tx, mut ping_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    let conn_id = connections.accept(addr.to_string(), outbox_tx);

    let write_task = tokio::spawn(async move {
        loop {
            let outbound = tokio::select! {
                line = outbox_rx.recv() => match line {
                    Some(l) => WsOutbound::Line(l),
                    None => break,
                },
                tick = ping_rx.recv() => match tick {
                    Some(()) => WsOutbound::Ping,
                    None => break,
                },
            };
            let result = match outbound {
                WsOutbound::Line(l) => writer.write_line(&l).await,
                WsOutbound::Ping => writer.send_ping().await,
            };
            if result.is_err() {
                break;
            }
        }
    });

    let ping_ticker_task = {
        let ping_tx = ping_tx.clone();
        let period = cfg.connection.ping_period;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if ping_tx.send(()).is_err() {
                    break;
                }
            }
        })
    };

    let heartbeat = HeartbeatController::new();
    let mut pipeline = framed_pipeline(cfg.connection.history_size, cfg.turn_duration(), registry.clone());
    let mut logged_in_announced = false;
    let mut timeout_ticker = tokio::time::interval(cfg.connection.pong_wait);

    loop {
        tokio::select! {
            event = reader.read_event() => {
                let Some(event) = event else { break };
                match event {
                    FramedEvent::Pong => heartbeat.record_pong(),
                    FramedEvent::Line(text) => {
                        connections.record_input(conn_id, text.clone());
                        let mut last = PipelineEvent::None;
                        for byte in text.as_bytes() {
                            last = pipeline.feed_byte(*byte);
                        }
                        last = pipeline.feed_byte(b'\n');
                        if let PipelineEvent::Submit(submitted) = last {
                            if let Some(id_str) = pipeline.ctx().shared.get("user_id").cloned() {
                                if let Ok(raw_id) = id_str.parse::<u64>() {
                                    let _ = input_tx.send((Actor::User(UserId(raw_id)), submitted));
                                }
                            }
                        }
                        let should_close = apply_pipeline_side_effects(
                            &mut pipeline, conn_id, &connections, &registry, &control_tx, &mut logged_in_announced, &shutdown_tx, &scripts,
                        );
                        if should_close {
                            break;
                        }
                    }
                }
            }
            _ = timeout_ticker.tick() => {
                if heartbeat.check_timeout(cfg.connection.pong_wait) {
                    connections.set_zombie(conn_id);
                    break;
                }
            }
        }
    }

    ping_ticker_task.abort();
    write_task.abort();
    finish_connection(conn_id, &pipeline, &connections, &control_tx, cfg.connection.zombie_seconds);
    Ok(())
}

/// Tears the connection down on its way out: zombie it if the user was logged in and the grace
/// period is nonzero (so a reconnect can rebind), otherwise remove it outright and log the user
/// out of the world.
fn finish_connection(
    conn_id: mud_common::ConnectionId,
    pipeline: &Pipeline,
    connections: &ConnectionManager,
    control_tx: &crossbeam_channel::Sender<SchedulerControl>,
    zombie_seconds: u64,
) {
    if !pipeline.ctx().logged_in {
        connections.remove(conn_id);
        return;
    }
    if zombie_seconds > 0 {
        connections.set_zombie(conn_id);
        return;
    }
    if let Some(id_str) = pipeline.ctx().shared.get("user_id").cloned() {
        if let Ok(raw_id) = id_str.parse::<u64>() {
            let _ = control_tx.send(SchedulerControl::Logout { user: UserId(raw_id) });
        }
    }
    connections.remove(conn_id);
}
