//! Per-connection session driver
//!
//! A session pairs one connection with one [`GameState`]. It runs as two
//! cooperating tasks joined by a bounded command queue:
//!
//! - **reader**: parses inbound messages into [`ClientCommand`]s and queues
//!   them. A full queue makes the reader wait, which in turn stops it reading
//!   from the connection.
//! - **tick**: sole writer of the game. Applies commands as they arrive, and
//!   on every timer fire steps the simulation by the real elapsed time,
//!   renders the diff and writes it out.
//!
//! When the connection closes the reader drops its end of the queue, which
//! ends the tick loop. A failed write ends the tick loop and cancels the
//! reader. Either way the registry entry is dropped with the session.

use crate::protocol::{parse_envelope, ClientCommand};
use crate::registry::{SessionHandle, SessionRegistry};
use crate::render::Renderer;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, info, warn};
use shared::{Clock, GameState};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use uuid::Uuid;

/// Deltas above this are logged; the simulation still uses the real value.
const LARGE_DELTA: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick_duration: Duration,
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / 60.0),
            queue_capacity: 10,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to write frame: {0}")]
    Send(String),
}

/// Runs a session until its connection goes away
///
/// `inbound` yields raw text messages, `outbound` accepts rendered payloads.
/// The session is registered for exactly as long as this future runs.
pub async fn run_session<R, E, W>(
    inbound: R,
    outbound: W,
    registry: Arc<SessionRegistry>,
    config: SessionConfig,
) -> Result<(), SessionError>
where
    R: Stream<Item = Result<String, E>> + Send + 'static,
    E: Display + Send + 'static,
    W: Sink<String> + Send,
    W::Error: Display,
{
    let handle = Arc::new(SessionHandle::new(Uuid::new_v4().to_string()));
    let _registration = registry.register(Arc::clone(&handle));
    info!("Session {} opened", handle.id);

    let (command_tx, command_rx) = mpsc::channel(config.queue_capacity.max(1));
    let reader = tokio::spawn(read_commands(inbound, command_tx, Arc::clone(&handle)));

    let mut game = GameState::new();
    let result = tick_loop(outbound, command_rx, &handle, &config, &mut game).await;
    reader.abort();

    match &result {
        Ok(()) => info!("Session {} closed", handle.id),
        Err(e) => warn!("Session {} terminated: {}", handle.id, e),
    }
    result
}

/// Reader task: inbound messages to queued commands
async fn read_commands<R, E>(
    inbound: R,
    commands: mpsc::Sender<ClientCommand>,
    handle: Arc<SessionHandle>,
) where
    R: Stream<Item = Result<String, E>>,
    E: Display,
{
    tokio::pin!(inbound);

    while let Some(message) = inbound.next().await {
        let text = match message {
            Ok(text) => text,
            Err(e) => {
                warn!("Session {} read error: {}", handle.id, e);
                break;
            }
        };
        handle.touch();

        match parse_envelope(&text) {
            Ok(command) if command.is_empty() => {
                debug!("Session {} ignored message: {}", handle.id, text);
            }
            Ok(command) => {
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Session {} discarded message: {}", handle.id, e),
        }
    }

    debug!("Session {} reader finished", handle.id);
}

/// Tick task: sole writer of the session's game state
async fn tick_loop<W, C>(
    outbound: W,
    mut commands: mpsc::Receiver<ClientCommand>,
    handle: &SessionHandle,
    config: &SessionConfig,
    game: &mut GameState<C>,
) -> Result<(), SessionError>
where
    W: Sink<String>,
    W::Error: Display,
    C: Clock,
{
    tokio::pin!(outbound);

    let mut renderer = Renderer::new(&handle.id);

    let mut ticker = interval(config.tick_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => apply_command(game, command),
                None => break,
            },

            _ = ticker.tick() => {
                while let Ok(command) = commands.try_recv() {
                    apply_command(game, command);
                }

                let now = Instant::now();
                let elapsed = now.duration_since(last_tick);
                last_tick = now;
                if elapsed > LARGE_DELTA {
                    warn!(
                        "Session {}: large delta time ({:.3}s)",
                        handle.id,
                        elapsed.as_secs_f32()
                    );
                }

                game.update(elapsed.as_secs_f32());

                let frame_id = if game.game_over {
                    None
                } else {
                    Some(game.begin_frame())
                };
                let payload = renderer.render(game, frame_id);

                let telemetry = game.telemetry();
                handle.publish_telemetry(telemetry.client_fps(), telemetry.average_latency_ms());

                if !payload.is_empty() {
                    outbound
                        .send(payload)
                        .await
                        .map_err(|e| SessionError::Send(e.to_string()))?;
                    handle.touch();
                }

                ticks += 1;
                if ticks % 60 == 0 {
                    debug!(
                        "Session {}: frame {}, {} bullets, {:.1} fps, {:.1}ms latency",
                        handle.id,
                        game.frame_id,
                        game.bullets.len(),
                        game.server_fps(),
                        telemetry.average_latency_ms()
                    );
                }
            },
        }
    }

    Ok(())
}

fn apply_command<C: Clock>(game: &mut GameState<C>, command: ClientCommand) {
    if let Some((action, phase)) = command.input {
        game.process_input(action, phase);
    }
    if let Some(frame_id) = command.frame_ack {
        game.process_frame_ack(frame_id);
    }
}
