//! Headless stand-in for the browser: echoes every frame marker back as an
//! acknowledgment, optionally fires on a timer, and logs what it observes.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use server::render::frame_marker;
use std::time::Duration;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(author, version, about = "Diagnostic client for the invaders server")]
struct Args {
    /// WebSocket endpoint of the game
    #[arg(short, long, default_value = "ws://127.0.0.1:8080/game")]
    url: String,

    /// Fire every N milliseconds (0 disables firing)
    #[arg(short, long, default_value_t = 0)]
    fire_every: u64,

    /// Delay before each acknowledgment, to simulate latency
    #[arg(short = 'l', long, default_value_t = 0)]
    fake_ping: u64,

    /// Stop after this many seconds (0 runs until the server closes)
    #[arg(short, long, default_value_t = 0)]
    duration: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (socket, _) = connect_async(args.url.as_str()).await?;
    info!("Connected to {}", args.url);
    let (mut write, mut read) = socket.split();

    let mut report = interval(Duration::from_secs(1));
    report.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut fire = interval(Duration::from_millis(args.fire_every.max(1)));
    fire.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let deadline = (args.duration > 0).then(|| Instant::now() + Duration::from_secs(args.duration));
    let mut frames: u32 = 0;
    let mut bytes: usize = 0;
    let mut last_frame_id = 0;

    loop {
        if deadline.map_or(false, |d| Instant::now() >= d) {
            info!("Duration elapsed, closing");
            write.send(Message::Close(None)).await?;
            break;
        }

        tokio::select! {
            message = read.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("Read error: {}", e);
                        break;
                    }
                };

                frames += 1;
                bytes += text.len();
                if text.contains("GAME OVER") {
                    info!("Game over after {} frames", last_frame_id);
                }

                if let Some(frame_id) = frame_marker(&text) {
                    last_frame_id = frame_id;
                    if args.fake_ping > 0 {
                        sleep(Duration::from_millis(args.fake_ping)).await;
                    }
                    let ack = format!(r#"{{"action":"ack","frameId":"{}"}}"#, frame_id);
                    write.send(Message::Text(ack)).await?;
                }
            }

            _ = fire.tick(), if args.fire_every > 0 => {
                let shot = r#"{"action":"shoot","type":"press"}"#.to_string();
                write.send(Message::Text(shot)).await?;
            }

            _ = report.tick() => {
                if frames > 0 {
                    info!(
                        "{} frames/s, {:.1} bytes/frame, last frame {}",
                        frames,
                        bytes as f32 / frames as f32,
                        last_frame_id
                    );
                }
                frames = 0;
                bytes = 0;
            }
        }
    }

    Ok(())
}
