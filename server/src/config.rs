use crate::session::SessionConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command line configuration for the server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Tick rate of every session (updates per second)
    #[arg(short, long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub tick_rate: u32,

    /// Capacity of each session's inbound command queue
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
    pub queue_capacity: u16,

    /// Directory holding index.html, test.html and static/
    #[arg(short, long, default_value = "web")]
    pub web_root: PathBuf,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tick_duration: Duration::from_secs_f64(1.0 / self.tick_rate as f64),
            queue_capacity: self.queue_capacity as usize,
        }
    }
}
