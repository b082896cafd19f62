//! # Invaders Session Server
//!
//! Authoritative, per-connection game server. Every WebSocket connection gets
//! its own isolated simulation that ticks on the server and streams
//! incremental view updates to a thin browser renderer.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The client only sends key presses and frame acknowledgments. Movement,
//! collisions, scoring and timers all run in [`shared::GameState`] inside the
//! session's tick task.
//!
//! ### Differential Rendering
//! Each tick renders into a batch of out-of-band HTML fragments. Fragments
//! whose content cannot have changed (sprite states, the bullet layer, the
//! game-over overlay) are only re-sent when they do change; positions and HUD
//! values are always sent.
//!
//! ### Latency Telemetry
//! Every frame carries an id that the client echoes back. The round trip
//! feeds a rolling latency average and a client-side frame rate estimate.
//!
//! ## Architecture Design
//!
//! ### Two Tasks Per Session
//! A reader task parses inbound messages and pushes commands into a bounded
//! queue. The tick task owns the simulation outright, drains the queue, steps
//! the game at a fixed cadence and writes the rendered payload. Only the tick
//! task ever touches game state, so the simulation needs no locking.
//!
//! ### Shared Registry
//! The [`registry::SessionRegistry`] is the only state shared between
//! sessions. It is a sharded concurrent map, so registering or removing one
//! session never stalls the ticks of another.
//!
//! ## Module Organization
//!
//! - [`config`]: command-line configuration
//! - [`protocol`]: inbound command envelope parsing
//! - [`render`]: differential view-update rendering
//! - [`registry`]: process-wide table of live sessions
//! - [`session`]: per-connection reader and tick tasks
//! - [`http`]: routes, WebSocket upgrade, static assets
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use clap::Parser;
//! use server::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::parse();
//!     server::http::serve(&config).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod http;
pub mod protocol;
pub mod registry;
pub mod render;
pub mod session;
