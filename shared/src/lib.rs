//! # Invaders Simulation Core
//!
//! Pure, synchronous game logic shared by the server and its tests. Nothing in
//! this crate performs I/O: time comes from a [`Clock`], randomness from a
//! seedable RNG, and rendering is left to the caller.
//!
//! ## Module Organization
//!
//! - [`clock`]: injectable time source so timers can be driven by tests
//! - [`geometry`]: axis-aligned rectangles and the overlap test
//! - [`telemetry`]: round-trip sampling, client frame rate, sent-frame records
//! - [`game`]: the per-session simulation (ship, alien, bullets, score)

pub mod clock;
pub mod game;
pub mod geometry;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use game::{Bullet, GameState, Owner, Visual};
pub use geometry::Rect;
pub use telemetry::{FrameLog, Telemetry};

use std::time::Duration;

pub const GAME_WIDTH: f32 = 360.0;
pub const GAME_HEIGHT: f32 = 480.0;

pub const SHIP_WIDTH: f32 = 32.0;
pub const SHIP_HEIGHT: f32 = 32.0;
/// Distance between the bottom edge and the ship's top edge.
pub const SHIP_BOTTOM_MARGIN: f32 = 50.0;
pub const SHIP_Y: f32 = GAME_HEIGHT - SHIP_BOTTOM_MARGIN;
pub const SHIP_SPEED: f32 = 150.0;

pub const ALIEN_WIDTH: f32 = 32.0;
pub const ALIEN_HEIGHT: f32 = 32.0;
pub const ALIEN_SPAWN_X: f32 = 164.0;
pub const ALIEN_SPAWN_Y: f32 = 50.0;
pub const ALIEN_SPEED: f32 = 100.0;
pub const ALIEN_CREEP_STEP: f32 = 20.0;

pub const BULLET_WIDTH: f32 = 4.0;
pub const BULLET_HEIGHT: f32 = 12.0;
pub const PLAYER_BULLET_SPEED: f32 = -400.0;
pub const ALIEN_BULLET_SPEED: f32 = 200.0;

pub const KILL_SCORE: u32 = 100;

pub const FIRE_COOLDOWN: Duration = Duration::from_millis(500);
pub const ALIEN_SHOT_INTERVAL: Duration = Duration::from_secs(2);
pub const RESPAWN_DELAY: Duration = Duration::from_secs(2);
pub const EXPLOSION_DURATION: Duration = Duration::from_millis(500);

/// Player intent carried by an inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Left,
    Right,
    Shoot,
}

impl Action {
    /// Maps a wire action name; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Action::Left),
            "right" => Some(Action::Right),
            "shoot" => Some(Action::Shoot),
            _ => None,
        }
    }
}

/// Key phase of an input. `keydown`/`keyup` are accepted for older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Press,
    Release,
}

impl Phase {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "press" | "keydown" => Some(Phase::Press),
            "release" | "keyup" => Some(Phase::Release),
            _ => None,
        }
    }
}
