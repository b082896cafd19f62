//! Differential view-update rendering
//!
//! The browser keeps a static page skeleton and applies out-of-band swaps by
//! element id. Each render produces only the fragments that need swapping:
//!
//! | Fragment            | Sent when                                   |
//! |---------------------|---------------------------------------------|
//! | HUD scalars         | every frame                                 |
//! | `#positions` style  | every frame                                 |
//! | `#frame-ack` marker | every frame                                 |
//! | `#bullets` layer    | the set of bullet ids changed               |
//! | `#ship`, `#alien`   | the sprite moved between alive/exploding/hidden |
//! | `#overlay`          | the game entered or left game-over          |
//!
//! Once the game is over every other fragment is suppressed and only the
//! overlay is sent, re-sent when the ship's explosion finishes.

use shared::{Bullet, Clock, GameState, Owner, Visual, SHIP_Y};
use std::fmt::{self, Write};

const MARKER_PREFIX: &str = r#"name="frameId" value=""#;

/// What was sent last time, per element.
#[derive(Debug, Default)]
struct Snapshot {
    bullet_ids: Option<Vec<u64>>,
    ship: Option<Visual>,
    alien: Option<Visual>,
    game_over: Option<bool>,
}

/// Per-session renderer holding the previous-frame snapshot
#[derive(Debug)]
pub struct Renderer {
    session_tag: String,
    last: Snapshot,
}

impl Renderer {
    /// `session_id` is shortened to its first eight characters for the HUD.
    pub fn new(session_id: &str) -> Self {
        Self {
            session_tag: session_id.chars().take(8).collect(),
            last: Snapshot::default(),
        }
    }

    /// Renders the fragments needed to bring the client up to date
    ///
    /// `frame_id` is embedded as the acknowledgment marker when given.
    /// Returns an empty string when nothing needs sending.
    pub fn render<C: Clock>(&mut self, game: &GameState<C>, frame_id: Option<u64>) -> String {
        let mut out = String::with_capacity(1024);
        if self.write_frame(&mut out, game, frame_id).is_err() {
            // Only a Display impl can fail here. Drop the partial frame and
            // resend everything next time.
            out.clear();
            self.last = Snapshot::default();
        }
        out
    }

    fn write_frame<C: Clock>(
        &mut self,
        out: &mut String,
        game: &GameState<C>,
        frame_id: Option<u64>,
    ) -> fmt::Result {
        if game.game_over {
            self.write_game_over(out, game)
        } else {
            self.write_playing(out, game, frame_id)
        }
    }

    fn write_game_over<C: Clock>(&mut self, out: &mut String, game: &GameState<C>) -> fmt::Result {
        let ship = game.ship_visual();
        if self.last.game_over == Some(true) && self.last.ship == Some(ship) {
            return Ok(());
        }

        write!(out, r#"<div id="overlay" hx-swap-oob="true" class="overlay">"#)?;
        if ship == Visual::Exploding {
            write!(
                out,
                r#"<img class="sprite" src="/static/explosion-spaceship.svg" style="transform:translate({}px,{}px)">"#,
                px(game.ship_x),
                px(SHIP_Y)
            )?;
        }
        write!(out, "<span>GAME OVER</span></div>")?;

        self.last.game_over = Some(true);
        self.last.ship = Some(ship);
        Ok(())
    }

    fn write_playing<C: Clock>(
        &mut self,
        out: &mut String,
        game: &GameState<C>,
        frame_id: Option<u64>,
    ) -> fmt::Result {
        if self.last.game_over == Some(true) {
            // Leaving game-over: the client needs everything again.
            self.last = Snapshot::default();
        }
        if self.last.game_over != Some(false) {
            write!(
                out,
                r#"<div id="overlay" hx-swap-oob="true" class="overlay" hidden></div>"#
            )?;
            self.last.game_over = Some(false);
        }

        self.write_hud(out, game)?;

        let bullet_ids: Vec<u64> = game.bullets.iter().map(|b| b.id).collect();
        if self.last.bullet_ids.as_ref() != Some(&bullet_ids) {
            write_bullet_layer(out, &game.bullets)?;
            self.last.bullet_ids = Some(bullet_ids);
        }

        let ship = game.ship_visual();
        if self.last.ship != Some(ship) {
            write_sprite(out, "ship", ship, "spaceship.svg", "explosion-spaceship.svg")?;
            self.last.ship = Some(ship);
        }

        let alien = game.alien_visual();
        if self.last.alien != Some(alien) {
            write_sprite(out, "alien", alien, "alien.svg", "explosion-alien.svg")?;
            self.last.alien = Some(alien);
        }

        write_positions(out, game)?;

        if let Some(frame_id) = frame_id {
            write!(
                out,
                r#"<form id="frame-ack" ws-send hx-trigger="load" hx-swap-oob="true"><input type="hidden" name="action" value="ack"><input type="hidden" {}{}"></form>"#,
                MARKER_PREFIX, frame_id
            )?;
        }
        Ok(())
    }

    fn write_hud<C: Clock>(&self, out: &mut String, game: &GameState<C>) -> fmt::Result {
        let telemetry = game.telemetry();
        write!(
            out,
            r#"<div id="hud-score" hx-swap-oob="true">Score: {}</div>"#,
            game.score
        )?;
        write!(
            out,
            r#"<div id="hud-stats" hx-swap-oob="true">S:{}<br>C:{}<br>L:{}ms</div>"#,
            game.server_fps().round(),
            telemetry.client_fps().round(),
            telemetry.average_latency_ms().round()
        )?;
        write!(
            out,
            r#"<span id="hud-session" hx-swap-oob="true">Session: {}</span>"#,
            self.session_tag
        )
    }
}

fn write_bullet_layer(out: &mut String, bullets: &[Bullet]) -> fmt::Result {
    write!(out, r#"<div id="bullets" hx-swap-oob="true">"#)?;
    for bullet in bullets {
        let owner = match bullet.owner {
            Owner::Player => "player",
            Owner::Alien => "alien",
        };
        write!(
            out,
            r#"<img id="bullet-{}" class="sprite bullet {}" src="/static/bullet.svg">"#,
            bullet.id, owner
        )?;
    }
    write!(out, "</div>")
}

fn write_sprite(
    out: &mut String,
    id: &str,
    visual: Visual,
    alive_src: &str,
    explosion_src: &str,
) -> fmt::Result {
    match visual {
        Visual::Alive => write!(
            out,
            r#"<img id="{}" hx-swap-oob="true" class="sprite" src="/static/{}">"#,
            id, alive_src
        ),
        Visual::Exploding => write!(
            out,
            r#"<img id="{}" hx-swap-oob="true" class="sprite" src="/static/{}">"#,
            id, explosion_src
        ),
        Visual::Hidden => write!(
            out,
            r#"<img id="{}" hx-swap-oob="true" class="sprite" src="/static/{}" hidden>"#,
            id, alive_src
        ),
    }
}

fn write_positions<C: Clock>(out: &mut String, game: &GameState<C>) -> fmt::Result {
    write!(out, r#"<style id="positions" hx-swap-oob="true">"#)?;
    write_translate(out, "ship", game.ship_x, SHIP_Y)?;
    write_translate(out, "alien", game.alien_x, game.alien_y)?;
    for bullet in &game.bullets {
        write_translate(out, &format!("bullet-{}", bullet.id), bullet.x, bullet.y)?;
    }
    write!(out, "</style>")
}

fn write_translate(out: &mut String, id: &str, x: f32, y: f32) -> fmt::Result {
    write!(out, "#{}{{transform:translate({}px,{}px)}}", id, px(x), px(y))
}

fn px(v: f32) -> i32 {
    v.round() as i32
}

/// Extracts the frame id from a rendered payload's acknowledgment marker.
pub fn frame_marker(payload: &str) -> Option<u64> {
    let start = payload.find(MARKER_PREFIX)? + MARKER_PREFIX.len();
    let digits: String = payload[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
