use crate::clock::{Clock, SystemClock};
use crate::geometry::Rect;
use crate::telemetry::{FrameLog, Telemetry};
use crate::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

/// Who fired a bullet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Player,
    Alien,
}

#[derive(Debug, Clone)]
pub struct Bullet {
    /// Unique within a session, never reused.
    pub id: u64,
    pub x: f32,
    pub y: f32,
    /// Negative travels up (player), positive travels down (alien).
    pub vel_y: f32,
    pub owner: Owner,
}

impl Bullet {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, BULLET_WIDTH, BULLET_HEIGHT)
    }

    fn in_playfield(&self) -> bool {
        self.y >= -BULLET_HEIGHT && self.y < GAME_HEIGHT
    }
}

/// What a ship or alien should currently look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visual {
    Alive,
    Exploding,
    Hidden,
}

impl Visual {
    fn after_death(died_at: Option<Instant>, now: Instant) -> Self {
        match died_at {
            None => Visual::Alive,
            Some(t) if now.saturating_duration_since(t) < EXPLOSION_DURATION => Visual::Exploding,
            Some(_) => Visual::Hidden,
        }
    }
}

/// Authoritative state of one session's game.
///
/// Mutated only by the session's tick task. Once `game_over` is set, input
/// and physics are frozen and only rendering continues.
#[derive(Debug)]
pub struct GameState<C: Clock = SystemClock> {
    pub ship_x: f32,
    pub alien_x: f32,
    pub alien_y: f32,
    pub alien_vel_x: f32,
    pub bullets: Vec<Bullet>,
    pub score: u32,

    pub moving_left: bool,
    pub moving_right: bool,

    pub last_shot: Option<Instant>,
    pub last_alien_shot: Option<Instant>,

    pub ship_died_at: Option<Instant>,
    pub alien_died_at: Option<Instant>,
    pub game_over: bool,

    /// Id of the most recently sent frame.
    pub frame_id: u64,
    next_bullet_id: u64,
    frames: FrameLog,
    telemetry: Telemetry,

    fps_frames: u32,
    fps_window_start: Instant,
    server_fps: f32,

    clock: C,
    rng: StdRng,
}

impl GameState<SystemClock> {
    pub fn new() -> Self {
        Self::build(SystemClock, StdRng::from_entropy())
    }
}

impl Default for GameState<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> GameState<C> {
    /// Creates a game driven by `clock` with a deterministic respawn RNG.
    pub fn with_clock(clock: C, seed: u64) -> Self {
        Self::build(clock, StdRng::seed_from_u64(seed))
    }

    fn build(clock: C, rng: StdRng) -> Self {
        let now = clock.now();
        Self {
            ship_x: (GAME_WIDTH - SHIP_WIDTH) / 2.0,
            alien_x: ALIEN_SPAWN_X,
            alien_y: ALIEN_SPAWN_Y,
            alien_vel_x: ALIEN_SPEED,
            bullets: Vec::new(),
            score: 0,
            moving_left: false,
            moving_right: false,
            last_shot: None,
            last_alien_shot: None,
            ship_died_at: None,
            alien_died_at: None,
            game_over: false,
            frame_id: 0,
            next_bullet_id: 1,
            frames: FrameLog::new(),
            telemetry: Telemetry::new(now),
            fps_frames: 0,
            fps_window_start: now,
            server_fps: 0.0,
            clock,
            rng,
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn ship_alive(&self) -> bool {
        self.ship_died_at.is_none()
    }

    pub fn alien_alive(&self) -> bool {
        self.alien_died_at.is_none()
    }

    pub fn ship_bounds(&self) -> Rect {
        Rect::new(self.ship_x, SHIP_Y, SHIP_WIDTH, SHIP_HEIGHT)
    }

    pub fn alien_bounds(&self) -> Rect {
        Rect::new(self.alien_x, self.alien_y, ALIEN_WIDTH, ALIEN_HEIGHT)
    }

    pub fn ship_visual(&self) -> Visual {
        Visual::after_death(self.ship_died_at, self.now())
    }

    pub fn alien_visual(&self) -> Visual {
        Visual::after_death(self.alien_died_at, self.now())
    }

    pub fn server_fps(&self) -> f32 {
        self.server_fps
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn pending_frames(&self) -> &FrameLog {
        &self.frames
    }

    pub fn process_input(&mut self, action: Action, phase: Phase) {
        if self.game_over {
            return;
        }

        match (action, phase) {
            (Action::Left, phase) => self.moving_left = phase == Phase::Press,
            (Action::Right, phase) => self.moving_right = phase == Phase::Press,
            (Action::Shoot, Phase::Press) => self.fire(),
            (Action::Shoot, Phase::Release) => {}
        }
    }

    fn fire(&mut self) {
        let now = self.now();
        if let Some(last) = self.last_shot {
            if now.saturating_duration_since(last) < FIRE_COOLDOWN {
                return;
            }
        }

        let x = self.ship_x + SHIP_WIDTH / 2.0 - BULLET_WIDTH / 2.0;
        let y = SHIP_Y - SHIP_HEIGHT;
        self.spawn_bullet(x, y, PLAYER_BULLET_SPEED, Owner::Player);
        self.last_shot = Some(now);
    }

    fn spawn_bullet(&mut self, x: f32, y: f32, vel_y: f32, owner: Owner) {
        let id = self.next_bullet_id;
        self.next_bullet_id += 1;
        self.bullets.push(Bullet {
            id,
            x,
            y,
            vel_y,
            owner,
        });
    }

    /// Advances the simulation by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if self.game_over {
            return;
        }

        let now = self.now();

        if let Some(died_at) = self.alien_died_at {
            if now.saturating_duration_since(died_at) > RESPAWN_DELAY {
                self.respawn_alien();
            }
        }

        if self.moving_left {
            self.ship_x -= SHIP_SPEED * dt;
        }
        if self.moving_right {
            self.ship_x += SHIP_SPEED * dt;
        }
        self.ship_x = self.ship_x.clamp(0.0, GAME_WIDTH - SHIP_WIDTH);

        if self.alien_alive() {
            self.move_alien(dt);

            let due = self
                .last_alien_shot
                .map_or(true, |t| now.saturating_duration_since(t) > ALIEN_SHOT_INTERVAL);
            if due {
                let x = self.alien_x + ALIEN_WIDTH / 2.0 - BULLET_WIDTH / 2.0;
                let y = self.alien_y + ALIEN_HEIGHT;
                self.spawn_bullet(x, y, ALIEN_BULLET_SPEED, Owner::Alien);
                self.last_alien_shot = Some(now);
            }
        }

        for bullet in &mut self.bullets {
            bullet.y += bullet.vel_y * dt;
        }
        self.bullets.retain(Bullet::in_playfield);

        self.handle_collisions(now);
        self.count_frame(now);
    }

    fn respawn_alien(&mut self) {
        self.alien_died_at = None;
        self.alien_x = self.rng.gen_range(0.0..GAME_WIDTH - ALIEN_WIDTH);
        self.alien_y = ALIEN_SPAWN_Y;
        self.alien_vel_x = if self.rng.gen_bool(0.5) {
            ALIEN_SPEED
        } else {
            -ALIEN_SPEED
        };
    }

    fn move_alien(&mut self, dt: f32) {
        let max_x = GAME_WIDTH - ALIEN_WIDTH;
        self.alien_x += self.alien_vel_x * dt;

        if self.alien_x <= 0.0 || self.alien_x >= max_x {
            self.alien_vel_x = -self.alien_vel_x;
            // No floor on the descent: the alien keeps creeping down.
            self.alien_y += ALIEN_CREEP_STEP;
            self.alien_x = self.alien_x.clamp(0.0, max_x);
        }
    }

    /// Resolves at most one hit per bullet; bullets that hit are removed.
    fn handle_collisions(&mut self, now: Instant) {
        let mut bullets = std::mem::take(&mut self.bullets);

        bullets.retain(|bullet| {
            let hit = match bullet.owner {
                Owner::Player if self.alien_alive() => {
                    bullet.bounds().overlaps(&self.alien_bounds())
                }
                Owner::Alien if self.ship_alive() => bullet.bounds().overlaps(&self.ship_bounds()),
                _ => false,
            };

            if hit {
                match bullet.owner {
                    Owner::Player => {
                        self.alien_died_at = Some(now);
                        self.score += KILL_SCORE;
                    }
                    Owner::Alien => {
                        self.ship_died_at = Some(now);
                        self.game_over = true;
                    }
                }
            }

            !hit
        });

        self.bullets = bullets;
    }

    fn count_frame(&mut self, now: Instant) {
        self.fps_frames += 1;
        let elapsed = now.saturating_duration_since(self.fps_window_start);
        if elapsed >= Duration::from_secs(1) {
            self.server_fps = self.fps_frames as f32 / elapsed.as_secs_f32();
            self.fps_frames = 0;
            self.fps_window_start = now;
        }
    }

    /// Stamps the next outgoing frame and returns its id.
    pub fn begin_frame(&mut self) -> u64 {
        self.frame_id += 1;
        let now = self.now();
        self.frames.record(self.frame_id, now);
        self.frame_id
    }

    /// Handles an echoed frame id. Unknown, repeated, or expired ids are ignored.
    pub fn process_frame_ack(&mut self, frame_id: u64) {
        let Some(sent_at) = self.frames.take(frame_id) else {
            return;
        };

        let now = self.now();
        self.telemetry
            .record_rtt(now.saturating_duration_since(sent_at), now);
        self.frames.sweep(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use assert_approx_eq::assert_approx_eq;

    const DT: f32 = 1.0 / 60.0;

    fn test_game() -> (GameState<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut game = GameState::with_clock(clock.clone(), 7);
        // Keep the alien quiet unless a test wants it to shoot.
        game.last_alien_shot = Some(clock.now());
        (game, clock)
    }

    fn tick(game: &mut GameState<ManualClock>, clock: &ManualClock) {
        clock.advance_secs(DT);
        game.update(DT);
    }

    fn player_bullets(game: &GameState<ManualClock>) -> usize {
        game.bullets
            .iter()
            .filter(|b| b.owner == Owner::Player)
            .count()
    }

    #[test]
    fn test_initial_state() {
        let (game, _) = test_game();
        assert_eq!(game.ship_x, 164.0);
        assert_eq!(game.alien_x, 164.0);
        assert_eq!(game.alien_y, 50.0);
        assert_eq!(game.alien_vel_x, 100.0);
        assert_eq!(game.score, 0);
        assert!(game.bullets.is_empty());
        assert!(!game.game_over);
        assert_eq!(game.ship_visual(), Visual::Alive);
        assert_eq!(game.alien_visual(), Visual::Alive);
    }

    #[test]
    fn test_move_intent_follows_press_and_release() {
        let (mut game, clock) = test_game();

        game.process_input(Action::Left, Phase::Press);
        assert!(game.moving_left);
        tick(&mut game, &clock);
        assert_approx_eq!(game.ship_x, 164.0 - SHIP_SPEED * DT, 0.001);

        game.process_input(Action::Left, Phase::Release);
        assert!(!game.moving_left);
        let x = game.ship_x;
        tick(&mut game, &clock);
        assert_eq!(game.ship_x, x);
    }

    #[test]
    fn test_ship_clamped_to_playfield() {
        let (mut game, _) = test_game();

        game.process_input(Action::Right, Phase::Press);
        game.update(10.0);
        assert_eq!(game.ship_x, GAME_WIDTH - SHIP_WIDTH);

        game.process_input(Action::Right, Phase::Release);
        game.process_input(Action::Left, Phase::Press);
        game.update(10.0);
        assert_eq!(game.ship_x, 0.0);
    }

    #[test]
    fn test_fire_rate_limit() {
        let (mut game, clock) = test_game();

        game.process_input(Action::Shoot, Phase::Press);
        assert_eq!(player_bullets(&game), 1);

        clock.advance(Duration::from_millis(400));
        game.process_input(Action::Shoot, Phase::Press);
        assert_eq!(player_bullets(&game), 1);

        clock.advance(Duration::from_millis(200));
        game.process_input(Action::Shoot, Phase::Press);
        assert_eq!(player_bullets(&game), 2);
    }

    #[test]
    fn test_shoot_release_is_ignored() {
        let (mut game, _) = test_game();
        game.process_input(Action::Shoot, Phase::Release);
        assert!(game.bullets.is_empty());
    }

    #[test]
    fn test_player_bullet_spawns_above_ship() {
        let (mut game, _) = test_game();
        game.process_input(Action::Shoot, Phase::Press);

        let bullet = &game.bullets[0];
        assert_eq!(bullet.x, 164.0 + 16.0 - 2.0);
        assert_eq!(bullet.y, SHIP_Y - SHIP_HEIGHT);
        assert_eq!(bullet.vel_y, PLAYER_BULLET_SPEED);
        assert_eq!(bullet.owner, Owner::Player);
    }

    #[test]
    fn test_bullet_ids_strictly_increase() {
        let (mut game, clock) = test_game();
        let mut seen = Vec::new();

        for _ in 0..5 {
            game.process_input(Action::Shoot, Phase::Press);
            seen.push(game.bullets.last().map(|b| b.id).unwrap());
            clock.advance(FIRE_COOLDOWN);
            game.update(0.5);
        }

        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_alien_bounces_and_creeps_down() {
        let (mut game, clock) = test_game();
        assert_eq!(game.ship_x, 164.0);

        let mut ticks = 0;
        while game.alien_vel_x > 0.0 {
            tick(&mut game, &clock);
            ticks += 1;
            assert!(ticks < 1000, "alien never reached the right edge");
        }

        assert_eq!(game.alien_x, GAME_WIDTH - ALIEN_WIDTH);
        assert_eq!(game.alien_x, 328.0);
        assert_eq!(game.alien_vel_x, -100.0);
        assert_eq!(game.alien_y, 70.0);
    }

    #[test]
    fn test_alien_bounces_off_left_edge() {
        let (mut game, _) = test_game();
        game.alien_x = 1.0;
        game.alien_vel_x = -100.0;

        game.update(0.1);

        assert_eq!(game.alien_x, 0.0);
        assert_eq!(game.alien_vel_x, 100.0);
        assert_eq!(game.alien_y, 70.0);
    }

    #[test]
    fn test_alien_descent_is_unbounded() {
        let (mut game, _) = test_game();
        for _ in 0..40 {
            game.alien_x = 0.0;
            game.alien_vel_x = -100.0;
            game.update(0.001);
        }
        assert_eq!(game.alien_y, ALIEN_SPAWN_Y + 40.0 * ALIEN_CREEP_STEP);
        assert!(game.alien_y > GAME_HEIGHT);
    }

    #[test]
    fn test_alien_fires_on_interval() {
        let clock = ManualClock::new();
        let mut game = GameState::with_clock(clock.clone(), 1);
        game.ship_x = 0.0;

        game.update(DT);
        let alien_shots = |g: &GameState<ManualClock>| {
            g.bullets.iter().filter(|b| b.owner == Owner::Alien).count()
        };
        assert_eq!(alien_shots(&game), 1);
        let bullet = &game.bullets[0];
        assert_eq!(bullet.vel_y, ALIEN_BULLET_SPEED);
        assert_approx_eq!(bullet.y, ALIEN_SPAWN_Y + ALIEN_HEIGHT + ALIEN_BULLET_SPEED * DT, 0.001);

        clock.advance(Duration::from_millis(1900));
        game.update(DT);
        assert_eq!(alien_shots(&game), 1);

        clock.advance(Duration::from_millis(200));
        game.update(DT);
        assert_eq!(alien_shots(&game), 2);
    }

    #[test]
    fn test_bullets_leave_playfield() {
        let (mut game, _) = test_game();
        game.bullets.push(Bullet {
            id: 90,
            x: 10.0,
            y: -11.0,
            vel_y: PLAYER_BULLET_SPEED,
            owner: Owner::Player,
        });
        game.bullets.push(Bullet {
            id: 91,
            x: 10.0,
            y: GAME_HEIGHT - 1.0,
            vel_y: ALIEN_BULLET_SPEED,
            owner: Owner::Alien,
        });
        game.bullets.push(Bullet {
            id: 92,
            x: 10.0,
            y: 200.0,
            vel_y: ALIEN_BULLET_SPEED,
            owner: Owner::Alien,
        });

        game.update(0.01);

        let ids: Vec<u64> = game.bullets.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![92]);
    }

    #[test]
    fn test_bullet_at_top_margin_is_kept() {
        let (mut game, _) = test_game();
        game.bullets.push(Bullet {
            id: 5,
            x: 300.0,
            y: -BULLET_HEIGHT,
            vel_y: 0.0,
            owner: Owner::Player,
        });
        game.update(0.01);
        assert_eq!(game.bullets.len(), 1);
    }

    #[test]
    fn test_alien_hit_scores_and_respawns() {
        let (mut game, clock) = test_game();
        game.alien_vel_x = 0.0;
        game.bullets.push(Bullet {
            id: 42,
            x: game.alien_x + 10.0,
            y: game.alien_y + 20.0,
            vel_y: 0.0,
            owner: Owner::Player,
        });

        game.update(DT);

        assert!(!game.alien_alive());
        assert_eq!(game.score, 100);
        assert!(game.bullets.iter().all(|b| b.id != 42));
        assert_eq!(game.alien_visual(), Visual::Exploding);

        clock.advance(Duration::from_millis(600));
        game.update(DT);
        assert_eq!(game.alien_visual(), Visual::Hidden);
        assert!(!game.alien_alive());

        clock.advance(Duration::from_millis(1300));
        game.update(DT);
        assert!(!game.alien_alive(), "respawn must wait more than 2 seconds");

        clock.advance(Duration::from_millis(200));
        game.update(0.0);
        assert!(game.alien_alive());
        assert_eq!(game.alien_visual(), Visual::Alive);
        assert_eq!(game.alien_y, ALIEN_SPAWN_Y);
        assert_eq!(game.alien_vel_x.abs(), ALIEN_SPEED);
        assert!(game.alien_x >= 0.0 && game.alien_x <= GAME_WIDTH - ALIEN_WIDTH);
        assert_eq!(game.score, 100);
    }

    #[test]
    fn test_dead_alien_is_not_hit_again() {
        let (mut game, _) = test_game();
        let now = game.now();
        game.alien_died_at = Some(now);
        game.bullets.push(Bullet {
            id: 1,
            x: game.alien_x + 10.0,
            y: game.alien_y + 10.0,
            vel_y: 0.0,
            owner: Owner::Player,
        });

        game.update(DT);

        assert_eq!(game.score, 0);
        assert_eq!(game.bullets.len(), 1);
    }

    #[test]
    fn test_each_hit_adds_exactly_one_kill_score() {
        let (mut game, clock) = test_game();
        let mut last_score = 0;

        for kill in 1..=3 {
            game.alien_vel_x = 0.0;
            game.bullets.push(Bullet {
                id: 1000 + kill,
                x: game.alien_x + 14.0,
                y: game.alien_y + 10.0,
                vel_y: 0.0,
                owner: Owner::Player,
            });
            game.update(DT);
            assert_eq!(game.score, last_score + KILL_SCORE);
            last_score = game.score;

            clock.advance(Duration::from_millis(2100));
            game.last_alien_shot = Some(clock.now());
            game.update(DT);
            assert!(game.alien_alive());
        }
    }

    #[test]
    fn test_ship_hit_ends_game() {
        let (mut game, clock) = test_game();
        game.bullets.push(Bullet {
            id: 3,
            x: game.ship_x + 10.0,
            y: SHIP_Y + 5.0,
            vel_y: 0.0,
            owner: Owner::Alien,
        });

        game.update(DT);

        assert!(game.game_over);
        assert!(!game.ship_alive());
        assert!(game.bullets.is_empty());
        assert_eq!(game.ship_visual(), Visual::Exploding);

        clock.advance(EXPLOSION_DURATION);
        assert_eq!(game.ship_visual(), Visual::Hidden);
    }

    #[test]
    fn test_game_over_freezes_simulation() {
        let (mut game, clock) = test_game();
        game.game_over = true;
        game.bullets.push(Bullet {
            id: 1,
            x: 50.0,
            y: 100.0,
            vel_y: ALIEN_BULLET_SPEED,
            owner: Owner::Alien,
        });
        let (ship_x, alien_x, score) = (game.ship_x, game.alien_x, game.score);

        game.process_input(Action::Right, Phase::Press);
        game.process_input(Action::Shoot, Phase::Press);
        clock.advance_secs(1.0);
        game.update(1.0);

        assert!(!game.moving_right);
        assert_eq!(game.bullets.len(), 1);
        assert_eq!(game.bullets[0].y, 100.0);
        assert_eq!(game.ship_x, ship_x);
        assert_eq!(game.alien_x, alien_x);
        assert_eq!(game.score, score);
    }

    #[test]
    fn test_enemy_bullet_ignores_alien_and_player_bullet_ignores_ship() {
        let (mut game, _) = test_game();
        game.alien_vel_x = 0.0;
        game.bullets.push(Bullet {
            id: 1,
            x: game.alien_x + 10.0,
            y: game.alien_y + 10.0,
            vel_y: 0.0,
            owner: Owner::Alien,
        });
        game.bullets.push(Bullet {
            id: 2,
            x: game.ship_x + 10.0,
            y: SHIP_Y + 10.0,
            vel_y: 0.0,
            owner: Owner::Player,
        });

        game.update(DT);

        assert!(game.alien_alive());
        assert!(game.ship_alive());
        assert_eq!(game.bullets.len(), 2);
    }

    #[test]
    fn test_server_fps_measured_per_second() {
        let (mut game, clock) = test_game();
        assert_eq!(game.server_fps(), 0.0);

        for _ in 0..59 {
            clock.advance(Duration::from_millis(16));
            game.update(0.016);
        }
        assert_eq!(game.server_fps(), 0.0);

        clock.advance(Duration::from_millis(56));
        game.update(0.056);
        assert_approx_eq!(game.server_fps(), 60.0, 0.01);
    }

    #[test]
    fn test_frame_ack_records_round_trip() {
        let (mut game, clock) = test_game();

        let id = game.begin_frame();
        assert_eq!(id, 1);
        assert!(game.pending_frames().contains(id));

        clock.advance(Duration::from_millis(40));
        game.process_frame_ack(id);

        assert!(!game.pending_frames().contains(id));
        assert_eq!(game.telemetry().sample_count(), 1);
        assert_approx_eq!(game.telemetry().average_latency_ms(), 40.0, 0.01);
    }

    #[test]
    fn test_unknown_and_repeated_acks_are_ignored() {
        let (mut game, clock) = test_game();
        let id = game.begin_frame();
        clock.advance(Duration::from_millis(10));

        game.process_frame_ack(999);
        assert_eq!(game.telemetry().sample_count(), 0);

        game.process_frame_ack(id);
        game.process_frame_ack(id);
        assert_eq!(game.telemetry().sample_count(), 1);
    }

    #[test]
    fn test_ack_sweeps_stale_frames() {
        let (mut game, clock) = test_game();
        let stale = game.begin_frame();
        clock.advance(Duration::from_secs(6));
        let fresh = game.begin_frame();
        let other = game.begin_frame();

        clock.advance(Duration::from_millis(20));
        game.process_frame_ack(fresh);

        assert!(!game.pending_frames().contains(stale));
        assert!(game.pending_frames().contains(other));
        assert_eq!(game.pending_frames().len(), 1);
    }
}
