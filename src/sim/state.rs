//! Game state and core simulation types
//!
//! Holds the kinematic bodies (balls), the actuated bodies (flippers) and the
//! session state that ties them to an obstacle set.

use std::collections::VecDeque;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::engine::Physics;
use super::geometry::Segment;
use super::schedule::Scheduler;
use super::table::{FlipperSide, FlipperSpec, ObstacleSet, TableLayout};
use crate::Tuning;
use crate::consts::*;
use crate::tuning::PhysicsTuning;

/// A ball entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Fixed at construction
    radius: f32,
    /// False while the ball sits in the launcher
    pub launched: bool,
    /// Recent positions, oldest first (bounded by [`TRAIL_LENGTH`])
    #[serde(skip)]
    trail: VecDeque<Vec2>,
}

impl Ball {
    pub fn new(id: u32, pos: Vec2) -> Self {
        Self::with_radius(id, pos, BALL_RADIUS)
    }

    pub fn with_radius(id: u32, pos: Vec2, radius: f32) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            radius,
            launched: false,
            trail: VecDeque::with_capacity(TRAIL_LENGTH),
        }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Integrate velocity for one frame (gravity, damping, reaction zone, speed cap)
    ///
    /// Position is left alone: the engine moves the ball in substeps so it can
    /// test collisions along the way. `table_height` scales the reaction zone.
    pub fn update(&mut self, tuning: &PhysicsTuning, table_height: f32) {
        if !self.launched {
            return;
        }

        self.vel.y += tuning.gravity;
        self.vel *= tuning.damping;

        // Progressive slow-down the deeper the ball is in the reaction zone
        if let Some(zone) = tuning.reaction_zone {
            let start_y = table_height * zone.start;
            if self.pos.y > start_y && table_height > start_y {
                let depth = ((self.pos.y - start_y) / (table_height - start_y)).clamp(0.0, 1.0);
                let slowdown = (depth * zone.max_slowdown).min(zone.max_slowdown);
                self.vel *= 1.0 - slowdown;
            }
        }

        if !self.vel.is_finite() {
            log::warn!("Ball {} velocity diverged, stopping it", self.id);
            self.vel = Vec2::ZERO;
        }

        // Rescale (never clamp per component) so direction is preserved
        let speed = self.vel.length();
        if speed > tuning.max_velocity {
            self.vel *= tuning.max_velocity / speed;
        }
    }

    /// Fire the ball out of the launcher
    ///
    /// `power` is clamped to the configured launch range. Returns false if the
    /// ball was already launched.
    pub fn launch<R: Rng>(&mut self, power: f32, tuning: &PhysicsTuning, rng: &mut R) -> bool {
        if self.launched {
            return false;
        }
        // An inverted or NaN range must not panic
        let lo = tuning.launch_min.min(tuning.launch_max);
        let hi = tuning.launch_min.max(tuning.launch_max);
        let power = if lo.is_nan() || hi.is_nan() {
            0.0
        } else if power.is_nan() {
            lo
        } else {
            power.clamp(lo, hi)
        };
        let spread = tuning.launch_spread.abs();
        self.vel.y = -power;
        self.vel.x = if spread > 0.0 && spread.is_finite() {
            rng.random_range(-spread..spread)
        } else {
            0.0
        };
        self.launched = true;
        true
    }

    /// Put the ball back in the launcher
    pub fn reset(&mut self, pos: Vec2) {
        self.pos = pos;
        self.vel = Vec2::ZERO;
        self.launched = false;
        self.trail.clear();
    }

    /// Record current position to trail (call once per frame)
    pub fn record_trail(&mut self) {
        if self.trail.len() >= TRAIL_LENGTH {
            self.trail.pop_front();
        }
        self.trail.push_back(self.pos);
    }

    /// Trail points, oldest first
    pub fn trail(&self) -> impl Iterator<Item = &Vec2> {
        self.trail.iter()
    }

    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }
}

/// A flipper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flipper {
    pub side: FlipperSide,
    pub pivot: Vec2,
    pub angle: f32,
    pub target_angle: f32,
    pub rest_angle: f32,
    pub active_angle: f32,
    pub length: f32,
    pub is_active: bool,
}

impl Flipper {
    pub fn new(side: FlipperSide, spec: &FlipperSpec) -> Self {
        Self {
            side,
            pivot: spec.pivot,
            angle: spec.rest_angle,
            target_angle: spec.rest_angle,
            rest_angle: spec.rest_angle,
            active_angle: spec.active_angle,
            length: spec.length,
            is_active: false,
        }
    }

    /// Ease the angle toward rest/active (once per frame)
    pub fn update(&mut self, blend: f32) {
        self.target_angle = if self.is_active {
            self.active_angle
        } else {
            self.rest_angle
        };
        self.angle += (self.target_angle - self.angle) * blend;
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn end_point(&self) -> Vec2 {
        self.pivot + Vec2::new(self.angle.cos(), self.angle.sin()) * self.length
    }

    /// Swept line from pivot to tip
    pub fn segment(&self) -> Segment {
        Segment::new(self.pivot, self.end_point())
    }

    /// Angular speed estimate from the remaining travel
    pub fn speed(&self, speed_factor: f32) -> f32 {
        (self.target_angle - self.angle).abs() * speed_factor
    }
}

/// Both flippers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flippers {
    pub left: Flipper,
    pub right: Flipper,
}

impl Flippers {
    pub fn new(left: &FlipperSpec, right: &FlipperSpec) -> Self {
        Self {
            left: Flipper::new(FlipperSide::Left, left),
            right: Flipper::new(FlipperSide::Right, right),
        }
    }

    pub fn from_layout(layout: &TableLayout) -> Self {
        Self::new(&layout.left_flipper, &layout.right_flipper)
    }

    pub fn get(&self, side: FlipperSide) -> &Flipper {
        match side {
            FlipperSide::Left => &self.left,
            FlipperSide::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, side: FlipperSide) -> &mut Flipper {
        match side {
            FlipperSide::Left => &mut self.left,
            FlipperSide::Right => &mut self.right,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flipper> {
        [&self.left, &self.right].into_iter()
    }

    pub fn update(&mut self, blend: f32) {
        self.left.update(blend);
        self.right.update(blend);
    }
}

/// Current phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// No game running (menu / attract)
    Attract,
    Playing,
    Paused,
    GameOver,
}

/// Session-level deferred work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GameAction {
    /// Serve a fresh ball after the last one drained
    RespawnBall,
    /// Release a ball held by a lock (multiball)
    ReleaseBall { pos: Vec2 },
}

/// Complete session state
#[derive(Debug, Clone)]
pub struct GameState {
    pub seed: u64,
    pub phase: GamePhase,
    pub score: u64,
    /// Best score seen this session
    pub best_score: u64,
    pub balls_left: u8,
    /// Active balls (sorted by id for determinism)
    pub balls: Vec<Ball>,
    pub flippers: Flippers,
    pub obstacles: ObstacleSet,
    pub physics: Physics,
    pub layout: TableLayout,
    /// Deferred respawns and multiball releases
    pub schedule: Scheduler<GameAction>,
    /// Bumped on every new game; stale deferred actions are ignored
    pub epoch: u32,
    pub time_ticks: u64,
    next_id: u32,
}

impl GameState {
    pub fn new(seed: u64) -> Self {
        Self::with_table(seed, TableLayout::default(), Tuning::default())
    }

    pub fn with_table(seed: u64, layout: TableLayout, tuning: Tuning) -> Self {
        let physics = Physics::new(tuning, layout.bounds.clone(), seed);
        let mut state = Self {
            seed,
            phase: GamePhase::Attract,
            score: 0,
            best_score: 0,
            balls_left: 0,
            balls: Vec::new(),
            flippers: Flippers::from_layout(&layout),
            obstacles: ObstacleSet::instantiate(&layout),
            physics,
            layout,
            schedule: Scheduler::new(),
            epoch: 0,
            time_ticks: 0,
            next_id: 1,
        };
        state.spawn_ball();
        state
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Start (or restart) a game
    pub fn start(&mut self) {
        self.epoch += 1;
        self.physics.reset();
        self.obstacles = ObstacleSet::instantiate(&self.layout);
        self.flippers = Flippers::from_layout(&self.layout);
        self.score = 0;
        self.balls_left = self.physics.tuning.game.initial_balls;
        self.balls.clear();
        self.spawn_ball();
        self.phase = GamePhase::Playing;
        log::info!("Game {} started with {} balls", self.epoch, self.balls_left);
    }

    /// Serve a ball into the launcher
    pub fn spawn_ball(&mut self) {
        let id = self.next_entity_id();
        self.balls.push(Ball::new(id, self.layout.launcher));
        self.obstacles.reset_for_new_ball();
    }

    /// Ball still waiting in the launcher, if any
    pub fn ball_in_launcher(&self) -> Option<&Ball> {
        self.balls.iter().find(|b| !b.launched)
    }

    /// Release a ball from a lock into play
    pub fn release_ball(&mut self, pos: Vec2) {
        let id = self.next_entity_id();
        let mut ball = Ball::new(id, pos);
        ball.vel = Vec2::new(0.0, self.physics.tuning.game.release_speed);
        ball.launched = true;
        self.balls.push(ball);
        self.normalize_order();
    }

    /// Ensure balls are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.balls.sort_by_key(|b| b.id);
    }

    /// End the session
    pub fn game_over(&mut self) {
        self.phase = GamePhase::GameOver;
        self.flippers.left.deactivate();
        self.flippers.right.deactivate();
        if self.score > self.best_score {
            self.best_score = self.score;
            log::info!("New best score: {}", self.best_score);
        }
        log::info!("Game over with {} points", self.score);
    }
}
