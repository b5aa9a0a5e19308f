//! Collision and scoring events
//!
//! The engine reports what happened through an [`EventSink`]. Sinks only read
//! the event payloads; they never get a handle to engine or obstacle state, so
//! data flows one way (engine → score/audio/particles).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::table::FlipperSide;

/// What the ball touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionKind {
    Bumper,
    AngledBumper,
    Target,
    DropTarget,
    SkillLane,
    Spinner,
    Ramp,
    Flipper,
    Wall,
    Lane,
    LoopEnter,
    BallLocked,
    CaptiveBallHit,
}

impl CollisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollisionKind::Bumper => "bumper",
            CollisionKind::AngledBumper => "angledBumper",
            CollisionKind::Target => "target",
            CollisionKind::DropTarget => "dropTarget",
            CollisionKind::SkillLane => "skillLane",
            CollisionKind::Spinner => "spinner",
            CollisionKind::Ramp => "ramp",
            CollisionKind::Flipper => "flipper",
            CollisionKind::Wall => "wall",
            CollisionKind::Lane => "lane",
            CollisionKind::LoopEnter => "loopEnter",
            CollisionKind::BallLocked => "ballLocked",
            CollisionKind::CaptiveBallHit => "captiveBallHit",
        }
    }
}

/// The obstacle instance involved, as an index into the [`super::ObstacleSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObstacleRef {
    Wall,
    Flipper(FlipperSide),
    Bumper(usize),
    AngledBumper(usize),
    Target(usize),
    DropTarget(usize),
    SkillLane(usize),
    Spinner(usize),
    Ramp(usize),
    Lane(usize),
    Loop(usize),
    Lock(usize),
    CaptiveBall(usize),
}

/// A single contact worth reporting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub kind: CollisionKind,
    /// Where the contact happened (contact point or ball centre)
    pub pos: Vec2,
    /// Direction the ball was pushed, for spark direction
    pub normal: Vec2,
    pub obstacle: ObstacleRef,
    /// Ball that caused it
    pub ball_id: u32,
}

/// Receiver of engine output
///
/// Called synchronously during collision resolution, once per triggering
/// contact (after one-shot and cooldown debouncing).
pub trait EventSink {
    fn collision(&mut self, event: &CollisionEvent);
    fn score_awarded(&mut self, points: u32);
}

/// Sink that ignores everything
impl EventSink for () {
    fn collision(&mut self, _event: &CollisionEvent) {}
    fn score_awarded(&mut self, _points: u32) {}
}

/// Sink that records everything (debugging, tests, replay)
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub collisions: Vec<CollisionEvent>,
    pub awards: Vec<u32>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_score(&self) -> u64 {
        self.awards.iter().map(|&p| p as u64).sum()
    }

    pub fn count(&self, kind: CollisionKind) -> usize {
        self.collisions.iter().filter(|e| e.kind == kind).count()
    }

    pub fn clear(&mut self) {
        self.collisions.clear();
        self.awards.clear();
    }
}

impl EventSink for EventLog {
    fn collision(&mut self, event: &CollisionEvent) {
        self.collisions.push(*event);
    }

    fn score_awarded(&mut self, points: u32) {
        self.awards.push(points);
    }
}

/// Adds awarded points to a score while forwarding everything to an inner sink
pub struct ScoreTally<'a, S: EventSink + ?Sized> {
    pub score: &'a mut u64,
    pub inner: &'a mut S,
}

impl<'a, S: EventSink + ?Sized> ScoreTally<'a, S> {
    pub fn new(score: &'a mut u64, inner: &'a mut S) -> Self {
        Self { score, inner }
    }
}

impl<S: EventSink + ?Sized> EventSink for ScoreTally<'_, S> {
    fn collision(&mut self, event: &CollisionEvent) {
        log::trace!("{} at ({:.0}, {:.0})", event.kind.as_str(), event.pos.x, event.pos.y);
        self.inner.collision(event);
    }

    fn score_awarded(&mut self, points: u32) {
        *self.score += points as u64;
        self.inner.score_awarded(points);
    }
}
