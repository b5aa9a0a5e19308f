//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only (one frame per call)
//! - Seeded RNG only
//! - Stable iteration order (by entity ID and obstacle index)
//! - No rendering, audio or platform dependencies

pub mod collision;
pub mod engine;
pub mod events;
pub mod geometry;
pub mod schedule;
pub mod state;
pub mod table;
pub mod tick;
pub mod walls;

pub use collision::{FlipperCooldown, Signal};
pub use engine::{BallOutcome, FrameReport, Physics};
pub use events::{CollisionEvent, CollisionKind, EventLog, EventSink, ObstacleRef, ScoreTally};
pub use geometry::{Contact, Rect, Segment, reflect};
pub use schedule::Scheduler;
pub use state::{Ball, Flipper, Flippers, GameAction, GamePhase, GameState};
pub use table::{
    AngledBumper, BallLock, Bumper, CaptiveBall, Chute, DropTarget, FlipperSide, FlipperSpec,
    GroupKind, Lane, LaneDivider, Loop, Magnet, ObstacleSet, Ramp, SkillLane, Spinner,
    TableBounds, TableLayout, Target,
};
pub use tick::{TickInput, tick};
pub use walls::{WallOutcome, check_walls};
