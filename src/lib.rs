//! Cyber Pinball - a deterministic 2D pinball table
//!
//! Core modules:
//! - `sim`: Deterministic simulation (ball integration, collisions, scoring events)
//! - `tuning`: Data-driven physics and scoring constants
//!
//! Rendering, audio and input devices live outside this crate. They drive the
//! simulation through [`sim::tick`] / [`sim::Physics::advance_frame`] and observe
//! it through an [`sim::EventSink`].

pub mod sim;
pub mod tuning;

pub use tuning::{ConfigError, DeviceProfile, Tuning};

/// Table configuration constants
pub mod consts {
    /// Nominal frame rate (the simulation advances once per animation frame)
    pub const FRAMES_PER_SECOND: f32 = 60.0;
    /// Collision substeps per frame
    pub const SUBSTEPS: u32 = 5;

    /// Table dimensions
    pub const TABLE_WIDTH: f32 = 400.0;
    pub const TABLE_HEIGHT: f32 = 800.0;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 8.0;
    pub const BALL_START_X: f32 = 370.0;
    pub const BALL_START_Y: f32 = 600.0;
    /// Trail capacity (oldest point evicted on overflow)
    pub const TRAIL_LENGTH: usize = 20;

    /// Launcher charge is clamped to this duration
    pub const MAX_CHARGE_MS: f32 = 2500.0;

    /// Balls per game
    pub const INITIAL_BALLS: u8 = 3;
    /// A ball whose centre passes this line is lost
    pub const BALL_LOST_Y: f32 = 820.0;
    pub const TOP_WALL_Y: f32 = 120.0;
}

/// Convert a delay in milliseconds to whole frames (rounded up, at least one)
#[inline]
pub fn ms_to_frames(ms: f32) -> u64 {
    if ms <= 0.0 || !ms.is_finite() {
        return 0;
    }
    (ms * consts::FRAMES_PER_SECOND / 1000.0).ceil().max(1.0) as u64
}

/// Map a launcher charge duration onto the configured power range
///
/// The charge is clamped to [`consts::MAX_CHARGE_MS`]; zero charge yields
/// `min_power`, a full charge yields `max_power`.
pub fn launch_power_for_charge(charge_ms: f32, min_power: f32, max_power: f32) -> f32 {
    let charge = if charge_ms.is_finite() {
        charge_ms.clamp(0.0, consts::MAX_CHARGE_MS)
    } else {
        0.0
    };
    min_power + (charge / consts::MAX_CHARGE_MS) * (max_power - min_power)
}
