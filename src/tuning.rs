//! Data-driven physics and scoring constants
//!
//! Every feel-related number the engine uses lives here, grouped by subsystem,
//! so a table designer can retune without touching collision code. Values are
//! loaded from JSON (missing fields fall back to defaults) and validated once.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::SUBSTEPS;

/// Device class detected by the host at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeviceProfile {
    #[default]
    Desktop,
    Mobile,
}

impl DeviceProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceProfile::Desktop => "Desktop",
            DeviceProfile::Mobile => "Mobile",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "desktop" | "pc" => Some(DeviceProfile::Desktop),
            "mobile" | "touch" => Some(DeviceProfile::Mobile),
            _ => None,
        }
    }
}

/// Error raised while loading tuning or table data
#[derive(Debug)]
pub enum ConfigError {
    /// The document is not valid JSON for the expected shape
    Json(serde_json::Error),
    /// A value parsed but is outside its allowed range
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(e) => write!(f, "malformed config: {e}"),
            ConfigError::Invalid { field, reason } => write!(f, "invalid `{field}`: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Json(e) => Some(e),
            ConfigError::Invalid { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

/// Extra damping near the flippers (soft speed ceiling for touch play)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReactionZone {
    /// Fraction of table height where the zone starts (0-1)
    pub start: f32,
    /// Maximum extra slow-down at the bottom of the table (0-1)
    pub max_slowdown: f32,
}

/// Ball integration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    /// Added to vy every frame
    pub gravity: f32,
    /// Multiplied into both velocity components every frame
    pub damping: f32,
    /// Speed cap (magnitude, direction preserved)
    pub max_velocity: f32,
    pub reaction_zone: Option<ReactionZone>,
    /// Collision substeps per frame (tunneling guard)
    pub substeps: u32,
    pub launch_min: f32,
    pub launch_max: f32,
    /// Launch vx is drawn uniformly from [-spread, spread]
    pub launch_spread: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: 0.4,
            damping: 0.985,
            max_velocity: 25.0,
            reaction_zone: None,
            substeps: SUBSTEPS,
            launch_min: 25.0,
            launch_max: 60.0,
            launch_spread: 1.0,
        }
    }
}

/// Boundary, corner, guardrail and chute response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WallTuning {
    pub hard_restitution: f32,
    pub corner_restitution: f32,
    pub wall_restitution: f32,
    pub guardrail_restitution: f32,
    pub chute_restitution: f32,
    /// Push away from a guardrail after a bounce so the ball never rests on it
    pub anti_stick: f32,
    /// Velocity damping applied by the last-resort clamp
    pub backstop_damping: f32,
    /// Leftward nudge applied while a launched ball leaves the chute
    pub chute_exit_curve: f32,
    /// Half-height of the band around the chute top where the nudge applies
    pub chute_exit_band: f32,
    /// Downward kick after a right corner bounce if vy is below `corner_drop_threshold`
    pub corner_drop_kick: f32,
    pub corner_drop_threshold: f32,
}

impl Default for WallTuning {
    fn default() -> Self {
        Self {
            hard_restitution: 0.95,
            corner_restitution: 0.95,
            wall_restitution: 0.9,
            guardrail_restitution: 0.9,
            chute_restitution: 0.9,
            anti_stick: 0.5,
            backstop_damping: 0.85,
            chute_exit_curve: 0.2,
            chute_exit_band: 50.0,
            corner_drop_kick: 1.0,
            corner_drop_threshold: 2.0,
        }
    }
}

/// Flipper motion and contact response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipperTuning {
    /// Fraction of the remaining angle covered per frame
    pub blend: f32,
    /// Angular speed = |target - angle| * speed_factor
    pub speed_factor: f32,
    pub base_power: f32,
    pub power_scale: f32,
    pub base_width: f32,
    pub active_width_bonus: f32,
    pub speed_width_factor: f32,
    pub max_speed_width: f32,
    /// Gap left between ball and flipper surface after a hit
    pub clearance: f32,
    pub cooldown_ms: f32,
    pub lateral_kick: f32,
    pub upward_boost: f32,
    pub min_angle_factor: f32,
}

impl Default for FlipperTuning {
    fn default() -> Self {
        Self {
            blend: 0.3,
            speed_factor: 20.0,
            base_power: 8.0,
            power_scale: 2.0,
            base_width: 8.0,
            active_width_bonus: 3.0,
            speed_width_factor: 0.5,
            max_speed_width: 5.0,
            clearance: 2.0,
            cooldown_ms: 100.0,
            lateral_kick: 3.0,
            upward_boost: 6.0,
            min_angle_factor: 0.5,
        }
    }
}

/// Pop bumpers and slingshots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BumperTuning {
    /// Frames a bumper stays flashed after a hit
    pub flash_frames: u32,
}

impl Default for BumperTuning {
    fn default() -> Self {
        Self { flash_frames: 10 }
    }
}

/// Spinner interaction and decay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinnerTuning {
    pub radius: f32,
    pub initial_speed: f32,
    /// Per-frame multiplier on angular speed
    pub decay: f32,
    pub stop_threshold: f32,
    pub boost: f32,
    /// Reflected velocity is rotated by a random angle in [-jitter/2, jitter/2]
    pub jitter: f32,
}

impl Default for SpinnerTuning {
    fn default() -> Self {
        Self {
            radius: 20.0,
            initial_speed: 0.3,
            decay: 0.95,
            stop_threshold: 0.05,
            boost: 1.15,
            jitter: 0.3,
        }
    }
}

/// Standup targets, drop targets and skill lanes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetTuning {
    pub target_restitution: f32,
    pub drop_restitution: f32,
    pub skill_lane_restitution: f32,
    /// Delay between a group completing and its members reappearing
    pub group_reset_ms: f32,
}

impl Default for TargetTuning {
    fn default() -> Self {
        Self {
            target_restitution: 0.9,
            drop_restitution: 0.8,
            skill_lane_restitution: 0.85,
            group_reset_ms: 1000.0,
        }
    }
}

/// Ramps, lanes, dividers and loops
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneTuning {
    /// Ramps slightly amplify speed
    pub ramp_boost: f32,
    pub divider_width: f32,
    pub divider_restitution: f32,
    pub lane_width: f32,
    pub lane_restitution: f32,
    pub loop_restitution: f32,
    pub loop_rearm_ms: f32,
}

impl Default for LaneTuning {
    fn default() -> Self {
        Self {
            ramp_boost: 1.1,
            divider_width: 2.0,
            divider_restitution: 0.9,
            lane_width: 4.0,
            lane_restitution: 0.85,
            loop_restitution: 0.95,
            loop_rearm_ms: 500.0,
        }
    }
}

/// Captive ball lane
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptiveTuning {
    pub restitution: f32,
    /// Fraction of the incoming normal speed transferred into the captive ball
    pub nudge_factor: f32,
    /// Distance the captive ball springs back toward rest per frame
    pub return_step: f32,
    pub hits_to_light_lock: u32,
}

impl Default for CaptiveTuning {
    fn default() -> Self {
        Self {
            restitution: 0.8,
            nudge_factor: 1.5,
            return_step: 0.5,
            hits_to_light_lock: 3,
        }
    }
}

/// Point values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringTuning {
    pub flipper_hit: u32,
    pub bumper_hit: u32,
    pub angled_bumper_hit: u32,
    pub target_hit: u32,
    pub drop_target_hit: u32,
    pub skill_lane_hit: u32,
    pub spinner_hit: u32,
    pub ramp_hit: u32,
    pub outlane_hit: u32,
    pub loop_enter: u32,
    pub loop_complete: u32,
    pub ball_locked: u32,
    pub captive_hit: u32,
    pub target_bank_bonus: u32,
    pub drop_bank_bonus: u32,
    pub skill_lane_bonus: u32,
}

impl Default for ScoringTuning {
    fn default() -> Self {
        Self {
            flipper_hit: 25,
            bumper_hit: 100,
            angled_bumper_hit: 150,
            target_hit: 500,
            drop_target_hit: 250,
            skill_lane_hit: 200,
            spinner_hit: 50,
            ramp_hit: 75,
            outlane_hit: 50,
            loop_enter: 100,
            loop_complete: 1000,
            ball_locked: 500,
            captive_hit: 100,
            target_bank_bonus: 1500,
            drop_bank_bonus: 2500,
            skill_lane_bonus: 1000,
        }
    }
}

/// Session flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameTuning {
    pub initial_balls: u8,
    pub ball_respawn_ms: f32,
    /// Gap between successive releases when multiball starts
    pub multiball_stagger_ms: f32,
    /// Downward speed of a ball released from a lock
    pub release_speed: f32,
}

impl Default for GameTuning {
    fn default() -> Self {
        Self {
            initial_balls: crate::consts::INITIAL_BALLS,
            ball_respawn_ms: 1000.0,
            multiball_stagger_ms: 500.0,
            release_speed: 4.0,
        }
    }
}

/// Complete tuning set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub physics: PhysicsTuning,
    pub walls: WallTuning,
    pub flipper: FlipperTuning,
    pub bumper: BumperTuning,
    pub spinner: SpinnerTuning,
    pub targets: TargetTuning,
    pub lanes: LaneTuning,
    pub captive: CaptiveTuning,
    pub scoring: ScoringTuning,
    pub game: GameTuning,
}

impl Tuning {
    /// Default tuning scaled for a device class
    pub fn for_device(profile: DeviceProfile) -> Self {
        let mut tuning = Self::default();
        tuning.apply_device(profile);
        tuning
    }

    /// Scale physics constants for a device class (call once, at startup)
    pub fn apply_device(&mut self, profile: DeviceProfile) {
        if profile == DeviceProfile::Mobile {
            // Slower, floatier ball for touch play
            self.physics.gravity = 0.35;
            self.physics.damping = 0.988;
            self.physics.max_velocity = 22.0;
            self.physics.launch_min = 25.0;
            self.physics.launch_max = 55.0;
            self.physics.reaction_zone = Some(ReactionZone {
                start: 0.7,
                max_slowdown: 0.05,
            });
        }
        log::info!("Physics tuned for {} profile", profile.as_str());
    }

    /// Parse and validate tuning from JSON (missing fields use defaults)
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let tuning: Self = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every value keeps the simulation stable
    pub fn validate(&self) -> Result<(), ConfigError> {
        let frictional = [
            ("walls.hard_restitution", self.walls.hard_restitution),
            ("walls.corner_restitution", self.walls.corner_restitution),
            ("walls.wall_restitution", self.walls.wall_restitution),
            ("walls.guardrail_restitution", self.walls.guardrail_restitution),
            ("walls.chute_restitution", self.walls.chute_restitution),
            ("targets.target_restitution", self.targets.target_restitution),
            ("targets.drop_restitution", self.targets.drop_restitution),
            ("targets.skill_lane_restitution", self.targets.skill_lane_restitution),
            ("lanes.divider_restitution", self.lanes.divider_restitution),
            ("lanes.lane_restitution", self.lanes.lane_restitution),
            ("lanes.loop_restitution", self.lanes.loop_restitution),
            ("captive.restitution", self.captive.restitution),
        ];
        for (field, value) in frictional {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("restitution {value} must lie strictly between 0 and 1"),
                });
            }
        }

        let p = &self.physics;
        if p.substeps == 0 {
            return Err(ConfigError::Invalid {
                field: "physics.substeps",
                reason: "at least one substep is required".to_string(),
            });
        }
        if p.max_velocity.is_nan() || p.max_velocity <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "physics.max_velocity",
                reason: format!("{} is not positive", p.max_velocity),
            });
        }
        if !(p.launch_min > 0.0 && p.launch_min <= p.launch_max) {
            return Err(ConfigError::Invalid {
                field: "physics.launch_min",
                reason: format!("launch range [{}, {}] is empty", p.launch_min, p.launch_max),
            });
        }
        if !(p.damping > 0.0 && p.damping <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "physics.damping",
                reason: format!("{} must lie in (0, 1]", p.damping),
            });
        }
        if !(self.flipper.blend > 0.0 && self.flipper.blend <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "flipper.blend",
                reason: format!("{} must lie in (0, 1]", self.flipper.blend),
            });
        }
        if !(self.spinner.decay > 0.0 && self.spinner.decay < 1.0) {
            return Err(ConfigError::Invalid {
                field: "spinner.decay",
                reason: format!("{} must lie in (0, 1)", self.spinner.decay),
            });
        }
        Ok(())
    }
}
