//! Table geometry and obstacle runtime state
//!
//! A [`TableLayout`] is the static template a designer authors (and may load
//! from JSON). Each game instantiates an [`ObstacleSet`] from it: an
//! independently owned copy whose runtime fields (hit timers, one-shot flags,
//! lock contents) the engine mutates. Nothing is ever written back to the
//! template.

use glam::Vec2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::geometry::{Rect, Segment};
use crate::ConfigError;
use crate::consts::*;

/// Launcher chute (the narrow lane the ball is served into)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chute {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Chute {
    /// Ball centre is horizontally inside the chute
    #[inline]
    pub fn contains_x(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }
}

/// Outer walls of the playfield
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableBounds {
    pub left_x: f32,
    pub right_x: f32,
    pub top_y: f32,
    /// Playfield height; the reaction zone is measured against it
    pub height: f32,
    /// Radius of the two rounded top corners
    pub corner_radius: f32,
    /// Hard safety boundary sits this far outside the visible walls
    pub hard_margin: f32,
    /// Last-resort clamp triggers this far outside the visible walls
    pub backstop_margin: f32,
    pub chute: Chute,
    /// An unlaunched ball outside the chute is pushed back to at least this x
    pub unlaunched_min_x: f32,
    /// Lanes are bypassed while the ball centre is inside this region
    pub lane_bypass: Rect,
    /// Angled rails funnelling the ball toward the flippers
    pub guardrails: Vec<Segment>,
    /// A point well inside the playfield, used to orient guardrail normals
    pub interior: Vec2,
    /// A ball whose centre passes below this is lost
    pub lost_y: f32,
}

impl Default for TableBounds {
    fn default() -> Self {
        Self {
            left_x: 15.0,
            right_x: 385.0,
            top_y: TOP_WALL_Y,
            height: TABLE_HEIGHT,
            corner_radius: 35.0,
            hard_margin: 10.0,
            backstop_margin: 5.0,
            chute: Chute {
                left: 358.0,
                right: 382.0,
                top: 480.0,
                bottom: 750.0,
            },
            unlaunched_min_x: 350.0,
            lane_bypass: Rect::new(340.0, 480.0, 42.0, TABLE_HEIGHT),
            guardrails: vec![
                Segment::new(Vec2::new(15.0, 650.0), Vec2::new(100.0, 730.0)),
                Segment::new(Vec2::new(385.0, 650.0), Vec2::new(300.0, 730.0)),
            ],
            interior: Vec2::new(TABLE_WIDTH / 2.0, TABLE_HEIGHT / 2.0),
            lost_y: BALL_LOST_Y,
        }
    }
}

impl TableBounds {
    pub fn hard_left(&self) -> f32 {
        self.left_x - self.hard_margin
    }

    pub fn hard_right(&self) -> f32 {
        self.right_x + self.hard_margin
    }

    pub fn hard_top(&self) -> f32 {
        self.top_y - self.hard_margin
    }

    pub fn left_corner_center(&self) -> Vec2 {
        Vec2::new(self.left_x + self.corner_radius, self.top_y + self.corner_radius)
    }

    pub fn right_corner_center(&self) -> Vec2 {
        Vec2::new(self.right_x - self.corner_radius, self.top_y + self.corner_radius)
    }
}

/// Which flipper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlipperSide {
    Left,
    Right,
}

impl FlipperSide {
    pub fn index(self) -> usize {
        match self {
            FlipperSide::Left => 0,
            FlipperSide::Right => 1,
        }
    }

    /// +1 for the left flipper (kicks right), -1 for the right flipper
    pub fn sign(self) -> f32 {
        match self {
            FlipperSide::Left => 1.0,
            FlipperSide::Right => -1.0,
        }
    }
}

/// Static description of a flipper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlipperSpec {
    pub pivot: Vec2,
    pub rest_angle: f32,
    pub active_angle: f32,
    pub length: f32,
}

/// Round pop bumper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bumper {
    pub center: Vec2,
    pub radius: f32,
    /// Exit speed imparted on contact
    pub power: f32,
    #[serde(default)]
    pub color: u32,
    /// Frames left in the flashed state
    #[serde(skip)]
    pub hit_timer: u32,
}

impl Bumper {
    pub fn is_valid(&self) -> bool {
        self.center.is_finite() && self.radius > 0.0 && self.power.is_finite()
    }
}

/// Slingshot: a thick segment that kicks the ball away
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AngledBumper {
    pub segment: Segment,
    pub width: f32,
    pub power: f32,
    #[serde(default)]
    pub color: u32,
    #[serde(skip)]
    pub hit_timer: u32,
}

impl AngledBumper {
    pub fn is_valid(&self) -> bool {
        !self.segment.is_degenerate() && self.width >= 0.0 && self.power.is_finite()
    }
}

/// Standup target (one-shot until its bank resets)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub rect: Rect,
    /// Overrides the default target score
    #[serde(default)]
    pub points: Option<u32>,
    #[serde(default)]
    pub group: u32,
    #[serde(skip)]
    pub hit: bool,
}

/// Drop target (one-shot; drops out of play until its bank resets)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropTarget {
    pub rect: Rect,
    #[serde(default)]
    pub points: Option<u32>,
    #[serde(default)]
    pub group: u32,
    #[serde(skip)]
    pub dropped: bool,
}

/// Skill lane (lit once until all lanes in its group are lit)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillLane {
    pub rect: Rect,
    #[serde(default)]
    pub points: Option<u32>,
    #[serde(default)]
    pub group: u32,
    #[serde(skip)]
    pub lit: bool,
}

/// Free-running spinner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spinner {
    pub center: Vec2,
    /// Radians, free-running
    #[serde(skip)]
    pub angle: f32,
    #[serde(skip)]
    pub spinning: bool,
    #[serde(skip)]
    pub spin_speed: f32,
}

impl Spinner {
    pub fn new(center: Vec2) -> Self {
        Self {
            center,
            angle: 0.0,
            spinning: false,
            spin_speed: 0.0,
        }
    }

    /// Advance the blade and decay its speed (once per frame)
    pub fn decay(&mut self, decay: f32, stop_threshold: f32) {
        if !self.spinning {
            return;
        }
        self.angle += self.spin_speed;
        self.spin_speed *= decay;
        if self.spin_speed.abs() < stop_threshold {
            self.spinning = false;
            self.spin_speed = 0.0;
        }
    }
}

/// Ramp rail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ramp {
    pub segment: Segment,
    pub width: f32,
}

/// Thin divider between lanes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneDivider {
    pub segment: Segment,
}

/// Outlane / inlane guide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lane {
    pub segment: Segment,
    /// Outlanes drain the ball; touching one scores a danger bonus
    #[serde(default)]
    pub danger: bool,
}

/// Orbit built from connected rail segments (the first is the entrance)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loop {
    pub segments: Vec<Segment>,
    pub width: f32,
    /// Entrance touched, completion pending
    #[serde(skip)]
    pub active: bool,
    #[serde(skip)]
    pub completions: u32,
    /// Frames until the entrance can arm again
    #[serde(skip)]
    pub rearm_frames: u64,
}

/// Ball lock (captures balls while active; full lock starts multiball)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallLock {
    pub bounds: Rect,
    pub capacity: usize,
    /// Lit at game start
    #[serde(default)]
    pub active: bool,
    #[serde(skip)]
    pub locked: Vec<Vec2>,
}

impl BallLock {
    pub fn is_full(&self) -> bool {
        self.locked.len() >= self.capacity
    }
}

/// Captive ball confined to a short straight lane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptiveBall {
    pub rest: Vec2,
    /// Unit direction the captive ball travels when struck
    pub axis: Vec2,
    /// Maximum displacement from rest along `axis`
    pub travel: f32,
    pub radius: f32,
    #[serde(skip)]
    pub offset: f32,
    #[serde(skip)]
    pub hits: u32,
}

impl CaptiveBall {
    pub fn position(&self) -> Vec2 {
        self.rest + self.axis * self.offset
    }

    pub fn is_valid(&self) -> bool {
        self.rest.is_finite()
            && self.axis.is_finite()
            && self.axis.length_squared() > 0.5
            && self.radius > 0.0
            && self.travel >= 0.0
    }

    /// Spring back toward rest by `step` (once per frame)
    pub fn spring_return(&mut self, step: f32) {
        if self.offset > 0.0 {
            self.offset = (self.offset - step).max(0.0);
        }
    }
}

/// Magnet pulling the ball toward its centre
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Magnet {
    pub center: Vec2,
    /// Influence radius
    pub radius: f32,
    /// Velocity change per frame at the centre
    pub strength: f32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Kind of one-shot bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKind {
    Targets,
    DropTargets,
    SkillLanes,
}

/// Static table template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableLayout {
    pub bounds: TableBounds,
    /// Ball rest position in the launcher
    pub launcher: Vec2,
    pub left_flipper: FlipperSpec,
    pub right_flipper: FlipperSpec,
    #[serde(default)]
    pub bumpers: Vec<Bumper>,
    #[serde(default)]
    pub angled_bumpers: Vec<AngledBumper>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub drop_targets: Vec<DropTarget>,
    #[serde(default)]
    pub skill_lanes: Vec<SkillLane>,
    #[serde(default)]
    pub spinners: Vec<Spinner>,
    #[serde(default)]
    pub ramps: Vec<Ramp>,
    #[serde(default)]
    pub lane_dividers: Vec<LaneDivider>,
    #[serde(default)]
    pub lanes: Vec<Lane>,
    #[serde(default)]
    pub loops: Vec<Loop>,
    #[serde(default)]
    pub locks: Vec<BallLock>,
    #[serde(default)]
    pub captive_balls: Vec<CaptiveBall>,
    #[serde(default)]
    pub magnets: Vec<Magnet>,
}

impl Default for TableLayout {
    fn default() -> Self {
        let seg = |x1: f32, y1: f32, x2: f32, y2: f32| Segment::new(Vec2::new(x1, y1), Vec2::new(x2, y2));
        let bumper = |x: f32, y: f32, radius: f32, power: f32, color: u32| Bumper {
            center: Vec2::new(x, y),
            radius,
            power,
            color,
            hit_timer: 0,
        };
        let target = |x: f32, y: f32| Target {
            rect: Rect::new(x, y, 20.0, 50.0),
            points: Some(500),
            group: 0,
            hit: false,
        };
        let drop_target = |x: f32| DropTarget {
            rect: Rect::new(x, 420.0, 20.0, 12.0),
            points: None,
            group: 0,
            dropped: false,
        };
        let skill_lane = |x: f32| SkillLane {
            rect: Rect::new(x, 128.0, 16.0, 20.0),
            points: None,
            group: 0,
            lit: false,
        };

        Self {
            bounds: TableBounds::default(),
            launcher: Vec2::new(BALL_START_X, BALL_START_Y),
            left_flipper: FlipperSpec {
                pivot: Vec2::new(100.0, 680.0),
                rest_angle: -0.2,
                active_angle: -0.8,
                length: 70.0,
            },
            right_flipper: FlipperSpec {
                pivot: Vec2::new(300.0, 680.0),
                rest_angle: std::f32::consts::PI + 0.2,
                active_angle: std::f32::consts::PI + 0.8,
                length: 70.0,
            },
            bumpers: vec![
                bumper(150.0, 250.0, 30.0, 10.0, 0xff6600),
                bumper(250.0, 230.0, 30.0, 10.0, 0xff6600),
                bumper(200.0, 170.0, 30.0, 10.0, 0xff6600),
                bumper(100.0, 350.0, 25.0, 8.0, 0xff9900),
                bumper(300.0, 370.0, 25.0, 8.0, 0xff9900),
            ],
            angled_bumpers: vec![
                AngledBumper {
                    segment: seg(55.0, 610.0, 75.0, 635.0),
                    width: 8.0,
                    power: 6.0,
                    color: 0xff00ff,
                    hit_timer: 0,
                },
                AngledBumper {
                    segment: seg(345.0, 610.0, 325.0, 635.0),
                    width: 8.0,
                    power: 6.0,
                    color: 0xff00ff,
                    hit_timer: 0,
                },
            ],
            targets: vec![
                target(50.0, 450.0),
                target(90.0, 430.0),
                target(290.0, 430.0),
                target(330.0, 450.0),
            ],
            drop_targets: vec![drop_target(160.0), drop_target(190.0), drop_target(220.0)],
            skill_lanes: vec![skill_lane(95.0), skill_lane(135.0)],
            spinners: vec![Spinner::new(Vec2::new(200.0, 320.0))],
            ramps: vec![
                Ramp {
                    segment: seg(50.0, 550.0, 150.0, 480.0),
                    width: 12.0,
                },
                Ramp {
                    segment: seg(350.0, 550.0, 250.0, 480.0),
                    width: 12.0,
                },
            ],
            lane_dividers: vec![
                LaneDivider {
                    segment: seg(125.0, 122.0, 125.0, 150.0),
                },
                LaneDivider {
                    segment: seg(165.0, 122.0, 165.0, 150.0),
                },
            ],
            lanes: vec![
                Lane {
                    segment: seg(40.0, 590.0, 40.0, 640.0),
                    danger: true,
                },
                Lane {
                    segment: seg(330.0, 590.0, 330.0, 640.0),
                    danger: true,
                },
            ],
            loops: vec![Loop {
                segments: vec![seg(45.0, 420.0, 40.0, 300.0), seg(40.0, 300.0, 55.0, 230.0)],
                width: 4.0,
                active: false,
                completions: 0,
                rearm_frames: 0,
            }],
            locks: vec![BallLock {
                bounds: Rect::new(290.0, 124.0, 40.0, 24.0),
                capacity: 2,
                active: false,
                locked: Vec::new(),
            }],
            captive_balls: vec![CaptiveBall {
                rest: Vec2::new(330.0, 300.0),
                axis: Vec2::NEG_Y,
                travel: 30.0,
                radius: BALL_RADIUS,
                offset: 0.0,
                hits: 0,
            }],
            magnets: vec![Magnet {
                center: Vec2::new(200.0, 530.0),
                radius: 50.0,
                strength: 0.15,
                active: true,
            }],
        }
    }
}

/// Decode every element of `root[key]` independently, skipping malformed ones
fn decode_list<T: DeserializeOwned>(root: &Value, key: &str) -> Vec<T> {
    let Some(items) = root.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value::<T>(item.clone()) {
            Ok(obstacle) => Some(obstacle),
            Err(e) => {
                log::warn!("Skipping malformed {} entry #{}: {}", key, i, e);
                None
            }
        })
        .collect()
}

/// Decode a required top-level field
fn decode_field<T: DeserializeOwned>(root: &Value, key: &'static str) -> Result<T, ConfigError> {
    let value = root.get(key).cloned().ok_or_else(|| ConfigError::Invalid {
        field: key,
        reason: "missing".to_string(),
    })?;
    Ok(serde_json::from_value(value)?)
}

impl TableLayout {
    /// Load a table from JSON
    ///
    /// Walls, launcher and flippers are required. Obstacle lists are decoded
    /// entry by entry: a malformed obstacle is logged and left out instead of
    /// rejecting the table.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(json)?;
        let layout = Self {
            bounds: decode_field(&root, "bounds")?,
            launcher: decode_field(&root, "launcher")?,
            left_flipper: decode_field(&root, "left_flipper")?,
            right_flipper: decode_field(&root, "right_flipper")?,
            bumpers: decode_list(&root, "bumpers"),
            angled_bumpers: decode_list(&root, "angled_bumpers"),
            targets: decode_list(&root, "targets"),
            drop_targets: decode_list(&root, "drop_targets"),
            skill_lanes: decode_list(&root, "skill_lanes"),
            spinners: decode_list(&root, "spinners"),
            ramps: decode_list(&root, "ramps"),
            lane_dividers: decode_list(&root, "lane_dividers"),
            lanes: decode_list(&root, "lanes"),
            loops: decode_list(&root, "loops"),
            locks: decode_list(&root, "locks"),
            captive_balls: decode_list(&root, "captive_balls"),
            magnets: decode_list(&root, "magnets"),
        };
        log::info!(
            "Loaded table: {} bumpers, {} targets, {} drop targets, {} lanes",
            layout.bumpers.len(),
            layout.targets.len(),
            layout.drop_targets.len(),
            layout.lanes.len()
        );
        Ok(layout)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Per-game obstacle instances
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObstacleSet {
    pub bumpers: Vec<Bumper>,
    pub angled_bumpers: Vec<AngledBumper>,
    pub targets: Vec<Target>,
    pub drop_targets: Vec<DropTarget>,
    pub skill_lanes: Vec<SkillLane>,
    pub spinners: Vec<Spinner>,
    pub ramps: Vec<Ramp>,
    pub lane_dividers: Vec<LaneDivider>,
    pub lanes: Vec<Lane>,
    pub loops: Vec<Loop>,
    pub locks: Vec<BallLock>,
    pub captive_balls: Vec<CaptiveBall>,
    pub magnets: Vec<Magnet>,
}

impl ObstacleSet {
    /// Build a fresh, independently owned obstacle set from a template
    pub fn instantiate(layout: &TableLayout) -> Self {
        let mut set = Self {
            bumpers: layout.bumpers.clone(),
            angled_bumpers: layout.angled_bumpers.clone(),
            targets: layout.targets.clone(),
            drop_targets: layout.drop_targets.clone(),
            skill_lanes: layout.skill_lanes.clone(),
            spinners: layout.spinners.clone(),
            ramps: layout.ramps.clone(),
            lane_dividers: layout.lane_dividers.clone(),
            lanes: layout.lanes.clone(),
            loops: layout.loops.clone(),
            locks: layout.locks.clone(),
            captive_balls: layout.captive_balls.clone(),
            magnets: layout.magnets.clone(),
        };
        set.reset_runtime();
        set
    }

    /// Clear all runtime state (new game)
    ///
    /// Lock activation is part of the template and is kept.
    pub fn reset_runtime(&mut self) {
        self.reset_for_new_ball();
        self.drop_targets.iter_mut().for_each(|t| t.dropped = false);
        self.skill_lanes.iter_mut().for_each(|l| l.lit = false);
        for spinner in &mut self.spinners {
            spinner.angle = 0.0;
            spinner.spinning = false;
            spinner.spin_speed = 0.0;
        }
        for lp in &mut self.loops {
            lp.active = false;
            lp.completions = 0;
            lp.rearm_frames = 0;
        }
        self.locks.iter_mut().for_each(|l| l.locked.clear());
        for captive in &mut self.captive_balls {
            captive.offset = 0.0;
            captive.hits = 0;
        }
    }

    /// Clear per-ball state when a new ball is served
    pub fn reset_for_new_ball(&mut self) {
        self.targets.iter_mut().for_each(|t| t.hit = false);
        self.bumpers.iter_mut().for_each(|b| b.hit_timer = 0);
        self.angled_bumpers.iter_mut().for_each(|b| b.hit_timer = 0);
    }

    /// One-shot flags of every member of a group
    fn group_flags(&self, kind: GroupKind, group: u32) -> Vec<bool> {
        match kind {
            GroupKind::Targets => self
                .targets
                .iter()
                .filter(|t| t.group == group)
                .map(|t| t.hit)
                .collect(),
            GroupKind::DropTargets => self
                .drop_targets
                .iter()
                .filter(|t| t.group == group)
                .map(|t| t.dropped)
                .collect(),
            GroupKind::SkillLanes => self
                .skill_lanes
                .iter()
                .filter(|l| l.group == group)
                .map(|l| l.lit)
                .collect(),
        }
    }

    /// Every member of the group has its flag set (empty groups never complete)
    pub fn group_complete(&self, kind: GroupKind, group: u32) -> bool {
        let flags = self.group_flags(kind, group);
        !flags.is_empty() && flags.iter().all(|&f| f)
    }

    /// Distinct group ids of a kind, in first-seen order
    pub fn group_ids(&self, kind: GroupKind) -> Vec<u32> {
        let ids: Vec<u32> = match kind {
            GroupKind::Targets => self.targets.iter().map(|t| t.group).collect(),
            GroupKind::DropTargets => self.drop_targets.iter().map(|t| t.group).collect(),
            GroupKind::SkillLanes => self.skill_lanes.iter().map(|l| l.group).collect(),
        };
        let mut unique = Vec::new();
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        unique
    }

    /// Groups whose members are all set
    pub fn completed_groups(&self) -> Vec<(GroupKind, u32)> {
        [GroupKind::Targets, GroupKind::DropTargets, GroupKind::SkillLanes]
            .into_iter()
            .flat_map(|kind| {
                self.group_ids(kind)
                    .into_iter()
                    .filter(move |&g| self.group_complete(kind, g))
                    .map(move |g| (kind, g))
            })
            .collect()
    }

    /// Clear every flag in a group
    pub fn clear_group(&mut self, kind: GroupKind, group: u32) {
        match kind {
            GroupKind::Targets => self
                .targets
                .iter_mut()
                .filter(|t| t.group == group)
                .for_each(|t| t.hit = false),
            GroupKind::DropTargets => self
                .drop_targets
                .iter_mut()
                .filter(|t| t.group == group)
                .for_each(|t| t.dropped = false),
            GroupKind::SkillLanes => self
                .skill_lanes
                .iter_mut()
                .filter(|l| l.group == group)
                .for_each(|l| l.lit = false),
        }
    }
}
