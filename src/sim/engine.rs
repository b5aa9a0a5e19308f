//! Per-frame physics driver
//!
//! [`Physics::advance_frame`] integrates one ball, sweeps it through the table
//! in substeps and then runs the end-of-frame bookkeeping: cosmetic decay,
//! loop completion, cross-obstacle signals and deferred group resets.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::collision::{self, FlipperCooldown, Signal};
use super::events::EventSink;
use super::schedule::Scheduler;
use super::state::{Ball, Flippers};
use super::table::{GroupKind, ObstacleSet, TableBounds};
use super::walls::check_walls;
use crate::{Tuning, launch_power_for_charge, ms_to_frames};

/// What happened to a ball this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallOutcome {
    InPlay,
    /// Centre passed the drain line
    Lost,
    /// Captured by a lock; the caller takes the ball out of play
    Locked { lock: usize },
}

/// End-of-frame results the host acts on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Balls released by a full lock, to be served with staggered delays
    pub released: Vec<Vec2>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GroupReset {
    kind: GroupKind,
    group: u32,
}

/// The physics engine
///
/// Owns the tuning, the table boundary and everything that must persist
/// between frames but is not obstacle state: the frame counter, flipper
/// cooldowns, pending signals, deferred group resets and the RNG.
#[derive(Debug, Clone)]
pub struct Physics {
    pub tuning: Tuning,
    pub bounds: TableBounds,
    rng: Pcg32,
    frame: u64,
    epoch: u32,
    cooldown: FlipperCooldown,
    signals: Vec<Signal>,
    resets: Scheduler<GroupReset>,
}

impl Physics {
    /// Invalid tuning is kept but logged; every per-frame operation tolerates it
    pub fn new(tuning: Tuning, bounds: TableBounds, seed: u64) -> Self {
        if let Err(e) = tuning.validate() {
            log::warn!("Running with out-of-range tuning: {e}");
        }
        Self {
            tuning,
            bounds,
            rng: Pcg32::seed_from_u64(seed),
            frame: 0,
            epoch: 0,
            cooldown: FlipperCooldown::default(),
            signals: Vec::new(),
            resets: Scheduler::new(),
        }
    }

    /// Frames simulated so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Forget per-game state; resets queued before this point become no-ops
    pub fn reset(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.cooldown.clear();
        self.signals.clear();
    }

    /// Fire a ball from the launcher with the given power
    pub fn launch(&mut self, ball: &mut Ball, power: f32) -> bool {
        ball.launch(power, &self.tuning.physics, &mut self.rng)
    }

    /// Fire a ball with the power a charge of `charge_ms` gives
    pub fn launch_with_charge(&mut self, ball: &mut Ball, charge_ms: f32) -> bool {
        let p = &self.tuning.physics;
        let power = launch_power_for_charge(charge_ms, p.launch_min, p.launch_max);
        self.launch(ball, power)
    }

    /// One full frame for a single ball: integrate, collide, then bookkeeping
    pub fn advance_frame<S: EventSink + ?Sized>(
        &mut self,
        ball: &mut Ball,
        flippers: &Flippers,
        obstacles: &mut ObstacleSet,
        sink: &mut S,
    ) -> (BallOutcome, FrameReport) {
        let outcome = self.step_ball(ball, flippers, obstacles, sink);
        let report = self.finish_frame(obstacles, sink);
        (outcome, report)
    }

    /// Integrate one ball and sweep it through the table
    ///
    /// With several balls in play, call this once per ball and then
    /// [`Physics::finish_frame`] once.
    pub fn step_ball<S: EventSink + ?Sized>(
        &mut self,
        ball: &mut Ball,
        flippers: &Flippers,
        obstacles: &mut ObstacleSet,
        sink: &mut S,
    ) -> BallOutcome {
        if !ball.launched {
            check_walls(ball, &self.bounds, &self.tuning.walls, sink);
            return BallOutcome::InPlay;
        }

        ball.update(&self.tuning.physics, self.bounds.height);
        for magnet in &obstacles.magnets {
            collision::apply_magnet(ball, magnet);
        }

        let substeps = self.tuning.physics.substeps.max(1);
        for _ in 0..substeps {
            ball.pos += ball.vel / substeps as f32;
            if let Some(lock) = self.collide(ball, flippers, obstacles, sink) {
                return BallOutcome::Locked { lock };
            }
        }

        ball.record_trail();

        if ball.pos.y > self.bounds.lost_y {
            log::debug!("Ball {} drained at x={:.0}", ball.id, ball.pos.x);
            return BallOutcome::Lost;
        }
        BallOutcome::InPlay
    }

    /// Every collision test for one substep; returns the capturing lock, if any
    fn collide<S: EventSink + ?Sized>(
        &mut self,
        ball: &mut Ball,
        flippers: &Flippers,
        obstacles: &mut ObstacleSet,
        sink: &mut S,
    ) -> Option<usize> {
        let tuning = &self.tuning;

        let wall = check_walls(ball, &self.bounds, &tuning.walls, sink);
        if wall.skips_obstacles() {
            return None;
        }

        for flipper in flippers.iter() {
            collision::check_flipper(ball, flipper, tuning, &mut self.cooldown, self.frame, sink);
        }
        for (i, bumper) in obstacles.bumpers.iter_mut().enumerate() {
            collision::check_bumper(ball, bumper, i, tuning, sink);
        }
        for (i, bumper) in obstacles.angled_bumpers.iter_mut().enumerate() {
            collision::check_angled_bumper(ball, bumper, i, tuning, sink);
        }
        for (i, target) in obstacles.targets.iter_mut().enumerate() {
            collision::check_target(ball, target, i, tuning, sink);
        }
        for (i, target) in obstacles.drop_targets.iter_mut().enumerate() {
            collision::check_drop_target(ball, target, i, tuning, sink);
        }
        for (i, lane) in obstacles.skill_lanes.iter_mut().enumerate() {
            collision::check_skill_lane(ball, lane, i, tuning, sink);
        }
        for (i, spinner) in obstacles.spinners.iter_mut().enumerate() {
            collision::check_spinner(ball, spinner, i, tuning, &mut self.rng, sink);
        }
        for (i, ramp) in obstacles.ramps.iter().enumerate() {
            collision::check_ramp(ball, ramp, i, tuning, sink);
        }
        for divider in &obstacles.lane_dividers {
            collision::check_lane_divider(ball, divider, tuning);
        }
        for (i, lane) in obstacles.lanes.iter().enumerate() {
            collision::check_lane(ball, lane, i, &self.bounds.lane_bypass, tuning, sink);
        }
        for (i, lp) in obstacles.loops.iter_mut().enumerate() {
            collision::check_loop(ball, lp, i, tuning, sink);
        }
        for (i, captive) in obstacles.captive_balls.iter_mut().enumerate() {
            collision::check_captive_ball(ball, captive, i, tuning, &mut self.signals, sink);
        }
        for (i, lock) in obstacles.locks.iter_mut().enumerate() {
            if collision::check_lock(ball, lock, i, tuning, &mut self.signals, sink) {
                return Some(i);
            }
        }
        None
    }

    /// Once-per-frame bookkeeping, after every ball has been stepped
    pub fn finish_frame<S: EventSink + ?Sized>(
        &mut self,
        obstacles: &mut ObstacleSet,
        sink: &mut S,
    ) -> FrameReport {
        let mut report = FrameReport::default();
        let tuning = &self.tuning;

        // Cosmetic decay
        for bumper in &mut obstacles.bumpers {
            bumper.hit_timer = bumper.hit_timer.saturating_sub(1);
        }
        for bumper in &mut obstacles.angled_bumpers {
            bumper.hit_timer = bumper.hit_timer.saturating_sub(1);
        }
        for spinner in &mut obstacles.spinners {
            spinner.decay(tuning.spinner.decay, tuning.spinner.stop_threshold);
        }
        for captive in &mut obstacles.captive_balls {
            captive.spring_return(tuning.captive.return_step);
        }

        // An armed loop counts as completed at the end of the frame it was entered
        for lp in &mut obstacles.loops {
            lp.rearm_frames = lp.rearm_frames.saturating_sub(1);
            if lp.active {
                lp.active = false;
                lp.completions += 1;
                lp.rearm_frames = ms_to_frames(tuning.lanes.loop_rearm_ms);
                log::debug!("Loop completed ({} total)", lp.completions);
                sink.score_awarded(tuning.scoring.loop_complete);
            }
        }

        for signal in self.signals.drain(..) {
            match signal {
                Signal::LightLocks => {
                    for lock in obstacles.locks.iter_mut().filter(|l| !l.active) {
                        lock.active = true;
                        log::info!("Lock lit");
                    }
                }
                Signal::LockFull(i) => {
                    if let Some(lock) = obstacles.locks.get_mut(i) {
                        lock.active = false;
                        log::info!("Multiball! Releasing {} balls", lock.locked.len());
                        report.released.append(&mut lock.locked);
                    }
                }
            }
        }

        // Deferred group resets, then queue any newly completed group
        for reset in self.resets.drain_due(self.frame, self.epoch) {
            if !obstacles.group_complete(reset.kind, reset.group) {
                continue;
            }
            obstacles.clear_group(reset.kind, reset.group);
            let bonus = match reset.kind {
                GroupKind::Targets => tuning.scoring.target_bank_bonus,
                GroupKind::DropTargets => tuning.scoring.drop_bank_bonus,
                GroupKind::SkillLanes => tuning.scoring.skill_lane_bonus,
            };
            log::info!("{:?} group {} complete, bonus {}", reset.kind, reset.group, bonus);
            sink.score_awarded(bonus);
        }
        let delay = ms_to_frames(tuning.targets.group_reset_ms);
        for (kind, group) in obstacles.completed_groups() {
            let key = GroupReset { kind, group };
            if !self.resets.any_pending(self.epoch, |r| *r == key) {
                self.resets.schedule(self.frame + delay, self.epoch, key);
            }
        }

        self.frame += 1;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::events::{CollisionKind, EventLog};
    use crate::sim::geometry::Segment;
    use crate::sim::table::{LaneDivider, TableLayout};
    use crate::tuning::PhysicsTuning;

    fn setup() -> (Physics, Flippers, ObstacleSet) {
        let layout = TableLayout::default();
        let physics = Physics::new(Tuning::default(), layout.bounds.clone(), 42);
        (
            physics,
            Flippers::from_layout(&layout),
            ObstacleSet::instantiate(&layout),
        )
    }

    fn launched_ball(pos: Vec2, vel: Vec2) -> Ball {
        let mut ball = Ball::new(1, pos);
        ball.launched = true;
        ball.vel = vel;
        ball
    }

    #[test]
    fn test_launch_from_rest() {
        let (mut physics, _, _) = setup();
        physics.tuning.physics.launch_min = 25.0;
        physics.tuning.physics.launch_max = 55.0;
        let mut ball = Ball::new(1, Vec2::new(370.0, 600.0));
        assert!(physics.launch(&mut ball, 40.0));
        assert_eq!(ball.vel.y, -40.0);
        assert!(ball.launched);
    }

    #[test]
    fn test_inverted_launch_range_does_not_panic() {
        let layout = TableLayout::default();
        let mut tuning = Tuning::default();
        tuning.physics.launch_min = 60.0;
        tuning.physics.launch_max = 25.0;
        let mut physics = Physics::new(tuning, layout.bounds.clone(), 42);
        let mut ball = Ball::new(1, Vec2::new(370.0, 600.0));

        assert!(physics.launch(&mut ball, 40.0));
        assert_eq!(ball.vel.y, -40.0);

        let mut ball = Ball::new(2, Vec2::new(370.0, 600.0));
        assert!(physics.launch_with_charge(&mut ball, 2500.0));
        assert!(ball.vel.is_finite());
    }

    #[test]
    fn test_full_charge_launches_at_max_power() {
        let (mut physics, _, _) = setup();
        let mut ball = Ball::new(1, Vec2::new(370.0, 600.0));
        physics.launch_with_charge(&mut ball, 10_000.0);
        assert_eq!(ball.vel.y, -physics.tuning.physics.launch_max);
    }

    #[test]
    fn test_unlaunched_ball_stays_put() {
        let (mut physics, flippers, mut obstacles) = setup();
        let mut ball = Ball::new(1, Vec2::new(370.0, 742.0));
        for _ in 0..30 {
            let (outcome, _) = physics.advance_frame(&mut ball, &flippers, &mut obstacles, &mut ());
            assert_eq!(outcome, BallOutcome::InPlay);
        }
        assert_eq!(ball.pos, Vec2::new(370.0, 742.0));
        assert_eq!(physics.frame(), 30);
    }

    #[test]
    fn test_substeps_stop_tunneling_through_thin_divider() {
        let layout = TableLayout::default();
        let tuning = Tuning {
            physics: PhysicsTuning {
                gravity: 0.0,
                damping: 1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut physics = Physics::new(tuning, layout.bounds.clone(), 1);
        let flippers = Flippers::from_layout(&layout);
        let mut obstacles = ObstacleSet {
            lane_dividers: vec![LaneDivider {
                segment: Segment::new(Vec2::new(200.0, 300.0), Vec2::new(200.0, 500.0)),
            }],
            ..Default::default()
        };
        let mut ball = launched_ball(Vec2::new(180.0, 400.0), Vec2::new(25.0, 0.0));

        physics.advance_frame(&mut ball, &flippers, &mut obstacles, &mut ());

        assert!(ball.pos.x < 200.0);
        assert!(ball.vel.x < 0.0);
    }

    #[test]
    fn test_ball_lost_below_drain() {
        let (mut physics, flippers, mut obstacles) = setup();
        let mut ball = launched_ball(Vec2::new(200.0, 815.0), Vec2::new(0.0, 10.0));
        let (outcome, _) = physics.advance_frame(&mut ball, &flippers, &mut obstacles, &mut ());
        assert_eq!(outcome, BallOutcome::Lost);
        assert_eq!(ball.trail_len(), 1);
    }

    #[test]
    fn test_drop_target_bank_resets_after_delay() {
        let (mut physics, _, mut obstacles) = setup();
        let mut log = EventLog::new();
        for target in &mut obstacles.drop_targets {
            target.dropped = true;
        }
        let delay = ms_to_frames(physics.tuning.targets.group_reset_ms);

        for _ in 0..delay {
            physics.finish_frame(&mut obstacles, &mut log);
        }
        // Still down while the reset is pending
        assert!(obstacles.drop_targets.iter().all(|t| t.dropped));
        assert!(log.awards.is_empty());

        physics.finish_frame(&mut obstacles, &mut log);
        assert!(obstacles.drop_targets.iter().all(|t| !t.dropped));

        for _ in 0..(delay * 2) {
            physics.finish_frame(&mut obstacles, &mut log);
        }
        let bonus = physics.tuning.scoring.drop_bank_bonus;
        assert_eq!(log.awards, vec![bonus]);
    }

    #[test]
    fn test_stale_group_reset_is_ignored() {
        let (mut physics, _, mut obstacles) = setup();
        let mut log = EventLog::new();
        for target in &mut obstacles.drop_targets {
            target.dropped = true;
        }
        physics.finish_frame(&mut obstacles, &mut log);

        // New game before the reset fires
        physics.reset();
        obstacles.reset_runtime();
        obstacles.drop_targets[0].dropped = true;

        let delay = ms_to_frames(physics.tuning.targets.group_reset_ms);
        for _ in 0..(delay * 2) {
            physics.finish_frame(&mut obstacles, &mut log);
        }
        assert!(log.awards.is_empty());
        assert!(obstacles.drop_targets[0].dropped);
    }

    #[test]
    fn test_loop_completes_at_end_of_frame() {
        let (mut physics, _, mut obstacles) = setup();
        let mut log = EventLog::new();
        obstacles.loops[0].active = true;

        physics.finish_frame(&mut obstacles, &mut log);

        let lp = &obstacles.loops[0];
        assert!(!lp.active);
        assert_eq!(lp.completions, 1);
        assert_eq!(lp.rearm_frames, ms_to_frames(physics.tuning.lanes.loop_rearm_ms));
        assert_eq!(log.awards, vec![physics.tuning.scoring.loop_complete]);

        for _ in 0..lp.rearm_frames {
            physics.finish_frame(&mut obstacles, &mut log);
        }
        assert_eq!(obstacles.loops[0].rearm_frames, 0);
    }

    #[test]
    fn test_cosmetic_timers_decay() {
        let (mut physics, _, mut obstacles) = setup();
        obstacles.bumpers[0].hit_timer = 2;
        obstacles.captive_balls[0].offset = 1.0;
        obstacles.spinners[0].spinning = true;
        obstacles.spinners[0].spin_speed = 0.3;

        physics.finish_frame(&mut obstacles, &mut ());
        assert_eq!(obstacles.bumpers[0].hit_timer, 1);
        assert!((obstacles.captive_balls[0].offset - 0.5).abs() < 1e-6);
        assert!(obstacles.spinners[0].angle > 0.0);

        physics.finish_frame(&mut obstacles, &mut ());
        physics.finish_frame(&mut obstacles, &mut ());
        assert_eq!(obstacles.bumpers[0].hit_timer, 0);
        assert_eq!(obstacles.captive_balls[0].offset, 0.0);
    }

    #[test]
    fn test_lock_fill_starts_multiball() {
        let (mut physics, flippers, mut obstacles) = setup();
        let mut log = EventLog::new();
        obstacles.locks[0].active = true;
        let capacity = obstacles.locks[0].capacity;

        let mut report = FrameReport::default();
        for n in 0..capacity {
            let mut ball = launched_ball(Vec2::new(310.0, 136.0), Vec2::ZERO);
            ball.id = n as u32 + 1;
            let (outcome, r) = physics.advance_frame(&mut ball, &flippers, &mut obstacles, &mut log);
            assert_eq!(outcome, BallOutcome::Locked { lock: 0 });
            report = r;
        }

        assert_eq!(report.released.len(), capacity);
        assert!(!obstacles.locks[0].active);
        assert!(obstacles.locks[0].locked.is_empty());
        assert_eq!(log.count(CollisionKind::BallLocked), capacity);
    }

    #[test]
    fn test_captive_hits_light_lock() {
        let (mut physics, flippers, mut obstacles) = setup();
        let hits = physics.tuning.captive.hits_to_light_lock;
        obstacles.captive_balls[0].hits = hits - 1;
        assert!(!obstacles.locks[0].active);

        let mut ball = launched_ball(Vec2::new(330.0, 314.0), Vec2::new(0.0, -5.0));
        physics.advance_frame(&mut ball, &flippers, &mut obstacles, &mut ());

        assert_eq!(obstacles.captive_balls[0].hits, hits);
        assert!(obstacles.locks[0].active);
    }

    #[test]
    fn test_slingshot_end_cap_scores_once_per_frame() {
        let layout = TableLayout::default();
        let tuning = Tuning {
            physics: PhysicsTuning {
                gravity: 0.0,
                damping: 1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut physics = Physics::new(tuning, layout.bounds.clone(), 1);
        let flippers = Flippers::from_layout(&layout);
        let sling = layout.angled_bumpers[0].clone();
        let mut obstacles = ObstacleSet {
            angled_bumpers: vec![sling.clone()],
            ..Default::default()
        };
        let dir = sling.segment.direction().normalize();
        let perp = sling.segment.perpendicular().unwrap();
        // Heading straight into the cap at `a`, slightly off the axis
        let start = sling.segment.a - dir * 13.5 + perp * 0.5;
        let mut ball = launched_ball(start, dir * 5.0);
        let mut log = EventLog::new();

        physics.advance_frame(&mut ball, &flippers, &mut obstacles, &mut log);

        assert_eq!(log.count(CollisionKind::AngledBumper), 1);
        assert_eq!(log.awards, vec![physics.tuning.scoring.angled_bumper_hit]);
        assert!(ball.vel.length() > 5.0);
        assert!(ball.vel.dot(dir) < 0.0);
    }

    #[test]
    fn test_hard_boundary_skips_obstacles_for_substep() {
        let (mut physics, flippers, _) = setup();
        // A bumper straddling the hard boundary
        let mut obstacles = ObstacleSet {
            bumpers: vec![crate::sim::table::Bumper {
                center: Vec2::new(10.0, 400.0),
                radius: 10.0,
                power: 10.0,
                color: 0,
                hit_timer: 0,
            }],
            ..Default::default()
        };
        physics.tuning.physics.substeps = 1;
        physics.tuning.physics.gravity = 0.0;
        let mut log = EventLog::new();
        let mut ball = launched_ball(Vec2::new(14.0, 400.0), Vec2::new(-3.0, 0.0));

        physics.advance_frame(&mut ball, &flippers, &mut obstacles, &mut log);

        assert_eq!(log.count(CollisionKind::Wall), 1);
        assert_eq!(log.count(CollisionKind::Bumper), 0);
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = || {
            let (mut physics, flippers, mut obstacles) = setup();
            let mut ball = Ball::new(1, Vec2::new(370.0, 742.0));
            physics.launch(&mut ball, 45.0);
            for _ in 0..240 {
                let (outcome, _) =
                    physics.advance_frame(&mut ball, &flippers, &mut obstacles, &mut ());
                if outcome != BallOutcome::InPlay {
                    break;
                }
            }
            ball.pos
        };
        assert_eq!(run(), run());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn speed_never_exceeds_cap(
                vx in -200.0f32..200.0,
                vy in -200.0f32..200.0,
                y in 100.0f32..800.0,
                mobile in any::<bool>()
            ) {
                let tuning = if mobile {
                    Tuning::for_device(crate::DeviceProfile::Mobile)
                } else {
                    Tuning::default()
                };
                let mut ball = launched_ball(Vec2::new(200.0, y), Vec2::new(vx, vy));
                ball.update(&tuning.physics, crate::consts::TABLE_HEIGHT);
                prop_assert!(
                    ball.vel.length() <= tuning.physics.max_velocity + 1e-3,
                    "speed {} exceeds cap {}",
                    ball.vel.length(),
                    tuning.physics.max_velocity
                );
            }

            #[test]
            fn ball_stays_inside_hard_boundary(
                x in 30.0f32..350.0,
                y in 150.0f32..600.0,
                vx in -25.0f32..25.0,
                vy in -25.0f32..25.0,
                seed in 0u64..1000
            ) {
                let layout = TableLayout::default();
                let mut physics = Physics::new(Tuning::default(), layout.bounds.clone(), seed);
                let flippers = Flippers::from_layout(&layout);
                let mut obstacles = ObstacleSet::instantiate(&layout);
                let mut ball = launched_ball(Vec2::new(x, y), Vec2::new(vx, vy));
                let bounds = layout.bounds.clone();

                for _ in 0..300 {
                    let (outcome, _) =
                        physics.advance_frame(&mut ball, &flippers, &mut obstacles, &mut ());
                    if outcome != BallOutcome::InPlay {
                        break;
                    }
                    prop_assert!(ball.pos.is_finite());
                    prop_assert!(
                        ball.pos.x >= bounds.hard_left() && ball.pos.x <= bounds.hard_right(),
                        "x={} escaped", ball.pos.x
                    );
                    prop_assert!(ball.pos.y >= bounds.hard_top(), "y={} escaped", ball.pos.y);
                    prop_assert!(ball.pos.y <= bounds.lost_y);
                }
            }

            #[test]
            fn trail_never_exceeds_capacity(frames in 1usize..400) {
                let (mut physics, flippers, mut obstacles) = setup();
                let mut ball = launched_ball(Vec2::new(200.0, 200.0), Vec2::new(4.0, 0.0));
                for _ in 0..frames {
                    physics.advance_frame(&mut ball, &flippers, &mut obstacles, &mut ());
                    prop_assert!(ball.trail_len() <= crate::consts::TRAIL_LENGTH);
                }
            }
        }
    }
}
