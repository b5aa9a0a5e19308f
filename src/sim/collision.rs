//! Per-obstacle collision tests and responses
//!
//! Each `check_*` function tests one obstacle instance against the ball,
//! resolves the contact (position and velocity), updates the obstacle's
//! runtime state and reports through the sink. They return true when a
//! contact was resolved. Invalid obstacles never collide.

use glam::Vec2;
use rand::Rng;

use super::events::{CollisionEvent, CollisionKind, EventSink, ObstacleRef};
use super::geometry::{
    Contact, EPSILON, Rect, RectSide, Segment, circle_circle, circle_segment, direction, reflect,
    rotate,
};
use super::state::{Ball, Flipper};
use super::table::{
    AngledBumper, BallLock, Bumper, CaptiveBall, DropTarget, FlipperSide, Lane, LaneDivider, Loop,
    Magnet, Ramp, SkillLane, Spinner, Target,
};
use crate::{Tuning, ms_to_frames};

/// Cross-obstacle side effects, applied by the engine at the end of the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Captive ball reached its hit count: light every lock
    LightLocks,
    /// A lock filled up: release its balls (multiball)
    LockFull(usize),
}

/// Per-flipper debounce, in frames
#[derive(Debug, Clone, Default)]
pub struct FlipperCooldown {
    last_hit: [Option<u64>; 2],
}

impl FlipperCooldown {
    pub fn ready(&self, side: FlipperSide, frame: u64, cooldown_frames: u64) -> bool {
        match self.last_hit[side.index()] {
            Some(last) => frame.saturating_sub(last) >= cooldown_frames,
            None => true,
        }
    }

    pub fn mark(&mut self, side: FlipperSide, frame: u64) {
        self.last_hit[side.index()] = Some(frame);
    }

    pub fn clear(&mut self) {
        self.last_hit = [None; 2];
    }
}

fn emit<S: EventSink + ?Sized>(
    sink: &mut S,
    ball: &Ball,
    kind: CollisionKind,
    pos: Vec2,
    normal: Vec2,
    obstacle: ObstacleRef,
) {
    sink.collision(&CollisionEvent {
        kind,
        pos,
        normal,
        obstacle,
        ball_id: ball.id,
    });
}

/// Push the ball clear of a thick segment and reflect it if it was moving in
fn bounce_off_segment(
    ball: &mut Ball,
    segment: &Segment,
    half_width: f32,
    restitution: f32,
) -> Option<Contact> {
    let contact = circle_segment(ball.pos, ball.radius(), ball.vel, segment, half_width)?;
    ball.pos = contact.point + contact.normal * (ball.radius() + half_width);
    if ball.vel.dot(contact.normal) < 0.0 {
        ball.vel = reflect(ball.vel, contact.normal) * restitution;
    }
    Some(contact)
}

/// Push the ball out through the side of least penetration
fn bounce_off_rect(ball: &mut Ball, rect: &Rect, restitution: f32) -> Vec2 {
    let r = ball.radius();
    let (side, _) = rect.least_penetration(ball.pos, r);
    match side {
        RectSide::Left => {
            ball.pos.x = rect.x - r;
            ball.vel.x = -ball.vel.x.abs() * restitution;
        }
        RectSide::Right => {
            ball.pos.x = rect.right() + r;
            ball.vel.x = ball.vel.x.abs() * restitution;
        }
        RectSide::Top => {
            ball.pos.y = rect.y - r;
            ball.vel.y = -ball.vel.y.abs() * restitution;
        }
        RectSide::Bottom => {
            ball.pos.y = rect.bottom() + r;
            ball.vel.y = ball.vel.y.abs() * restitution;
        }
    }
    side.normal()
}

/// One-shot rectangle shared by targets, drop targets and skill lanes
#[allow(clippy::too_many_arguments)]
fn hit_one_shot_rect<S: EventSink + ?Sized>(
    ball: &mut Ball,
    rect: &Rect,
    flag: &mut bool,
    restitution: f32,
    points: u32,
    kind: CollisionKind,
    obstacle: ObstacleRef,
    sink: &mut S,
) -> bool {
    if *flag || !rect.is_valid() || !rect.overlaps_circle(ball.pos, ball.radius()) {
        return false;
    }
    let normal = bounce_off_rect(ball, rect, restitution);
    *flag = true;
    sink.score_awarded(points);
    emit(sink, ball, kind, ball.pos, normal, obstacle);
    true
}

/// Flipper contact
///
/// The flipper is a line from pivot to tip with an effective half-width that
/// grows when it is raised and with ball speed, so a fast ball cannot step
/// over it between substeps.
pub fn check_flipper<S: EventSink + ?Sized>(
    ball: &mut Ball,
    flipper: &Flipper,
    tuning: &Tuning,
    cooldown: &mut FlipperCooldown,
    frame: u64,
    sink: &mut S,
) -> bool {
    let ft = &tuning.flipper;
    let segment = flipper.segment();
    let Some((closest, _)) = segment.closest_point(ball.pos) else {
        return false;
    };

    let speed_bonus = (ball.vel.length() * ft.speed_width_factor).min(ft.max_speed_width);
    let active_bonus = if flipper.is_active { ft.active_width_bonus } else { 0.0 };
    let reach = ball.radius() + ft.base_width + active_bonus + speed_bonus;

    let delta = ball.pos - closest;
    let dist = delta.length();
    if dist >= reach {
        return false;
    }
    if !cooldown.ready(flipper.side, frame, ms_to_frames(ft.cooldown_ms)) {
        return false;
    }
    cooldown.mark(flipper.side, frame);

    let normal = if dist < EPSILON {
        // Ball on the pivot: push out up and away from the centre line
        let angle = match flipper.side {
            FlipperSide::Left => -std::f32::consts::FRAC_PI_4,
            FlipperSide::Right => -3.0 * std::f32::consts::FRAC_PI_4,
        };
        direction(angle)
    } else {
        delta / dist
    };
    ball.pos = closest + normal * (ball.radius() + ft.base_width + ft.clearance);

    let power = ft.base_power.max(flipper.speed(ft.speed_factor) * ft.power_scale);
    // Mirror the right flipper so both sides favour the same launch angles
    let mirrored = match flipper.side {
        FlipperSide::Left => flipper.angle,
        FlipperSide::Right => std::f32::consts::PI - flipper.angle,
    };
    let angle_factor = mirrored.cos().max(ft.min_angle_factor);

    ball.vel = normal * power * angle_factor
        + Vec2::new(flipper.side.sign() * ft.lateral_kick, -ft.upward_boost);

    log::debug!("Flipper {:?} hit, power {:.1}", flipper.side, power);
    sink.score_awarded(tuning.scoring.flipper_hit);
    emit(
        sink,
        ball,
        CollisionKind::Flipper,
        closest,
        normal,
        ObstacleRef::Flipper(flipper.side),
    );
    true
}

/// Pop bumper: the ball leaves at the bumper's power regardless of how it came in
pub fn check_bumper<S: EventSink + ?Sized>(
    ball: &mut Ball,
    bumper: &mut Bumper,
    index: usize,
    tuning: &Tuning,
    sink: &mut S,
) -> bool {
    if !bumper.is_valid() {
        return false;
    }
    let Some(contact) = circle_circle(ball.pos, ball.radius(), bumper.center, bumper.radius, -ball.vel)
    else {
        return false;
    };

    ball.pos = bumper.center + contact.normal * (ball.radius() + bumper.radius);
    ball.vel = contact.normal * bumper.power;
    bumper.hit_timer = tuning.bumper.flash_frames;

    sink.score_awarded(tuning.scoring.bumper_hit);
    emit(
        sink,
        ball,
        CollisionKind::Bumper,
        ball.pos,
        contact.normal,
        ObstacleRef::Bumper(index),
    );
    true
}

/// Slingshot: reflect about the face the ball came from, then kick
pub fn check_angled_bumper<S: EventSink + ?Sized>(
    ball: &mut Ball,
    bumper: &mut AngledBumper,
    index: usize,
    tuning: &Tuning,
    sink: &mut S,
) -> bool {
    if !bumper.is_valid() {
        return false;
    }
    let half_width = bumper.width / 2.0;
    let Some(contact) = circle_segment(ball.pos, ball.radius(), ball.vel, &bumper.segment, half_width)
    else {
        return false;
    };
    // Radial at the end caps, the face perpendicular elsewhere
    let normal = contact.normal;
    ball.pos += normal * contact.penetration;
    // Already leaving: clear the overlap without another kick
    if ball.vel.dot(normal) >= 0.0 {
        return false;
    }
    ball.vel = reflect(ball.vel, normal) + normal * bumper.power;
    bumper.hit_timer = tuning.bumper.flash_frames;

    sink.score_awarded(tuning.scoring.angled_bumper_hit);
    emit(
        sink,
        ball,
        CollisionKind::AngledBumper,
        contact.point,
        normal,
        ObstacleRef::AngledBumper(index),
    );
    true
}

pub fn check_target<S: EventSink + ?Sized>(
    ball: &mut Ball,
    target: &mut Target,
    index: usize,
    tuning: &Tuning,
    sink: &mut S,
) -> bool {
    hit_one_shot_rect(
        ball,
        &target.rect,
        &mut target.hit,
        tuning.targets.target_restitution,
        target.points.unwrap_or(tuning.scoring.target_hit),
        CollisionKind::Target,
        ObstacleRef::Target(index),
        sink,
    )
}

pub fn check_drop_target<S: EventSink + ?Sized>(
    ball: &mut Ball,
    target: &mut DropTarget,
    index: usize,
    tuning: &Tuning,
    sink: &mut S,
) -> bool {
    hit_one_shot_rect(
        ball,
        &target.rect,
        &mut target.dropped,
        tuning.targets.drop_restitution,
        target.points.unwrap_or(tuning.scoring.drop_target_hit),
        CollisionKind::DropTarget,
        ObstacleRef::DropTarget(index),
        sink,
    )
}

pub fn check_skill_lane<S: EventSink + ?Sized>(
    ball: &mut Ball,
    lane: &mut SkillLane,
    index: usize,
    tuning: &Tuning,
    sink: &mut S,
) -> bool {
    hit_one_shot_rect(
        ball,
        &lane.rect,
        &mut lane.lit,
        tuning.targets.skill_lane_restitution,
        lane.points.unwrap_or(tuning.scoring.skill_lane_hit),
        CollisionKind::SkillLane,
        ObstacleRef::SkillLane(index),
        sink,
    )
}

/// Spinner: debounced by its own spinning flag
pub fn check_spinner<S: EventSink + ?Sized, R: Rng>(
    ball: &mut Ball,
    spinner: &mut Spinner,
    index: usize,
    tuning: &Tuning,
    rng: &mut R,
    sink: &mut S,
) -> bool {
    if spinner.spinning {
        return false;
    }
    let st = &tuning.spinner;
    let Some(contact) = circle_circle(ball.pos, ball.radius(), spinner.center, st.radius, -ball.vel)
    else {
        return false;
    };

    spinner.spinning = true;
    spinner.spin_speed = st.initial_speed;

    ball.pos = spinner.center + contact.normal * (ball.radius() + st.radius);
    if ball.vel.dot(contact.normal) < 0.0 {
        let half = st.jitter.abs() / 2.0;
        let wobble = if half > 0.0 {
            rng.random_range(-half..half)
        } else {
            0.0
        };
        ball.vel = rotate(reflect(ball.vel, contact.normal) * st.boost, wobble);
    }

    sink.score_awarded(tuning.scoring.spinner_hit);
    emit(
        sink,
        ball,
        CollisionKind::Spinner,
        ball.pos,
        contact.normal,
        ObstacleRef::Spinner(index),
    );
    true
}

/// Ramp rails keep (slightly amplify) the ball's speed
pub fn check_ramp<S: EventSink + ?Sized>(
    ball: &mut Ball,
    ramp: &Ramp,
    index: usize,
    tuning: &Tuning,
    sink: &mut S,
) -> bool {
    let Some(contact) =
        bounce_off_segment(ball, &ramp.segment, ramp.width / 2.0, tuning.lanes.ramp_boost)
    else {
        return false;
    };
    sink.score_awarded(tuning.scoring.ramp_hit);
    emit(
        sink,
        ball,
        CollisionKind::Ramp,
        contact.point,
        contact.normal,
        ObstacleRef::Ramp(index),
    );
    true
}

/// Thin divider, no scoring
pub fn check_lane_divider(ball: &mut Ball, divider: &LaneDivider, tuning: &Tuning) -> bool {
    bounce_off_segment(
        ball,
        &divider.segment,
        tuning.lanes.divider_width,
        tuning.lanes.divider_restitution,
    )
    .is_some()
}

/// Outlane or inlane guide
///
/// Skipped entirely while the ball is inside `bypass` (the launcher lane).
pub fn check_lane<S: EventSink + ?Sized>(
    ball: &mut Ball,
    lane: &Lane,
    index: usize,
    bypass: &Rect,
    tuning: &Tuning,
    sink: &mut S,
) -> bool {
    if bypass.contains(ball.pos) {
        return false;
    }
    let Some(contact) = bounce_off_segment(
        ball,
        &lane.segment,
        tuning.lanes.lane_width,
        tuning.lanes.lane_restitution,
    ) else {
        return false;
    };
    if lane.danger {
        sink.score_awarded(tuning.scoring.outlane_hit);
    }
    emit(
        sink,
        ball,
        CollisionKind::Lane,
        contact.point,
        contact.normal,
        ObstacleRef::Lane(index),
    );
    true
}

/// Orbit rails; the first segment is the entrance
pub fn check_loop<S: EventSink + ?Sized>(
    ball: &mut Ball,
    lp: &mut Loop,
    index: usize,
    tuning: &Tuning,
    sink: &mut S,
) -> bool {
    let half_width = lp.width / 2.0;
    let mut touched = false;
    for (i, segment) in lp.segments.iter().enumerate() {
        let Some(contact) =
            bounce_off_segment(ball, segment, half_width, tuning.lanes.loop_restitution)
        else {
            continue;
        };
        touched = true;
        if i == 0 && !lp.active && lp.rearm_frames == 0 {
            lp.active = true;
            sink.score_awarded(tuning.scoring.loop_enter);
            emit(
                sink,
                ball,
                CollisionKind::LoopEnter,
                contact.point,
                contact.normal,
                ObstacleRef::Loop(index),
            );
        }
    }
    touched
}

/// Lit lock swallows the ball
///
/// Returns true when the ball was captured; the caller takes it out of play.
pub fn check_lock<S: EventSink + ?Sized>(
    ball: &Ball,
    lock: &mut BallLock,
    index: usize,
    tuning: &Tuning,
    signals: &mut Vec<Signal>,
    sink: &mut S,
) -> bool {
    if !lock.active || lock.is_full() || !lock.bounds.contains(ball.pos) {
        return false;
    }
    lock.locked.push(ball.pos);
    log::info!("Ball {} locked ({}/{})", ball.id, lock.locked.len(), lock.capacity);
    if lock.is_full() {
        signals.push(Signal::LockFull(index));
    }
    sink.score_awarded(tuning.scoring.ball_locked);
    emit(
        sink,
        ball,
        CollisionKind::BallLocked,
        ball.pos,
        Vec2::ZERO,
        ObstacleRef::Lock(index),
    );
    true
}

/// Captive ball: the struck ball bounces, the captive slides along its lane
pub fn check_captive_ball<S: EventSink + ?Sized>(
    ball: &mut Ball,
    captive: &mut CaptiveBall,
    index: usize,
    tuning: &Tuning,
    signals: &mut Vec<Signal>,
    sink: &mut S,
) -> bool {
    if !captive.is_valid() {
        return false;
    }
    let ct = &tuning.captive;
    let center = captive.position();
    let Some(contact) = circle_circle(ball.pos, ball.radius(), center, captive.radius, -ball.vel)
    else {
        return false;
    };

    let incoming = -ball.vel.dot(contact.normal);
    if incoming <= 0.0 {
        // Resting contact or already moving away
        return false;
    }
    ball.pos = center + contact.normal * (ball.radius() + captive.radius);
    ball.vel = reflect(ball.vel, contact.normal) * ct.restitution;

    let along = (-contact.normal).dot(captive.axis.normalize_or_zero()).max(0.0);
    captive.offset = (captive.offset + along * incoming * ct.nudge_factor).min(captive.travel);
    captive.hits += 1;

    sink.score_awarded(tuning.scoring.captive_hit);
    emit(
        sink,
        ball,
        CollisionKind::CaptiveBallHit,
        center,
        contact.normal,
        ObstacleRef::CaptiveBall(index),
    );

    if ct.hits_to_light_lock > 0 && captive.hits % ct.hits_to_light_lock == 0 {
        log::info!("Captive ball hit {} times, lighting locks", captive.hits);
        signals.push(Signal::LightLocks);
    }
    true
}

/// Pull the ball toward a magnet, stronger nearer the centre
pub fn apply_magnet(ball: &mut Ball, magnet: &Magnet) -> bool {
    if !magnet.active || magnet.radius.is_nan() || magnet.radius <= 0.0 {
        return false;
    }
    let delta = magnet.center - ball.pos;
    let dist = delta.length();
    if dist >= magnet.radius || dist < EPSILON {
        return false;
    }
    ball.vel += delta / dist * magnet.strength * (1.0 - dist / magnet.radius);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::events::EventLog;
    use crate::sim::table::TableLayout;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn ball_at(x: f32, y: f32, vel: Vec2) -> Ball {
        let mut ball = Ball::new(1, Vec2::new(x, y));
        ball.launched = true;
        ball.vel = vel;
        ball
    }

    fn bumper(x: f32, y: f32, radius: f32, power: f32) -> Bumper {
        Bumper {
            center: Vec2::new(x, y),
            radius,
            power,
            color: 0,
            hit_timer: 0,
        }
    }

    #[test]
    fn test_bumper_sends_ball_directly_away() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let mut b = bumper(150.0, 250.0, 30.0, 10.0);
        let mut ball = ball_at(170.0, 260.0, Vec2::new(-3.0, -1.0));
        let away = (ball.pos - b.center).normalize();

        assert!(check_bumper(&mut ball, &mut b, 0, &tuning, &mut log));

        assert!((ball.vel.length() - 10.0).abs() < 1e-4);
        assert!((ball.vel.normalize() - away).length() < 1e-4);
        assert!(((ball.pos - b.center).length() - 38.0).abs() < 1e-3);
        assert_eq!(b.hit_timer, tuning.bumper.flash_frames);
        assert_eq!(log.awards, vec![tuning.scoring.bumper_hit]);
        assert_eq!(log.count(CollisionKind::Bumper), 1);
    }

    #[test]
    fn test_bumper_injects_energy_into_slow_ball() {
        let tuning = Tuning::default();
        let mut b = bumper(150.0, 250.0, 30.0, 10.0);
        let mut ball = ball_at(150.0, 285.0, Vec2::new(0.0, -2.0));
        let before = ball.vel.length();
        check_bumper(&mut ball, &mut b, 0, &tuning, &mut ());
        assert!(ball.vel.length() >= before);
    }

    #[test]
    fn test_invalid_bumper_is_skipped() {
        let tuning = Tuning::default();
        let mut b = bumper(150.0, 250.0, 0.0, 10.0);
        let mut ball = ball_at(150.0, 250.0, Vec2::ZERO);
        assert!(!check_bumper(&mut ball, &mut b, 0, &tuning, &mut ()));
        assert_eq!(ball.pos, Vec2::new(150.0, 250.0));
    }

    #[test]
    fn test_target_hit_from_left() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let mut target = TableLayout::default().targets[0].clone();
        assert_eq!(target.rect.x, 50.0);
        let mut ball = ball_at(44.0, 475.0, Vec2::new(5.0, 0.0));

        assert!(check_target(&mut ball, &mut target, 0, &tuning, &mut log));

        assert!(target.hit);
        assert_eq!(ball.pos.x, target.rect.x - ball.radius());
        assert!((ball.vel.x - (-5.0 * tuning.targets.target_restitution)).abs() < 1e-5);
        assert_eq!(log.total_score(), 500);
    }

    #[test]
    fn test_hit_target_is_inert() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let mut target = TableLayout::default().targets[0].clone();
        let mut ball = ball_at(44.0, 475.0, Vec2::new(5.0, 0.0));
        check_target(&mut ball, &mut target, 0, &tuning, &mut log);

        for _ in 0..5 {
            ball.pos = Vec2::new(60.0, 475.0);
            assert!(!check_target(&mut ball, &mut target, 0, &tuning, &mut log));
        }
        assert_eq!(log.awards.len(), 1);
        assert_eq!(log.count(CollisionKind::Target), 1);
    }

    #[test]
    fn test_drop_target_uses_default_points() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let mut target = TableLayout::default().drop_targets[0].clone();
        // Falling onto the top face
        let mut ball = ball_at(170.0, 414.0, Vec2::new(0.0, 4.0));
        assert!(check_drop_target(&mut ball, &mut target, 0, &tuning, &mut log));
        assert!(target.dropped);
        assert_eq!(ball.pos.y, target.rect.y - ball.radius());
        assert!(ball.vel.y < 0.0);
        assert_eq!(log.awards, vec![tuning.scoring.drop_target_hit]);
    }

    #[test]
    fn test_skill_lane_lights_once() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let mut lane = TableLayout::default().skill_lanes[0].clone();
        let mut ball = ball_at(103.0, 150.0, Vec2::new(0.0, -6.0));
        assert!(check_skill_lane(&mut ball, &mut lane, 0, &tuning, &mut log));
        assert!(lane.lit);
        ball.pos = Vec2::new(103.0, 150.0);
        assert!(!check_skill_lane(&mut ball, &mut lane, 0, &tuning, &mut log));
        assert_eq!(log.count(CollisionKind::SkillLane), 1);
    }

    fn left_flipper() -> Flipper {
        Flipper::new(FlipperSide::Left, &TableLayout::default().left_flipper)
    }

    #[test]
    fn test_flipper_launches_ball_upward() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let flipper = left_flipper();
        let mut cooldown = FlipperCooldown::default();
        let mut ball = ball_at(134.0, 660.0, Vec2::new(0.0, 3.0));

        assert!(check_flipper(&mut ball, &flipper, &tuning, &mut cooldown, 0, &mut log));

        assert!(ball.vel.y < -tuning.flipper.upward_boost);
        assert!(ball.vel.is_finite());
        let (closest, _) = flipper.segment().closest_point(ball.pos).unwrap();
        let gap = (ball.pos - closest).length();
        let expected = ball.radius() + tuning.flipper.base_width + tuning.flipper.clearance;
        assert!((gap - expected).abs() < 1e-3);
        assert_eq!(log.awards, vec![tuning.scoring.flipper_hit]);
        assert_eq!(log.count(CollisionKind::Flipper), 1);
    }

    #[test]
    fn test_flipper_cooldown_debounces() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let flipper = left_flipper();
        let mut cooldown = FlipperCooldown::default();
        let start = Vec2::new(134.0, 660.0);
        let mut ball = ball_at(start.x, start.y, Vec2::ZERO);
        assert!(check_flipper(&mut ball, &flipper, &tuning, &mut cooldown, 10, &mut log));

        let frames = ms_to_frames(tuning.flipper.cooldown_ms);
        for frame in 10..10 + frames {
            ball.pos = start;
            ball.vel = Vec2::ZERO;
            assert!(!check_flipper(&mut ball, &flipper, &tuning, &mut cooldown, frame, &mut log));
        }
        ball.pos = start;
        assert!(check_flipper(&mut ball, &flipper, &tuning, &mut cooldown, 10 + frames, &mut log));
        assert_eq!(log.count(CollisionKind::Flipper), 2);
    }

    #[test]
    fn test_ball_on_pivot_is_pushed_out() {
        let tuning = Tuning::default();
        let flipper = left_flipper();
        let mut cooldown = FlipperCooldown::default();
        let mut ball = ball_at(flipper.pivot.x, flipper.pivot.y, Vec2::ZERO);

        assert!(check_flipper(&mut ball, &flipper, &tuning, &mut cooldown, 0, &mut ()));

        assert!(ball.pos.is_finite());
        assert!(ball.vel.is_finite());
        assert!(ball.pos.y < flipper.pivot.y);
        assert!(ball.pos.x > flipper.pivot.x);
    }

    #[test]
    fn test_flippers_are_symmetric() {
        let tuning = Tuning::default();
        let layout = TableLayout::default();
        let left = Flipper::new(FlipperSide::Left, &layout.left_flipper);
        let right = Flipper::new(FlipperSide::Right, &layout.right_flipper);
        let mid = (layout.left_flipper.pivot.x + layout.right_flipper.pivot.x) / 2.0;

        let mut lball = ball_at(134.0, 660.0, Vec2::ZERO);
        let mut rball = ball_at(2.0 * mid - 134.0, 660.0, Vec2::ZERO);
        check_flipper(&mut lball, &left, &tuning, &mut FlipperCooldown::default(), 0, &mut ());
        check_flipper(&mut rball, &right, &tuning, &mut FlipperCooldown::default(), 0, &mut ());

        assert!((lball.vel.x + rball.vel.x).abs() < 1e-3);
        assert!((lball.vel.y - rball.vel.y).abs() < 1e-3);
    }

    #[test]
    fn test_angled_bumper_kicks_away_from_face() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let mut sling = TableLayout::default().angled_bumpers[0].clone();
        let perp = sling.segment.perpendicular().unwrap();
        let mid = (sling.segment.a + sling.segment.b) / 2.0;
        let mut ball = ball_at(0.0, 0.0, -perp * 3.0);
        ball.pos = mid + perp * 6.0;

        assert!(check_angled_bumper(&mut ball, &mut sling, 0, &tuning, &mut log));

        assert!(ball.vel.dot(perp) > 0.0);
        // Reflected (3) plus power (6)
        assert!((ball.vel.dot(perp) - (3.0 + sling.power)).abs() < 1e-3);
        assert_eq!(sling.hit_timer, tuning.bumper.flash_frames);
        assert_eq!(log.count(CollisionKind::AngledBumper), 1);
    }

    #[test]
    fn test_angled_bumper_end_cap_clears_overlap_without_rescoring() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let mut sling = TableLayout::default().angled_bumpers[0].clone();
        let a = sling.segment.a;
        let dir = (a - sling.segment.b).normalize();
        let reach = ball_at(0.0, 0.0, Vec2::ZERO).radius() + sling.width / 2.0;
        // Overlapping the cap past `a`, already moving away from it
        let mut ball = ball_at(0.0, 0.0, dir * 5.0);
        ball.pos = a + dir * (reach - 2.0);

        assert!(!check_angled_bumper(&mut ball, &mut sling, 0, &tuning, &mut log));

        assert!(((ball.pos - a).length() - reach).abs() < 1e-3);
        assert_eq!(ball.vel, dir * 5.0);
        assert_eq!(log.count(CollisionKind::AngledBumper), 0);
        assert_eq!(sling.hit_timer, 0);
    }

    #[test]
    fn test_angled_bumper_end_cap_kicks_radially() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let mut sling = TableLayout::default().angled_bumpers[0].clone();
        let a = sling.segment.a;
        let dir = (a - sling.segment.b).normalize();
        let reach = ball_at(0.0, 0.0, Vec2::ZERO).radius() + sling.width / 2.0;
        let mut ball = ball_at(0.0, 0.0, -dir * 3.0);
        ball.pos = a + dir * (reach - 2.0);

        assert!(check_angled_bumper(&mut ball, &mut sling, 0, &tuning, &mut log));

        assert!((ball.pos - a).length() >= reach - 1e-3);
        assert!((ball.vel.dot(dir) - (3.0 + sling.power)).abs() < 1e-3);
        assert_eq!(log.count(CollisionKind::AngledBumper), 1);
    }

    #[test]
    fn test_spinner_debounced_while_spinning() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let mut rng = Pcg32::seed_from_u64(3);
        let mut spinner = Spinner::new(Vec2::new(200.0, 320.0));
        let mut ball = ball_at(200.0, 345.0, Vec2::new(0.0, -5.0));
        let before = ball.vel.length();

        assert!(check_spinner(&mut ball, &mut spinner, 0, &tuning, &mut rng, &mut log));
        assert!(spinner.spinning);
        assert_eq!(spinner.spin_speed, tuning.spinner.initial_speed);
        assert!(ball.vel.y > 0.0);
        assert!((ball.vel.length() - before * tuning.spinner.boost).abs() < 1e-3);

        ball.pos = Vec2::new(200.0, 330.0);
        assert!(!check_spinner(&mut ball, &mut spinner, 0, &tuning, &mut rng, &mut log));
        assert_eq!(log.count(CollisionKind::Spinner), 1);
    }

    #[test]
    fn test_ramp_keeps_energy() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let ramp = TableLayout::default().ramps[0].clone();
        let perp = ramp.segment.perpendicular().unwrap();
        let mid = (ramp.segment.a + ramp.segment.b) / 2.0;
        let mut ball = ball_at(0.0, 0.0, -perp * 4.0 + Vec2::new(1.0, 0.0));
        ball.pos = mid + perp * 10.0;
        let before = ball.vel.length();

        assert!(check_ramp(&mut ball, &ramp, 0, &tuning, &mut log));
        assert!(ball.vel.length() >= before);
        assert_eq!(log.awards, vec![tuning.scoring.ramp_hit]);
    }

    #[test]
    fn test_lane_bounce_loses_energy() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let layout = TableLayout::default();
        let lane = layout.lanes[0].clone();
        let mut ball = ball_at(50.0, 615.0, Vec2::new(-4.0, 2.0));
        let before = ball.vel.length();

        assert!(check_lane(&mut ball, &lane, 0, &layout.bounds.lane_bypass, &tuning, &mut log));
        assert!(ball.vel.length() <= before);
        assert!(ball.vel.x > 0.0);
        assert_eq!(log.awards, vec![tuning.scoring.outlane_hit]);
        assert_eq!(log.count(CollisionKind::Lane), 1);
    }

    #[test]
    fn test_lane_bypassed_in_launcher() {
        let tuning = Tuning::default();
        let layout = TableLayout::default();
        let lane = Lane {
            segment: Segment::new(Vec2::new(360.0, 500.0), Vec2::new(360.0, 700.0)),
            danger: false,
        };
        let mut ball = ball_at(366.0, 600.0, Vec2::new(0.0, -20.0));
        assert!(!check_lane(&mut ball, &lane, 0, &layout.bounds.lane_bypass, &tuning, &mut ()));
        assert_eq!(ball.pos, Vec2::new(366.0, 600.0));
    }

    #[test]
    fn test_lane_divider_is_silent() {
        let tuning = Tuning::default();
        let divider = TableLayout::default().lane_dividers[0].clone();
        let mut ball = ball_at(130.0, 136.0, Vec2::new(-3.0, 0.0));
        assert!(check_lane_divider(&mut ball, &divider, &tuning));
        assert!(ball.vel.x > 0.0);
        assert!(ball.vel.length() <= 3.0);
    }

    #[test]
    fn test_loop_entrance_arms_once() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let mut lp = TableLayout::default().loops[0].clone();
        let mut ball = ball_at(50.0, 360.0, Vec2::new(-3.0, -6.0));

        assert!(check_loop(&mut ball, &mut lp, 0, &tuning, &mut log));
        assert!(lp.active);

        ball.pos = Vec2::new(50.0, 360.0);
        ball.vel = Vec2::new(-3.0, -6.0);
        check_loop(&mut ball, &mut lp, 0, &tuning, &mut log);
        assert_eq!(log.count(CollisionKind::LoopEnter), 1);
        assert_eq!(log.awards, vec![tuning.scoring.loop_enter]);
    }

    #[test]
    fn test_lock_captures_until_full() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let mut signals = Vec::new();
        let mut lock = TableLayout::default().locks[0].clone();
        let ball = ball_at(310.0, 136.0, Vec2::ZERO);

        // Unlit locks ignore the ball
        assert!(!check_lock(&ball, &mut lock, 0, &tuning, &mut signals, &mut log));

        lock.active = true;
        assert!(check_lock(&ball, &mut lock, 0, &tuning, &mut signals, &mut log));
        assert!(signals.is_empty());
        assert!(check_lock(&ball, &mut lock, 0, &tuning, &mut signals, &mut log));
        assert_eq!(signals, vec![Signal::LockFull(0)]);
        assert!(!check_lock(&ball, &mut lock, 0, &tuning, &mut signals, &mut log));
        assert_eq!(log.count(CollisionKind::BallLocked), 2);
    }

    #[test]
    fn test_captive_ball_lights_locks() {
        let tuning = Tuning::default();
        let mut log = EventLog::new();
        let mut signals = Vec::new();
        let mut captive = TableLayout::default().captive_balls[0].clone();

        for _ in 0..tuning.captive.hits_to_light_lock {
            captive.offset = 0.0;
            let mut ball = ball_at(330.0, 314.0, Vec2::new(0.0, -5.0));
            assert!(check_captive_ball(&mut ball, &mut captive, 0, &tuning, &mut signals, &mut log));
            assert!(ball.vel.y > 0.0);
            assert!(captive.offset > 0.0 && captive.offset <= captive.travel);
        }
        assert_eq!(signals, vec![Signal::LightLocks]);
        assert_eq!(log.count(CollisionKind::CaptiveBallHit) as u32, tuning.captive.hits_to_light_lock);
    }

    #[test]
    fn test_captive_ignores_separating_ball() {
        let tuning = Tuning::default();
        let mut signals = Vec::new();
        let mut captive = TableLayout::default().captive_balls[0].clone();
        let mut ball = ball_at(330.0, 314.0, Vec2::new(0.0, 5.0));
        assert!(!check_captive_ball(&mut ball, &mut captive, 0, &tuning, &mut signals, &mut ()));
        assert_eq!(captive.hits, 0);
        // Left where it was, overlap and all
        assert_eq!(ball.pos, Vec2::new(330.0, 314.0));
        assert_eq!(ball.vel, Vec2::new(0.0, 5.0));
    }

    #[test]
    fn test_magnet_pulls_toward_centre() {
        let magnet = Magnet {
            center: Vec2::new(200.0, 530.0),
            radius: 50.0,
            strength: 0.2,
            active: true,
        };
        let mut ball = ball_at(225.0, 530.0, Vec2::ZERO);
        assert!(apply_magnet(&mut ball, &magnet));
        assert!((ball.vel.x + 0.1).abs() < 1e-5);

        let mut far = ball_at(300.0, 530.0, Vec2::ZERO);
        assert!(!apply_magnet(&mut far, &magnet));

        let off = Magnet {
            active: false,
            ..magnet
        };
        let mut ball = ball_at(225.0, 530.0, Vec2::ZERO);
        assert!(!apply_magnet(&mut ball, &off));
    }
}
