//! Boundary and wall resolution
//!
//! Checks run in priority order: launcher chute, hard safety boundary, rounded
//! corners, straight walls, guardrails, then a last-resort clamp. The first
//! two return early so a hard correction is never followed by a second one in
//! the same substep.

use glam::Vec2;

use super::events::{CollisionEvent, CollisionKind, EventSink, ObstacleRef};
use super::geometry::{EPSILON, reflect};
use super::state::Ball;
use super::table::TableBounds;
use crate::tuning::WallTuning;

/// What [`check_walls`] did this substep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallOutcome {
    /// Nothing touched
    Clear,
    /// Ball held by the launcher chute
    Chute,
    /// Hard safety boundary corrected the ball
    HardBoundary,
    /// Ball pushed back onto a rounded corner
    Corner,
    /// A straight wall, guardrail or the backstop corrected the ball
    Resolved,
}

impl WallOutcome {
    /// Obstacle checks are skipped for the rest of the substep
    pub fn skips_obstacles(self) -> bool {
        matches!(self, WallOutcome::Chute | WallOutcome::HardBoundary)
    }
}

fn emit_wall<S: EventSink + ?Sized>(sink: &mut S, ball: &Ball, normal: Vec2) {
    sink.collision(&CollisionEvent {
        kind: CollisionKind::Wall,
        pos: ball.pos,
        normal,
        obstacle: ObstacleRef::Wall,
        ball_id: ball.id,
    });
}

/// Keep the ball between the chute walls
fn constrain_to_chute(ball: &mut Ball, bounds: &TableBounds, restitution: f32) {
    let r = ball.radius();
    let chute = &bounds.chute;
    if ball.pos.x - r < chute.left {
        ball.pos.x = chute.left + r;
        ball.vel.x = ball.vel.x.abs() * restitution;
    }
    if ball.pos.x + r > chute.right {
        ball.pos.x = chute.right - r;
        ball.vel.x = -ball.vel.x.abs() * restitution;
    }
}

/// Resolve the ball against the table boundary
pub fn check_walls<S: EventSink + ?Sized>(
    ball: &mut Ball,
    bounds: &TableBounds,
    tuning: &WallTuning,
    sink: &mut S,
) -> WallOutcome {
    let r = ball.radius();
    let chute = &bounds.chute;
    let in_chute_x = chute.contains_x(ball.pos.x);

    if !ball.launched {
        if in_chute_x && ball.pos.y >= chute.top {
            constrain_to_chute(ball, bounds, tuning.chute_restitution);
            // Rest on the plunger
            if ball.pos.y + r > chute.bottom {
                ball.pos.y = chute.bottom - r;
                ball.vel.y = 0.0;
            }
            return WallOutcome::Chute;
        }
        if ball.pos.x < bounds.unlaunched_min_x {
            ball.pos.x = bounds.unlaunched_min_x;
            ball.vel.x = ball.vel.x.abs() * tuning.backstop_damping;
        }
    }

    if ball.launched && ball.vel.y < 0.0 {
        // Bend the ball onto the playfield as it leaves the chute
        if (ball.pos.y - chute.top).abs() < tuning.chute_exit_band {
            ball.vel.x -= tuning.chute_exit_curve;
        }
        if in_chute_x && ball.pos.y > chute.top && ball.pos.y < chute.bottom {
            constrain_to_chute(ball, bounds, tuning.chute_restitution);
            return WallOutcome::Chute;
        }
    }

    // Hard safety boundary
    let mut hard = false;
    if ball.pos.x < bounds.hard_left() + r {
        ball.pos.x = bounds.hard_left() + r;
        ball.vel.x = ball.vel.x.abs() * tuning.hard_restitution;
        emit_wall(sink, ball, Vec2::X);
        hard = true;
    }
    if ball.pos.x > bounds.hard_right() - r {
        ball.pos.x = bounds.hard_right() - r;
        ball.vel.x = -ball.vel.x.abs() * tuning.hard_restitution;
        emit_wall(sink, ball, Vec2::NEG_X);
        hard = true;
    }
    if ball.pos.y < bounds.hard_top() + r {
        ball.pos.y = bounds.hard_top() + r;
        ball.vel.y = ball.vel.y.abs() * tuning.hard_restitution;
        emit_wall(sink, ball, Vec2::Y);
        hard = true;
    }
    if hard {
        return WallOutcome::HardBoundary;
    }

    if resolve_corners(ball, bounds, tuning) {
        return WallOutcome::Corner;
    }

    let mut outcome = WallOutcome::Clear;

    // Straight walls
    let left_corner = bounds.left_corner_center();
    let right_corner = bounds.right_corner_center();
    if ball.pos.y > left_corner.y && ball.pos.x - r < bounds.left_x {
        ball.pos.x = bounds.left_x + r;
        ball.vel.x = ball.vel.x.abs() * tuning.wall_restitution;
        outcome = WallOutcome::Resolved;
    }
    // The launcher lane below the chute top has its own walls
    let in_launcher_lane =
        ball.pos.x >= chute.left - 10.0 && ball.pos.x <= chute.right + 10.0 && ball.pos.y >= chute.top;
    if ball.pos.y > right_corner.y && ball.pos.x + r > bounds.right_x && !in_launcher_lane {
        ball.pos.x = bounds.right_x - r;
        ball.vel.x = -ball.vel.x.abs() * tuning.wall_restitution;
        outcome = WallOutcome::Resolved;
    }
    if ball.pos.y - r < bounds.top_y && ball.pos.x >= left_corner.x && ball.pos.x <= right_corner.x {
        ball.pos.y = bounds.top_y + r;
        ball.vel.y = ball.vel.y.abs() * tuning.wall_restitution;
        outcome = WallOutcome::Resolved;
    }

    if resolve_guardrails(ball, bounds, tuning) {
        outcome = WallOutcome::Resolved;
    }

    if backstop(ball, bounds, tuning) {
        log::debug!("Ball {} escaped the playfield, clamped back", ball.id);
        outcome = WallOutcome::Resolved;
    }

    outcome
}

/// Push the ball back onto a rounded top corner
///
/// A corner is a quarter circle: the playable area is the disc of radius
/// `corner_radius - ball radius` around the corner centre, within the
/// corner's quadrant.
fn resolve_corners(ball: &mut Ball, bounds: &TableBounds, tuning: &WallTuning) -> bool {
    let limit = bounds.corner_radius - ball.radius();
    // Non-finite positions are left to the backstop
    if limit <= 0.0 || !ball.pos.is_finite() {
        return false;
    }

    let corners = [
        (bounds.left_corner_center(), -1.0_f32, false),
        (bounds.right_corner_center(), 1.0_f32, true),
    ];
    for (center, x_side, is_right) in corners {
        let delta = ball.pos - center;
        if delta.x * x_side < 0.0 || delta.y > 0.0 {
            continue;
        }
        let dist = delta.length();
        // Inside the playable disc is fine; only leaving it is corrected
        if dist <= limit {
            continue;
        }
        let normal = if dist < EPSILON {
            Vec2::new(x_side, -1.0).normalize()
        } else {
            delta / dist
        };
        ball.pos = center + normal * limit;

        // Moving outward, into the curve
        if ball.vel.dot(normal) > 0.0 {
            ball.vel = reflect(ball.vel, normal) * tuning.corner_restitution;
            if is_right && ball.vel.y < tuning.corner_drop_threshold {
                ball.vel.y += tuning.corner_drop_kick;
            }
        }
        return true;
    }
    false
}

/// Angled rails funnelling the ball toward the flippers
fn resolve_guardrails(ball: &mut Ball, bounds: &TableBounds, tuning: &WallTuning) -> bool {
    let r = ball.radius();
    let mut touched = false;

    for rail in &bounds.guardrails {
        // Rails on the launcher side leave the chute alone
        if rail.a.x.max(rail.b.x) > bounds.chute.left && ball.pos.x >= bounds.chute.left {
            continue;
        }
        let Some((_, t)) = rail.closest_point(ball.pos) else {
            continue;
        };
        if t <= 0.0 || t >= 1.0 {
            continue;
        }
        let Some(normal) = rail.normal_toward(bounds.interior) else {
            continue;
        };
        let s = rail.signed_distance(ball.pos, normal);
        if s.is_nan() || s >= r {
            continue;
        }

        ball.pos += normal * (r - s);
        if ball.vel.dot(normal) < 0.0 {
            ball.vel = reflect(ball.vel, normal) * tuning.guardrail_restitution;
        }
        ball.vel += normal * tuning.anti_stick;
        touched = true;
    }
    touched
}

/// Last-resort clamp for a ball found outside the visible walls
fn backstop(ball: &mut Ball, bounds: &TableBounds, tuning: &WallTuning) -> bool {
    let r = ball.radius();
    let m = bounds.backstop_margin;
    let escaped = ball.pos.x < bounds.left_x - m
        || ball.pos.x > bounds.right_x + m
        || ball.pos.y < bounds.top_y - m
        || !ball.pos.is_finite();
    if !escaped {
        return false;
    }
    if !ball.pos.is_finite() {
        ball.pos = bounds.interior;
    }
    // max/min rather than clamp: a table narrower than the ball must not panic
    ball.pos.x = ball.pos.x.max(bounds.left_x + r).min(bounds.right_x - r);
    ball.pos.y = ball.pos.y.max(bounds.top_y + r);
    ball.vel.x *= tuning.backstop_damping;
    ball.vel.y = ball.vel.y.abs() * tuning.backstop_damping;
    true
}
