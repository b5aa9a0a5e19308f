//! Geometry primitives for ball collisions
//!
//! Every obstacle on the table reduces to one of three shapes: a circle, a
//! thick line segment, or an axis-aligned rectangle. The helpers here find the
//! contact between the ball (a circle) and those shapes. Degenerate input
//! (zero-length segments, coincident centres) never divides by zero: it either
//! reports no contact or falls back to a caller-supplied direction.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Distances below this are treated as zero
pub const EPSILON: f32 = 1e-4;

/// Contact between the ball and a shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Closest point on the shape's core (segment, centre) to the ball centre
    pub point: Vec2,
    /// Unit normal pointing from the shape toward the ball centre
    pub normal: Vec2,
    /// Distance from `point` to the ball centre
    pub distance: f32,
    /// How far the ball must move along `normal` to clear the shape
    pub penetration: f32,
}

/// A line segment between two endpoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub a: Vec2,
    pub b: Vec2,
}

impl Segment {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    #[inline]
    pub fn direction(&self) -> Vec2 {
        self.b - self.a
    }

    pub fn length(&self) -> f32 {
        self.direction().length()
    }

    pub fn is_degenerate(&self) -> bool {
        !self.a.is_finite() || !self.b.is_finite() || self.direction().length_squared() < EPSILON
    }

    /// Closest point on the segment to `p` and its parameter t in [0, 1]
    ///
    /// Returns `None` for a zero-length segment.
    pub fn closest_point(&self, p: Vec2) -> Option<(Vec2, f32)> {
        let d = self.direction();
        let len_sq = d.length_squared();
        if len_sq < EPSILON {
            return None;
        }
        let t = ((p - self.a).dot(d) / len_sq).clamp(0.0, 1.0);
        Some((self.a + d * t, t))
    }

    /// Unit perpendicular (left-hand, `(-dy, dx)`), `None` if degenerate
    pub fn perpendicular(&self) -> Option<Vec2> {
        if self.is_degenerate() {
            return None;
        }
        let d = self.direction().normalize();
        Some(Vec2::new(-d.y, d.x))
    }

    /// Unit perpendicular oriented toward `toward`
    pub fn normal_toward(&self, toward: Vec2) -> Option<Vec2> {
        let n = self.perpendicular()?;
        if (toward - self.a).dot(n) >= 0.0 {
            Some(n)
        } else {
            Some(-n)
        }
    }

    /// Signed distance of `p` from the infinite line, positive on the `normal` side
    #[inline]
    pub fn signed_distance(&self, p: Vec2, normal: Vec2) -> f32 {
        (p - self.a).dot(normal)
    }
}

/// Axis-aligned rectangle (x, y is the top-left corner, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Side of a rectangle the ball was pushed out through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectSide {
    Left,
    Right,
    Top,
    Bottom,
}

impl RectSide {
    /// Outward unit normal of this side
    pub fn normal(self) -> Vec2 {
        match self {
            RectSide::Left => Vec2::NEG_X,
            RectSide::Right => Vec2::X,
            RectSide::Top => Vec2::NEG_Y,
            RectSide::Bottom => Vec2::Y,
        }
    }
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Bounding-box overlap between the rectangle and a circle
    pub fn overlaps_circle(&self, center: Vec2, radius: f32) -> bool {
        center.x + radius > self.x
            && center.x - radius < self.right()
            && center.y + radius > self.y
            && center.y - radius < self.bottom()
    }

    /// Side with the least penetration and its depth
    ///
    /// This is the side the ball most likely struck.
    pub fn least_penetration(&self, center: Vec2, radius: f32) -> (RectSide, f32) {
        let candidates = [
            (RectSide::Left, (center.x + radius) - self.x),
            (RectSide::Right, self.right() - (center.x - radius)),
            (RectSide::Top, (center.y + radius) - self.y),
            (RectSide::Bottom, self.bottom() - (center.y - radius)),
        ];
        candidates
            .into_iter()
            .fold((RectSide::Left, f32::MAX), |best, c| {
                if c.1 < best.1 { c } else { best }
            })
    }
}

/// Circle-circle contact
///
/// `fallback` is used as the normal when the centres coincide.
pub fn circle_circle(
    ball_pos: Vec2,
    ball_radius: f32,
    center: Vec2,
    radius: f32,
    fallback: Vec2,
) -> Option<Contact> {
    let delta = ball_pos - center;
    let dist = delta.length();
    let reach = ball_radius + radius;
    if dist >= reach {
        return None;
    }
    let normal = if dist < EPSILON {
        fallback.normalize_or(Vec2::NEG_Y)
    } else {
        delta / dist
    };
    Some(Contact {
        point: center,
        normal,
        distance: dist,
        penetration: reach - dist,
    })
}

/// Contact between the ball and a segment thickened by `half_width`
///
/// When the ball centre lies exactly on the segment the normal falls back to
/// the segment perpendicular, oriented against the ball's velocity.
pub fn circle_segment(
    ball_pos: Vec2,
    ball_radius: f32,
    ball_vel: Vec2,
    segment: &Segment,
    half_width: f32,
) -> Option<Contact> {
    let (closest, _) = segment.closest_point(ball_pos)?;
    let delta = ball_pos - closest;
    let dist = delta.length();
    let reach = ball_radius + half_width;
    if dist >= reach {
        return None;
    }
    let normal = if dist < EPSILON {
        let perp = segment.perpendicular()?;
        if ball_vel.dot(perp) > 0.0 { -perp } else { perp }
    } else {
        delta / dist
    };
    Some(Contact {
        point: closest,
        normal,
        distance: dist,
        penetration: reach - dist,
    })
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Rotate a vector by `angle` radians
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}

/// Unit vector at `angle` radians
#[inline]
pub fn direction(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}
