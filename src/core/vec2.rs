//! 2D Vector
//!
//! Screen-space tile centres. Board adjacency, the FMJ line test and
//! Polar Attraction slot matching are all derived from these positions.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// 2D vector with `f64` components (pixels).
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Scale by a scalar.
    #[inline]
    pub fn scale(self, scalar: f64) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    /// Squared length (avoids sqrt - prefer this for comparisons).
    #[inline]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    #[inline]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Dot product with another vector.
    #[inline]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Angle of the vector from `origin` to `self`, in radians `(-π, π]`.
    #[inline]
    pub fn angle_from(self, origin: Self) -> f64 {
        (self.y - origin.y).atan2(self.x - origin.x)
    }

    /// Projection parameter and perpendicular distance of `self` onto the
    /// segment `a -> b`.
    ///
    /// `t = 0` is `a`, `t = 1` is `b`. A degenerate segment projects to `t = 0`.
    pub fn project_onto_segment(self, a: Self, b: Self) -> (f64, f64) {
        let ab = b - a;
        let len_sq = ab.length_squared();
        let len_sq = if len_sq == 0.0 { 1.0 } else { len_sq };
        let t = (self - a).dot(ab) / len_sq;
        let foot = a + ab.scale(t);
        (t, self.distance(foot))
    }
}

/// Smallest absolute difference between two angles, in `[0, π]`.
#[inline]
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let d = (a - b).abs();
    if d > std::f64::consts::PI {
        2.0 * std::f64::consts::PI - d
    } else {
        d
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({:.3}, {:.3})", self.x, self.y)
    }
}

// =============================================================================
// TESTS
// =============================================================================
