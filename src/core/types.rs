//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Simulation cycle counter as carried in server messages
pub type Cycle = u32;

/// Field-relative position.
///
/// x grows toward the right goal, y grows toward the bottom touchline.
pub type Point2 = glam::DVec2;

/// Which half the team defends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum Side {
    #[display(fmt = "l")]
    Left,
    #[display(fmt = "r")]
    Right,
}

impl Side {
    /// Parse the single-letter side token used by the server
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "l" => Some(Side::Left),
            "r" => Some(Side::Right),
            _ => None,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Angle in degrees, always kept in (-180, 180]
///
/// Angles are clockwise-positive, matching the server's y-down field frame.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub fn new(degrees: f64) -> Self {
        Self(normalize_degrees(degrees))
    }

    pub fn degrees(&self) -> f64 {
        self.0
    }

    pub fn radians(&self) -> f64 {
        self.0.to_radians()
    }

    /// Signed shortest rotation from `self` to `other`
    pub fn delta(&self, other: Angle) -> Angle {
        Angle::new(other.0 - self.0)
    }

    /// Bearing of `to` as seen from `from`
    pub fn bearing(from: Point2, to: Point2) -> Angle {
        let d = to - from;
        Angle::new(d.y.atan2(d.x).to_degrees())
    }

    /// Unit vector pointing along this angle
    pub fn unit(&self) -> Point2 {
        let r = self.radians();
        Point2::new(r.cos(), r.sin())
    }

    /// Circular mean of a set of angles; `None` when empty or perfectly cancelling
    pub fn circular_mean(angles: impl IntoIterator<Item = Angle>) -> Option<Angle> {
        let sum = angles
            .into_iter()
            .fold(Point2::ZERO, |acc, a| acc + a.unit());
        if sum.length_squared() < 1e-12 {
            return None;
        }
        Some(Angle::new(sum.y.atan2(sum.x).to_degrees()))
    }
}

impl std::ops::Add for Angle {
    type Output = Angle;
    fn add(self, rhs: Angle) -> Angle {
        Angle::new(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Angle {
    type Output = Angle;
    fn sub(self, rhs: Angle) -> Angle {
        Angle::new(self.0 - rhs.0)
    }
}

impl std::fmt::Display for Angle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}°", self.0)
    }
}

/// Normalize degrees into (-180, 180]; non-finite input maps to 0
pub fn normalize_degrees(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let mut d = degrees % 360.0;
    if d <= -180.0 {
        d += 360.0;
    } else if d > 180.0 {
        d -= 360.0;
    }
    d
}
