//! Circle intersection and multilateration
//!
//! Pure functions over distance constraints. Degenerate configurations
//! (disjoint, nested or coincident circles) yield no points rather than an
//! arbitrary pick.

use crate::core::types::{Angle, Point2};

/// Absolute tolerance used for the tangency comparisons, scaled by the radii
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircleRelation {
    /// Negative or non-finite input
    Degenerate,
    Disjoint,
    Contained,
    Identical,
    ExternallyTangent,
    InternallyTangent,
    Intersecting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intersection {
    None,
    One(Point2),
    Two(Point2, Point2),
}

impl Intersection {
    pub fn points(&self) -> Vec<Point2> {
        match *self {
            Intersection::None => vec![],
            Intersection::One(p) => vec![p],
            Intersection::Two(p, q) => vec![p, q],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Intersection::None => 0,
            Intersection::One(_) => 1,
            Intersection::Two(..) => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn classify(c0: Point2, r0: f64, c1: Point2, r1: f64) -> CircleRelation {
    if !(c0.is_finite() && c1.is_finite() && r0.is_finite() && r1.is_finite())
        || r0 < 0.0
        || r1 < 0.0
    {
        return CircleRelation::Degenerate;
    }

    let d = c0.distance(c1);
    let tol = EPSILON * (1.0 + r0 + r1);
    let sum = r0 + r1;
    let diff = (r0 - r1).abs();

    if d <= tol && diff <= tol {
        CircleRelation::Identical
    } else if d > sum + tol {
        CircleRelation::Disjoint
    } else if (d - sum).abs() <= tol {
        CircleRelation::ExternallyTangent
    } else if d < diff - tol {
        CircleRelation::Contained
    } else if (d - diff).abs() <= tol {
        CircleRelation::InternallyTangent
    } else {
        CircleRelation::Intersecting
    }
}

/// Intersection points of two circles
pub fn circle_intersect(c0: Point2, r0: f64, c1: Point2, r1: f64) -> Intersection {
    let relation = classify(c0, r0, c1, r1);
    match relation {
        CircleRelation::Degenerate
        | CircleRelation::Disjoint
        | CircleRelation::Contained
        | CircleRelation::Identical => Intersection::None,
        CircleRelation::ExternallyTangent | CircleRelation::InternallyTangent => {
            let d = c0.distance(c1);
            let dir = (c1 - c0) / d;
            // r0 along the centre line, reversed when c0's circle sits inside c1's
            let along = if relation == CircleRelation::InternallyTangent && r0 < r1 {
                -r0
            } else {
                r0
            };
            Intersection::One(c0 + dir * along)
        }
        CircleRelation::Intersecting => {
            let d = c0.distance(c1);
            let dir = (c1 - c0) / d;
            let a = (r0 * r0 - r1 * r1 + d * d) / (2.0 * d);
            let mid = c0 + dir * a;
            let h = (r0 * r0 - a * a).max(0.0).sqrt();
            let perp = dir.perp();
            Intersection::Two(mid + perp * h, mid - perp * h)
        }
    }
}

/// Result of resolving a position from landmark distances
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fix {
    NoFix,
    Unique(Point2),
    /// Two landmarks leave a mirror ambiguity for the caller to settle
    Ambiguous(Point2, Point2),
}

impl Fix {
    /// Settle an ambiguous fix with a continuity prior (nearest to last known position)
    pub fn nearest_to(self, prior: Option<Point2>) -> Option<Point2> {
        match self {
            Fix::NoFix => None,
            Fix::Unique(p) => Some(p),
            Fix::Ambiguous(p, q) => {
                let prior = prior?;
                if p.distance_squared(prior) <= q.distance_squared(prior) {
                    Some(p)
                } else {
                    Some(q)
                }
            }
        }
    }
}

/// Perpendicular spread below which landmark centres count as one line
const COLLINEAR_TOLERANCE: f64 = 1e-6;

/// Relative gap under which two consensus totals count as equal
const TIE_TOLERANCE: f64 = 1e-6;

/// Resolve an unknown position from `(landmark, distance)` pairs
///
/// Three or more pairs: every pairwise intersection is a candidate and the
/// one with the smallest summed distance to all other candidates wins.
/// When every landmark lies on one line the distances cannot tell the two
/// sides of that line apart, so the result is the winning candidate and
/// its mirror image.
pub fn multilaterate(observations: &[(Point2, f64)]) -> Fix {
    match observations {
        [] | [_] => Fix::NoFix,
        [(c0, r0), (c1, r1)] => match circle_intersect(*c0, *r0, *c1, *r1) {
            Intersection::None => Fix::NoFix,
            Intersection::One(p) => Fix::Unique(p),
            Intersection::Two(p, q) => Fix::Ambiguous(p, q),
        },
        _ => {
            let mut candidates = Vec::new();
            for (i, (c0, r0)) in observations.iter().enumerate() {
                for (c1, r1) in &observations[i + 1..] {
                    candidates.extend(circle_intersect(*c0, *r0, *c1, *r1).points());
                }
            }
            match common_line(observations) {
                Some((origin, dir)) => mirrored_consensus(&candidates, origin, dir.perp()),
                None => settle(&candidates),
            }
        }
    }
}

/// Point and unit direction of the line through every centre, if there is one
fn common_line(observations: &[(Point2, f64)]) -> Option<(Point2, Point2)> {
    let origin = observations.first()?.0;
    let far = observations
        .iter()
        .map(|(c, _)| *c)
        .max_by(|a, b| a.distance_squared(origin).total_cmp(&b.distance_squared(origin)))?;
    let dir = (far - origin).try_normalize()?;
    observations
        .iter()
        .all(|(c, _)| dir.perp_dot(*c - origin).abs() <= COLLINEAR_TOLERANCE)
        .then_some((origin, dir))
}

/// Consensus with every candidate folded onto one side of the line
fn mirrored_consensus(candidates: &[Point2], origin: Point2, normal: Point2) -> Fix {
    let reflect = |p: Point2| p - normal * (2.0 * normal.dot(p - origin));
    let folded: Vec<Point2> = candidates
        .iter()
        .map(|&p| if normal.dot(p - origin) < 0.0 { reflect(p) } else { p })
        .collect();

    match consensus(&folded) {
        None => Fix::NoFix,
        Some(p) if normal.dot(p - origin) <= COLLINEAR_TOLERANCE => Fix::Unique(p),
        Some(p) => Fix::Ambiguous(p, reflect(p)),
    }
}

fn summed_distances(candidates: &[Point2]) -> impl Iterator<Item = (Point2, f64)> + '_ {
    candidates.iter().map(move |&p| {
        let total: f64 = candidates.iter().map(|&q| p.distance(q)).sum();
        (p, total)
    })
}

/// Candidate minimizing the total distance to all other candidates
pub fn consensus(candidates: &[Point2]) -> Option<Point2> {
    summed_distances(candidates)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(p, _)| p)
}

/// Consensus that refuses to break a tie between two distinct points
///
/// Happens when only one pair of circles meets, leaving its two
/// intersections equally supported.
fn settle(candidates: &[Point2]) -> Fix {
    let totals: Vec<(Point2, f64)> = summed_distances(candidates).collect();
    let Some(&(best, best_total)) = totals.iter().min_by(|a, b| a.1.total_cmp(&b.1)) else {
        return Fix::NoFix;
    };
    let tie = TIE_TOLERANCE * (1.0 + best_total);
    let rival = totals
        .iter()
        .find(|(p, total)| total - best_total <= tie && p.distance(best) > TIE_TOLERANCE);
    match rival {
        Some(&(other, _)) => Fix::Ambiguous(best, other),
        None => Fix::Unique(best),
    }
}

/// Place a relative sighting in field coordinates
pub fn project(origin: Point2, facing: Angle, distance: f64, direction: Angle) -> Point2 {
    origin + (facing + direction).unit() * distance
}
