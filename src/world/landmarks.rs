//! Standard pitch markers seeded from field geometry
//!
//! Coordinates follow the server: origin at the centre spot, x toward the
//! right goal, y toward the bottom touchline (`t` = negative y).

use crate::core::config::FieldGeometry;
use crate::core::types::Point2;

/// Spacing of the boundary flags along the touchlines and goal lines
const BOUNDARY_MARKS: [f64; 5] = [10.0, 20.0, 30.0, 40.0, 50.0];
const GOAL_LINE_MARKS: [f64; 3] = [10.0, 20.0, 30.0];

/// Every flag and goal with its fixed position
pub fn standard_landmarks(geometry: &FieldGeometry) -> Vec<(String, Point2)> {
    let hl = geometry.length / 2.0;
    let hw = geometry.width / 2.0;
    let hg = geometry.goal_width / 2.0;
    let pa_x = hl - geometry.penalty_area_length;
    let hpa = geometry.penalty_area_width / 2.0;
    let off = geometry.boundary_offset;

    let mut marks: Vec<(String, Point2)> = vec![
        ("f c".into(), Point2::new(0.0, 0.0)),
        ("f c t".into(), Point2::new(0.0, -hw)),
        ("f c b".into(), Point2::new(0.0, hw)),
        ("f l t".into(), Point2::new(-hl, -hw)),
        ("f l b".into(), Point2::new(-hl, hw)),
        ("f r t".into(), Point2::new(hl, -hw)),
        ("f r b".into(), Point2::new(hl, hw)),
        ("g l".into(), Point2::new(-hl, 0.0)),
        ("g r".into(), Point2::new(hl, 0.0)),
        ("f g l t".into(), Point2::new(-hl, -hg)),
        ("f g l b".into(), Point2::new(-hl, hg)),
        ("f g r t".into(), Point2::new(hl, -hg)),
        ("f g r b".into(), Point2::new(hl, hg)),
        ("f p l t".into(), Point2::new(-pa_x, -hpa)),
        ("f p l c".into(), Point2::new(-pa_x, 0.0)),
        ("f p l b".into(), Point2::new(-pa_x, hpa)),
        ("f p r t".into(), Point2::new(pa_x, -hpa)),
        ("f p r c".into(), Point2::new(pa_x, 0.0)),
        ("f p r b".into(), Point2::new(pa_x, hpa)),
        ("f t 0".into(), Point2::new(0.0, -hw - off)),
        ("f b 0".into(), Point2::new(0.0, hw + off)),
        ("f l 0".into(), Point2::new(-hl - off, 0.0)),
        ("f r 0".into(), Point2::new(hl + off, 0.0)),
    ];

    for x in BOUNDARY_MARKS {
        marks.push((format!("f t l {}", x), Point2::new(-x, -hw - off)));
        marks.push((format!("f t r {}", x), Point2::new(x, -hw - off)));
        marks.push((format!("f b l {}", x), Point2::new(-x, hw + off)));
        marks.push((format!("f b r {}", x), Point2::new(x, hw + off)));
    }

    for y in GOAL_LINE_MARKS {
        marks.push((format!("f l t {}", y), Point2::new(-hl - off, -y)));
        marks.push((format!("f l b {}", y), Point2::new(-hl - off, y)));
        marks.push((format!("f r t {}", y), Point2::new(hl + off, -y)));
        marks.push((format!("f r b {}", y), Point2::new(hl + off, y)));
    }

    marks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_standard_count_and_unique_names() {
        let marks = standard_landmarks(&FieldGeometry::default());
        assert_eq!(marks.len(), 55);
        let names: HashSet<_> = marks.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names.len(), 55);
    }

    #[test]
    fn test_known_positions() {
        let marks = standard_landmarks(&FieldGeometry::default());
        let find = |name: &str| marks.iter().find(|(n, _)| n == name).unwrap().1;
        assert_eq!(find("g r"), Point2::new(52.5, 0.0));
        assert_eq!(find("f c t"), Point2::new(0.0, -34.0));
        assert_eq!(find("f t l 50"), Point2::new(-50.0, -39.0));
        assert_eq!(find("f r b 30"), Point2::new(57.5, 30.0));
        assert_eq!(find("f p l c"), Point2::new(-36.0, 0.0));
    }
}
