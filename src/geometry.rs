//! Document-space geometry for section boundaries.
//!
//! Sections are outlined by closed polygons in drawing coordinates. This
//! module validates candidate boundaries (vertex count, finiteness,
//! self-intersection) and answers containment queries used by automatic
//! membership:
//!
//! - Containment uses the even-odd ray-casting rule with a horizontal ray.
//! - Points on an edge or vertex count as inside: membership must not flip
//!   when a detection sits exactly on a drawn line.
//! - Self-intersection is checked pairwise over non-adjacent edges; a
//!   polygon that fails validation never replaces an existing boundary.
//!
//! Coordinates are `f64` document units (typically PDF points); tolerances
//! are absolute and sized for hand-drawn outlines, not survey data.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A location in document space.
pub type DocPoint = Point2<f64>;

/// Absolute tolerance for on-edge containment tests.
const EDGE_EPS: f64 = 1e-9;

/// Minimum number of vertices for a valid boundary.
const MIN_VERTICES: usize = 3;

/// Reasons a candidate boundary is rejected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GeometryError {
    TooFewPoints { found: usize, minimum: usize },
    NonFinitePoint { index: usize },
    NoSuchPoint { index: usize, len: usize },
    SelfIntersecting { edge_a: usize, edge_b: usize },
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::TooFewPoints { found, minimum } => {
                write!(f, "too few boundary points ({found} < {minimum})")
            }
            GeometryError::NonFinitePoint { index } => {
                write!(f, "boundary point {index} is not finite")
            }
            GeometryError::NoSuchPoint { index, len } => {
                write!(f, "no boundary point {index} (boundary has {len})")
            }
            GeometryError::SelfIntersecting { edge_a, edge_b } => {
                write!(f, "boundary edges {edge_a} and {edge_b} intersect")
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Validated closed polygon outlining a section.
///
/// The vertex sequence is stored as drawn; the closing edge from the last
/// vertex back to the first is implicit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DocPoint>", into = "Vec<DocPoint>")]
pub struct Boundary {
    points: Vec<DocPoint>,
}

impl Boundary {
    /// Validate and adopt a vertex sequence.
    pub fn new(points: Vec<DocPoint>) -> Result<Self, GeometryError> {
        if points.len() < MIN_VERTICES {
            return Err(GeometryError::TooFewPoints {
                found: points.len(),
                minimum: MIN_VERTICES,
            });
        }
        for (index, p) in points.iter().enumerate() {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(GeometryError::NonFinitePoint { index });
            }
        }
        if let Some((edge_a, edge_b)) = find_self_intersection(&points) {
            return Err(GeometryError::SelfIntersecting { edge_a, edge_b });
        }
        Ok(Self { points })
    }

    /// Axis-aligned rectangle helper, vertices in drawing order.
    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Result<Self, GeometryError> {
        Self::new(vec![
            DocPoint::new(x0, y0),
            DocPoint::new(x1, y0),
            DocPoint::new(x1, y1),
            DocPoint::new(x0, y1),
        ])
    }

    pub fn points(&self) -> &[DocPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Candidate with one vertex moved; the current boundary is untouched.
    pub fn with_moved_point(&self, index: usize, p: DocPoint) -> Result<Self, GeometryError> {
        let mut points = self.points.clone();
        if index >= points.len() {
            return Err(GeometryError::NoSuchPoint {
                index,
                len: points.len(),
            });
        }
        points[index] = p;
        Self::new(points)
    }

    /// Candidate with a vertex inserted at `index` (appended when at the end).
    pub fn with_inserted_point(&self, index: usize, p: DocPoint) -> Result<Self, GeometryError> {
        let mut points = self.points.clone();
        let index = index.min(points.len());
        points.insert(index, p);
        Self::new(points)
    }

    /// Even-odd containment test, boundary inclusive.
    pub fn contains(&self, p: DocPoint) -> bool {
        if self.on_boundary(p) {
            return true;
        }
        let mut inside = false;
        let n = self.points.len();
        let mut j = n - 1;
        for i in 0..n {
            let pi = self.points[i];
            let pj = self.points[j];
            if (pi.y > p.y) != (pj.y > p.y)
                && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// True when `p` lies on an edge or vertex within `EDGE_EPS`.
    fn on_boundary(&self, p: DocPoint) -> bool {
        let n = self.points.len();
        (0..n).any(|i| {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            point_on_segment(p, a, b)
        })
    }
}

impl TryFrom<Vec<DocPoint>> for Boundary {
    type Error = GeometryError;

    fn try_from(points: Vec<DocPoint>) -> Result<Self, Self::Error> {
        Boundary::new(points)
    }
}

impl From<Boundary> for Vec<DocPoint> {
    fn from(boundary: Boundary) -> Self {
        boundary.points
    }
}

/// Signed twice-area of the triangle `a`, `b`, `c`.
fn cross(a: DocPoint, b: DocPoint, c: DocPoint) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn point_on_segment(p: DocPoint, a: DocPoint, b: DocPoint) -> bool {
    if cross(a, b, p).abs() > EDGE_EPS * (1.0 + (b - a).norm()) {
        return false;
    }
    let min_x = a.x.min(b.x) - EDGE_EPS;
    let max_x = a.x.max(b.x) + EDGE_EPS;
    let min_y = a.y.min(b.y) - EDGE_EPS;
    let max_y = a.y.max(b.y) + EDGE_EPS;
    p.x >= min_x && p.x <= max_x && p.y >= min_y && p.y <= max_y
}

/// Proper or touching intersection between segments `a0a1` and `b0b1`.
fn segments_intersect(a0: DocPoint, a1: DocPoint, b0: DocPoint, b1: DocPoint) -> bool {
    let d1 = cross(b0, b1, a0);
    let d2 = cross(b0, b1, a1);
    let d3 = cross(a0, a1, b0);
    let d4 = cross(a0, a1, b1);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1.abs() <= EDGE_EPS && point_on_segment(a0, b0, b1))
        || (d2.abs() <= EDGE_EPS && point_on_segment(a1, b0, b1))
        || (d3.abs() <= EDGE_EPS && point_on_segment(b0, a0, a1))
        || (d4.abs() <= EDGE_EPS && point_on_segment(b1, a0, a1))
}

/// First pair of non-adjacent edges that cross, if any.
fn find_self_intersection(points: &[DocPoint]) -> Option<(usize, usize)> {
    let n = points.len();
    for i in 0..n {
        let a0 = points[i];
        let a1 = points[(i + 1) % n];
        for j in (i + 1)..n {
            // Skip the shared-vertex neighbours, including the wrap-around pair.
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            let b0 = points[j];
            let b1 = points[(j + 1) % n];
            if segments_intersect(a0, a1, b0, b1) {
                return Some((i, j));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Boundary {
        Boundary::rect(0.0, 0.0, 10.0, 10.0).unwrap()
    }

    #[test]
    fn rejects_degenerate_vertex_counts() {
        let err = Boundary::new(vec![DocPoint::new(0.0, 0.0), DocPoint::new(1.0, 0.0)]);
        assert_eq!(
            err,
            Err(GeometryError::TooFewPoints {
                found: 2,
                minimum: 3
            })
        );
    }

    #[test]
    fn rejects_non_finite_vertices() {
        let err = Boundary::new(vec![
            DocPoint::new(0.0, 0.0),
            DocPoint::new(f64::NAN, 1.0),
            DocPoint::new(1.0, 1.0),
        ]);
        assert_eq!(err, Err(GeometryError::NonFinitePoint { index: 1 }));
    }

    #[test]
    fn rejects_bowtie_polygon() {
        let err = Boundary::new(vec![
            DocPoint::new(0.0, 0.0),
            DocPoint::new(10.0, 10.0),
            DocPoint::new(10.0, 0.0),
            DocPoint::new(0.0, 10.0),
        ]);
        assert!(matches!(err, Err(GeometryError::SelfIntersecting { .. })));
    }

    #[test]
    fn contains_interior_and_excludes_exterior() {
        let b = square();
        assert!(b.contains(DocPoint::new(5.0, 5.0)));
        assert!(!b.contains(DocPoint::new(15.0, 5.0)));
        assert!(!b.contains(DocPoint::new(-0.1, 5.0)));
    }

    #[test]
    fn boundary_points_count_as_inside() {
        let b = square();
        assert!(b.contains(DocPoint::new(0.0, 5.0)), "edge point");
        assert!(b.contains(DocPoint::new(10.0, 10.0)), "vertex");
    }

    #[test]
    fn concave_polygon_containment() {
        // L-shape: notch cut out of the top-right quadrant.
        let b = Boundary::new(vec![
            DocPoint::new(0.0, 0.0),
            DocPoint::new(10.0, 0.0),
            DocPoint::new(10.0, 5.0),
            DocPoint::new(5.0, 5.0),
            DocPoint::new(5.0, 10.0),
            DocPoint::new(0.0, 10.0),
        ])
        .unwrap();
        assert!(b.contains(DocPoint::new(2.0, 8.0)));
        assert!(!b.contains(DocPoint::new(8.0, 8.0)), "inside the notch");
    }

    #[test]
    fn edit_candidates_leave_original_untouched() {
        let b = square();
        let moved = b.with_moved_point(0, DocPoint::new(-5.0, -5.0)).unwrap();
        assert_ne!(b, moved);
        assert_eq!(b.points()[0], DocPoint::new(0.0, 0.0));

        // Moving a vertex so the outline crosses itself is rejected.
        let err = b.with_moved_point(0, DocPoint::new(20.0, 5.0));
        assert!(matches!(err, Err(GeometryError::SelfIntersecting { .. })));
    }
}
