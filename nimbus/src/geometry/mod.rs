//! Plane geometry for drop overlap computation.
//!
//! Points are `glam::DVec2`. Quads are convex and may be listed in either
//! clockwise or counter-clockwise order.

mod intersection;

use glam::DVec2;

pub use intersection::{area_of_intersection_of_quad_and_circle, area_of_intersection_of_quad_and_rect};

/// Four corners of a convex quadrilateral, in boundary order.
pub type Quad = [DVec2; 4];

/// Axis-aligned rectangle with `x0 <= x1`, `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl DRect {
    #[inline]
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    #[inline]
    pub fn top_left(&self) -> DVec2 {
        DVec2::new(self.x0, self.y0)
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        DVec2::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Inclusive containment test.
    #[inline]
    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.x0 && p.x <= self.x1 && p.y >= self.y0 && p.y <= self.y1
    }

    /// True if a non-empty intersection with `other` can exist.
    #[inline]
    pub fn can_intersect(&self, other: &DRect) -> bool {
        other.x0 < self.x1 && other.x1 > self.x0 && other.y0 < self.y1 && other.y1 > self.y0
    }

    /// Smallest rectangle containing every point, grown by `margin` on all sides.
    pub fn bounding(points: &[DVec2], margin: f64) -> Self {
        let (min, max) = points.iter().fold(
            (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
            |(min, max), &p| (min.min(p), max.max(p)),
        );
        Self::new(min.x - margin, min.y - margin, max.x + margin, max.y + margin)
    }
}

/// Shoelace area. Points must be sorted around a common location; the
/// result is positive for either orientation.
pub fn area_of_polygon(points: &[DVec2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut s = 0.0;
    let mut j = n - 1;
    for i in 0..n {
        s += (points[j].x + points[i].x) * (points[j].y - points[i].y);
        j = i;
    }
    s.abs() / 2.0
}

pub fn barycenter(points: &[DVec2]) -> DVec2 {
    debug_assert!(!points.is_empty());
    points.iter().copied().sum::<DVec2>() / points.len() as f64
}

/// Clockwise ordering around `center` in image coordinates (y down).
///
/// Points right of the vertical through `center` come first. Collinear
/// points are ordered by distance to the center, x first, then y.
#[inline]
fn precedes_clockwise(a: DVec2, b: DVec2, center: DVec2) -> bool {
    if a.x >= center.x {
        if b.x < center.x {
            return true;
        }
    } else if b.x >= center.x {
        return false;
    }

    let d = (a.x - center.x) * (b.y - center.y) - (b.x - center.x) * (a.y - center.y);
    if d != 0.0 {
        return d < 0.0;
    }

    let dxa = a.x - center.x;
    let dxb = b.x - center.x;
    if dxa != dxb {
        return dxa.abs() < dxb.abs();
    }
    (a.y - center.y).abs() < (b.y - center.y).abs()
}

/// Sorts `points` clockwise around `center`.
///
/// Insertion sort; the predicate is not a strict weak ordering for
/// degenerate point sets.
pub fn sort_clockwise(points: &mut [DVec2], center: DVec2) {
    for i in 1..points.len() {
        let p = points[i];
        let mut j = i;
        while j > 0 && precedes_clockwise(p, points[j - 1], center) {
            points[j] = points[j - 1];
            j -= 1;
        }
        points[j] = p;
    }
}

/// Consistent-sign cross product test. Boundary points count as inside.
pub fn point_inside_convex_polygon(p: DVec2, polygon: &[DVec2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let side = |a: DVec2, b: DVec2| (b.x - p.x) * (a.y - p.y) - (a.x - p.x) * (b.y - p.y) < 0.0;
    let s = side(polygon[0], polygon[1]);
    for i in 1..n - 1 {
        if side(polygon[i], polygon[i + 1]) != s {
            return false;
        }
    }
    side(polygon[n - 1], polygon[0]) == s
}

/// Point in convex quad, either orientation.
pub fn point_inside_convex_quad(p: DVec2, quad: &Quad) -> bool {
    let q0 = quad[0] - p;
    let q1 = quad[1] - p;
    let q2 = quad[2] - p;
    let q3 = quad[3] - p;
    if q1.x * q0.y - q0.x * q1.y < 0.0 {
        q2.x * q1.y - q1.x * q2.y < 0.0
            && q3.x * q2.y - q2.x * q3.y < 0.0
            && q0.x * q3.y - q3.x * q0.y < 0.0
    } else {
        q2.x * q1.y - q1.x * q2.y >= 0.0
            && q3.x * q2.y - q2.x * q3.y >= 0.0
            && q0.x * q3.y - q3.x * q0.y >= 0.0
    }
}

#[inline]
pub fn point_inside_circle(p: DVec2, center: DVec2, radius_squared: f64) -> bool {
    p.distance_squared(center) <= radius_squared
}
