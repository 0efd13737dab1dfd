//! Exact overlap areas between a convex quad and a rectangle or circle.
//!
//! Boundary contacts are resolved with strict comparisons: a quad edge that
//! merely touches the other shape at a shared end point contributes no
//! intersection point, so shared vertices are never counted twice.

use std::f64::consts::PI;

use arrayvec::ArrayVec;
use glam::DVec2;

use super::{
    DRect, Quad, area_of_polygon, barycenter, point_inside_circle, point_inside_convex_polygon,
    point_inside_convex_quad, sort_clockwise,
};
use crate::kernel::DropKernel;

/// 8 edge crossings plus 4 vertices of each shape.
type Points = ArrayVec<DVec2, 16>;

#[inline]
fn can_segment_and_rect_intersect(p0: DVec2, p1: DVec2, r: &DRect) -> bool {
    let y_overlap = if p0.y < p1.y {
        p0.y < r.y1 && p1.y > r.y0
    } else {
        p1.y < r.y1 && p0.y > r.y0
    };
    let x_overlap = if p0.x < p1.x {
        p0.x < r.x1 && p1.x > r.x0
    } else {
        p1.x < r.x1 && p0.x > r.x0
    };
    y_overlap && x_overlap
}

fn intersect_segment_and_horizontal(points: &mut Points, a: DVec2, b: DVec2, x0: f64, y: f64, x1: f64) {
    if a.y == b.y {
        return;
    }
    if (a.y <= y && b.y <= y) || (a.y > y && b.y > y) {
        return;
    }
    if ((a.x == x0 || a.x == x1) && a.y == y) || ((b.x == x0 || b.x == x1) && b.y == y) {
        return;
    }

    let x = if a.x == b.x {
        a.x
    } else {
        let m = (b.y - a.y) / (b.x - a.x);
        (y - a.y + m * a.x) / m
    };
    if x > x0 && x < x1 {
        points.push(DVec2::new(x, y));
    }
}

fn intersect_segment_and_vertical(points: &mut Points, a: DVec2, b: DVec2, x: f64, y0: f64, y1: f64) {
    if a.x == b.x {
        return;
    }
    if (a.x <= x && b.x <= x) || (a.x > x && b.x > x) {
        return;
    }
    if ((a.y == y0 || a.y == y1) && a.x == x) || ((b.y == y0 || b.y == y1) && b.x == x) {
        return;
    }

    let y = if a.y == b.y {
        a.y
    } else {
        let m = (b.y - a.y) / (b.x - a.x);
        m * x + a.y - m * a.x
    };
    if y > y0 && y < y1 {
        points.push(DVec2::new(x, y));
    }
}

fn intersect_segment_and_rect(points: &mut Points, a: DVec2, b: DVec2, r: &DRect) {
    intersect_segment_and_horizontal(points, a, b, r.x0, r.y0, r.x1);
    intersect_segment_and_horizontal(points, a, b, r.x0, r.y1, r.x1);
    intersect_segment_and_vertical(points, a, b, r.x0, r.y0, r.y1);
    intersect_segment_and_vertical(points, a, b, r.x1, r.y0, r.y1);
}

/// Area of `quad ∩ rect`, or `None` when the intersection is empty.
///
/// With a kernel, returns the kernel's double integral over the intersection
/// instead, sampled from its lookup table at its current position.
pub fn area_of_intersection_of_quad_and_rect(
    rect: &DRect,
    quad: &Quad,
    kernel: Option<&DropKernel>,
) -> Option<f64> {
    let mut points = Points::new();

    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        if can_segment_and_rect_intersect(a, b, rect) {
            intersect_segment_and_rect(&mut points, a, b, rect);
        }
    }

    for &p in quad {
        if rect.contains(p) {
            points.push(p);
        }
    }

    for corner in [
        DVec2::new(rect.x0, rect.y0),
        DVec2::new(rect.x0, rect.y1),
        DVec2::new(rect.x1, rect.y0),
        DVec2::new(rect.x1, rect.y1),
    ] {
        if point_inside_convex_quad(corner, quad) {
            points.push(corner);
        }
    }

    if points.len() < 3 {
        return None;
    }
    if points.len() > 3 {
        let center = barycenter(&points);
        sort_clockwise(&mut points, center);
    }

    Some(match kernel {
        None => area_of_polygon(&points),
        Some(kernel) => kernel
            .samples()
            .filter(|&(p, _)| point_inside_convex_polygon(p, &points))
            .map(|(_, z)| z)
            .sum(),
    })
}

/// Interior of segment `a-b`, end points excluded. `p` must lie on the line.
#[inline]
fn collinear_point_in_segment(a: DVec2, b: DVec2, p: DVec2) -> bool {
    let d = b - a;
    let t = (p - a).dot(d) / d.length_squared();
    t > 0.0 && t < 1.0
}

/// Pushes both crossings of segment `p1-p2` with the circle, if any.
/// Tangent and exterior lines yield nothing.
fn intersect_segment_and_circle(points: &mut Points, p1: DVec2, p2: DVec2, center: DVec2, r2: f64) {
    let a = p1 - center;
    let b = p2 - center;
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let dr2 = dx * dx + dy * dy;
    let det = a.x * b.y - b.x * a.y;
    let discriminant = r2 * dr2 - det * det;
    if discriminant <= 0.0 {
        return;
    }

    let sd = discriminant.sqrt();
    let tx = if dy < 0.0 { -dx * sd } else { dx * sd };
    let ty = dy.abs() * sd;
    let q1 = DVec2::new((det * dy + tx) / dr2, (-det * dx + ty) / dr2);
    let q2 = DVec2::new((det * dy - tx) / dr2, (-det * dx - ty) / dr2);
    if collinear_point_in_segment(a, b, q1) {
        points.push(q1 + center);
    }
    if collinear_point_in_segment(a, b, q2) {
        points.push(q2 + center);
    }
}

/// Area of `quad ∩ circle(center, radius)`, or `None` when empty.
pub fn area_of_intersection_of_quad_and_circle(center: DVec2, radius: f64, quad: &Quad) -> Option<f64> {
    let r2 = radius * radius;
    let inside = quad.map(|p| point_inside_circle(p, center, r2));

    if inside.iter().all(|&v| v) {
        return Some(area_of_polygon(quad));
    }

    let mut points = Points::new();
    for i in 0..4 {
        intersect_segment_and_circle(&mut points, quad[i], quad[(i + 1) % 4], center, r2);
    }

    // Circular segments cut off by consecutive chords.
    let mut area = 0.0;
    if points.len() > 1 {
        sort_clockwise(&mut points, center);
        for pair in points.chunks_exact(2) {
            let chord = pair[0].distance(pair[1]);
            let theta = 2.0 * (chord / radius / 2.0).min(1.0).asin();
            area += r2 * (theta - theta.sin()) / 2.0;
        }
    }

    for (&p, &is_inside) in quad.iter().zip(&inside) {
        if is_inside {
            points.push(p);
        }
    }

    if points.len() < 3 {
        if point_inside_convex_quad(center, quad) {
            // Circle inside the quad, possibly minus one cut-off segment.
            return Some(PI * r2 - area);
        }
        // A single side cutting off a segment that excludes the center.
        return (area > 0.0).then_some(area);
    }

    let c = barycenter(&points);
    sort_clockwise(&mut points, c);
    Some(area + area_of_polygon(&points))
}
