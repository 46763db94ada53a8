//! Point-in-polygon testing.
//!
//! [`contains`] uses ray casting: a horizontal ray is cast from the point
//! towards +x and edge crossings are counted; an odd count means inside.
//!
//! # Boundary policy
//!
//! - A point on an edge or vertex counts as **inside**. This is checked before
//!   any crossing is counted, so it does not depend on edge order.
//! - Horizontal edges never count as crossings. A point level with a horizontal
//!   edge but not on it is decided by the neighbouring non-horizontal edges.
//! - Each non-horizontal edge covers the half-open y-range `[min_y, max_y)`, so
//!   a vertex lying exactly on the ray is counted once where the boundary
//!   passes through it and zero or two times where it only touches the ray.
//!
//! The result does not depend on winding order.

use crate::models::Point;

/// Maximum distance from an edge at which a point is treated as on it.
pub const BOUNDARY_EPSILON: f64 = 1e-9;

/// Returns true if `point` lies inside or on the boundary of `polygon`.
///
/// The polygon is implicitly closed. Polygons with fewer than three vertices
/// contain nothing; the zone registry rejects those before they get here.
pub fn contains(point: Point, polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut prev = polygon[n - 1];
    for &curr in polygon {
        if on_segment(point, prev, curr) {
            return true;
        }

        if prev.y != curr.y {
            let (lo, hi) = if prev.y < curr.y {
                (prev, curr)
            } else {
                (curr, prev)
            };
            if point.y >= lo.y && point.y < hi.y {
                let x_cross = lo.x + (point.y - lo.y) * (hi.x - lo.x) / (hi.y - lo.y);
                if point.x < x_cross {
                    inside = !inside;
                }
            }
        }

        prev = curr;
    }

    inside
}

/// Returns true if `point` lies on the closed segment `a`-`b`.
pub fn on_segment(point: Point, a: Point, b: Point) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length = (dx * dx + dy * dy).sqrt();

    if length == 0.0 {
        return (point.x - a.x).abs() <= BOUNDARY_EPSILON
            && (point.y - a.y).abs() <= BOUNDARY_EPSILON;
    }

    // Perpendicular distance from the supporting line.
    let cross = dx * (point.y - a.y) - dy * (point.x - a.x);
    if cross.abs() / length > BOUNDARY_EPSILON {
        return false;
    }

    point.x >= a.x.min(b.x) - BOUNDARY_EPSILON
        && point.x <= a.x.max(b.x) + BOUNDARY_EPSILON
        && point.y >= a.y.min(b.y) - BOUNDARY_EPSILON
        && point.y <= a.y.max(b.y) + BOUNDARY_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn poly(points: &[(f64, f64)]) -> Vec<Point> {
        points.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    fn square() -> Vec<Point> {
        poly(&[(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)])
    }

    /// Winding number reference, used only off the boundary.
    fn winding_number(point: Point, polygon: &[Point]) -> i32 {
        let is_left = |a: Point, b: Point, p: Point| {
            (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y)
        };
        let mut wn = 0;
        for i in 0..polygon.len() {
            let a = polygon[i];
            let b = polygon[(i + 1) % polygon.len()];
            if a.y <= point.y {
                if b.y > point.y && is_left(a, b, point) > 0.0 {
                    wn += 1;
                }
            } else if b.y <= point.y && is_left(a, b, point) < 0.0 {
                wn -= 1;
            }
        }
        wn
    }

    fn distance_to_boundary(point: Point, polygon: &[Point]) -> f64 {
        let mut best = f64::INFINITY;
        for i in 0..polygon.len() {
            let a = polygon[i];
            let b = polygon[(i + 1) % polygon.len()];
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            let len2 = dx * dx + dy * dy;
            let t = if len2 == 0.0 {
                0.0
            } else {
                (((point.x - a.x) * dx + (point.y - a.y) * dy) / len2).clamp(0.0, 1.0)
            };
            let (px, py) = (a.x + t * dx, a.y + t * dy);
            best = best.min(((point.x - px).powi(2) + (point.y - py).powi(2)).sqrt());
        }
        best
    }

    #[test]
    fn test_interior_and_exterior_points() {
        let zone = square();
        assert!(contains(Point::new(10.0, 10.0), &zone));
        assert!(!contains(Point::new(30.0, 10.0), &zone));
        assert!(!contains(Point::new(-1.0, 10.0), &zone));
        assert!(!contains(Point::new(10.0, 25.0), &zone));
    }

    #[test]
    fn test_boundary_points_are_inside() {
        let zone = square();
        for p in [
            Point::new(0.0, 10.0),  // left edge
            Point::new(20.0, 10.0), // right edge
            Point::new(10.0, 0.0),  // bottom (horizontal) edge
            Point::new(10.0, 20.0), // top (horizontal) edge
            Point::new(0.0, 0.0),   // vertex
            Point::new(20.0, 20.0), // vertex
        ] {
            assert!(contains(p, &zone), "{:?} should be inside", p);
            // Same answer on repeated calls and for reversed winding.
            assert!(contains(p, &zone));
            let reversed: Vec<Point> = zone.iter().rev().copied().collect();
            assert!(contains(p, &reversed));
        }
    }

    #[test]
    fn test_ray_through_vertex_counts_once() {
        // Diamond: the ray from (0, 0) passes exactly through the vertex (10, 0).
        let diamond = poly(&[(0.0, -10.0), (10.0, 0.0), (0.0, 10.0), (-10.0, 0.0)]);
        assert!(contains(Point::new(0.0, 0.0), &diamond));
        assert!(!contains(Point::new(-20.0, 0.0), &diamond));
        assert!(!contains(Point::new(20.0, 0.0), &diamond));
    }

    #[test]
    fn test_ray_touching_vertex_does_not_toggle() {
        // Triangle whose apex touches the ray from the outside point.
        let triangle = poly(&[(10.0, 0.0), (15.0, 5.0), (20.0, 0.0)]);
        assert!(!contains(Point::new(0.0, 5.0), &triangle));
    }

    #[test]
    fn test_ray_collinear_with_horizontal_edge() {
        // U-shape with a horizontal edge at y = 10 to the right of the test point.
        let shape = poly(&[
            (0.0, 0.0),
            (30.0, 0.0),
            (30.0, 20.0),
            (20.0, 20.0),
            (20.0, 10.0),
            (10.0, 10.0),
            (10.0, 20.0),
            (0.0, 20.0),
        ]);
        assert!(contains(Point::new(5.0, 10.0), &shape));
        assert!(!contains(Point::new(15.0, 15.0), &shape));
        assert!(!contains(Point::new(-5.0, 10.0), &shape));
        assert!(contains(Point::new(25.0, 10.0), &shape));
    }

    #[test]
    fn test_degenerate_polygons_contain_nothing() {
        assert!(!contains(Point::new(0.0, 0.0), &[]));
        assert!(!contains(
            Point::new(0.0, 0.0),
            &poly(&[(0.0, 0.0), (1.0, 1.0)])
        ));
    }

    #[test]
    fn test_concave_polygon() {
        let arrow = poly(&[(0.0, 0.0), (10.0, 5.0), (0.0, 10.0), (4.0, 5.0)]);
        assert!(contains(Point::new(6.0, 5.0), &arrow));
        assert!(!contains(Point::new(2.0, 5.0), &arrow));
    }

    fn convex_polygon() -> impl Strategy<Value = Vec<Point>> {
        (
            -100.0..100.0f64,
            -100.0..100.0f64,
            1.0..50.0f64,
            prop::collection::btree_set(0u16..3600, 3..12),
            any::<bool>(),
        )
            .prop_map(|(cx, cy, r, angles, clockwise)| {
                let mut points: Vec<Point> = angles
                    .into_iter()
                    .map(|a| {
                        let theta = (a as f64 / 10.0).to_radians();
                        Point::new(cx + r * theta.cos(), cy + r * theta.sin())
                    })
                    .collect();
                if clockwise {
                    points.reverse();
                }
                points
            })
    }

    proptest! {
        #[test]
        fn prop_agrees_with_winding_number_off_boundary(
            polygon in convex_polygon(),
            gx in 0usize..21,
            gy in 0usize..21,
        ) {
            let min_x = polygon.iter().map(|p| p.x).fold(f64::INFINITY, f64::min) - 5.0;
            let max_x = polygon.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max) + 5.0;
            let min_y = polygon.iter().map(|p| p.y).fold(f64::INFINITY, f64::min) - 5.0;
            let max_y = polygon.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max) + 5.0;
            let point = Point::new(
                min_x + (max_x - min_x) * gx as f64 / 20.0,
                min_y + (max_y - min_y) * gy as f64 / 20.0,
            );

            prop_assume!(distance_to_boundary(point, &polygon) > 1e-6);
            prop_assert_eq!(contains(point, &polygon), winding_number(point, &polygon) != 0);
        }

        #[test]
        fn prop_vertices_and_edge_midpoints_are_inside(polygon in convex_polygon()) {
            for i in 0..polygon.len() {
                let a = polygon[i];
                let b = polygon[(i + 1) % polygon.len()];
                let mid = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
                prop_assert!(contains(a, &polygon));
                prop_assert!(contains(mid, &polygon));
            }
        }
    }
}
