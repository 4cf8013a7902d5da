use crate::math::intersect_2d::segment_segment_intersect_2d;
use crate::math::polygon_2d::{clean_ring, signed_area_2d};
use crate::math::Point2;

/// Parameter distance from a segment end below which a hit counts as an endpoint.
const END_EPS: f64 = 1e-9;

/// Removes local loops from an open offset polyline.
///
/// At the first crossing of two non-adjacent segments `i < j`, everything
/// between them is cut out and the crossing point is kept. Repeats until the
/// polyline is simple. Returns the trimmed points and the number of loops cut.
pub(super) fn trim_open_loops(points: &[Point2]) -> (Vec<Point2>, usize) {
    let mut pts = points.to_vec();
    let mut trimmed = 0;
    while let Some((i, j, hit)) = first_open_crossing(&pts) {
        let mut next = Vec::with_capacity(pts.len());
        next.extend_from_slice(&pts[..=i]);
        next.push(hit);
        next.extend_from_slice(&pts[j + 1..]);
        pts = next;
        trimmed += 1;
    }
    (pts, trimmed)
}

fn first_open_crossing(points: &[Point2]) -> Option<(usize, usize, Point2)> {
    let n = points.len();
    if n < 4 {
        return None;
    }
    for i in 0..n - 1 {
        for j in (i + 2)..n - 1 {
            if let Some((pt, t, u)) =
                segment_segment_intersect_2d(&points[i], &points[i + 1], &points[j], &points[j + 1], 0.0)
            {
                let t_at_end = t < END_EPS || t > 1.0 - END_EPS;
                let u_at_end = u < END_EPS || u > 1.0 - END_EPS;
                if t_at_end && u_at_end {
                    continue;
                }
                return Some((i, j, pt));
            }
        }
    }
    None
}

/// Recursively removes self-intersection loops from a closed ring.
///
/// At each self-intersection, splits into two sub-rings, trims both, and
/// keeps the one whose winding matches `winding_sign` (`+1` CCW, `-1` CW).
/// Loops from collapsed features wind the other way and are discarded.
/// Each split strictly reduces the vertex count, so recursion terminates.
pub(super) fn trim_closed_loops(points: &[Point2], winding_sign: f64, tolerance: f64) -> Vec<Point2> {
    let pts = clean_ring(points, tolerance * 1e-3);
    if pts.len() < 4 {
        return pts;
    }
    match first_closed_crossing(&pts) {
        None => pts,
        Some((i, j, hit)) => {
            let (a, b) = split_at(&pts, i, j, hit);
            let a = trim_closed_loops(&a, winding_sign, tolerance);
            let b = trim_closed_loops(&b, winding_sign, tolerance);
            let (area_a, area_b) = (signed_area_2d(&a), signed_area_2d(&b));
            match (area_a * winding_sign > 0.0, area_b * winding_sign > 0.0) {
                (true, false) => a,
                (false, true) => b,
                _ if area_a.abs() >= area_b.abs() => a,
                _ => b,
            }
        }
    }
}

fn first_closed_crossing(points: &[Point2]) -> Option<(usize, usize, Point2)> {
    let n = points.len();
    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if let Some((pt, t, u)) = segment_segment_intersect_2d(
                &points[i],
                &points[(i + 1) % n],
                &points[j],
                &points[(j + 1) % n],
                0.0,
            ) {
                let t_at_end = t < END_EPS || t > 1.0 - END_EPS;
                let u_at_end = u < END_EPS || u > 1.0 - END_EPS;
                if t_at_end && u_at_end {
                    continue;
                }
                return Some((i, j, pt));
            }
        }
    }
    None
}

/// Splits a ring at the crossing of segments `i < j` into
/// `[hit, P(i+1)..=P(j)]` and `[hit, P(j+1)..=P(i)]` (wrapping).
fn split_at(points: &[Point2], i: usize, j: usize, hit: Point2) -> (Vec<Point2>, Vec<Point2>) {
    let n = points.len();
    let mut a = Vec::with_capacity(j - i + 1);
    a.push(hit);
    a.extend_from_slice(&points[i + 1..=j]);

    let mut b = Vec::with_capacity(n - (j - i) + 1);
    b.push(hit);
    let mut idx = (j + 1) % n;
    loop {
        b.push(points[idx]);
        if idx == i {
            break;
        }
        idx = (idx + 1) % n;
    }
    (a, b)
}
