use super::{Point2, EPSILON};

/// Returns the closest point on segment `a`→`b` to `p`, together with its
/// parameter `t` in `[0, 1]`.
#[must_use]
pub fn closest_point_on_segment(p: &Point2, a: &Point2, b: &Point2) -> (Point2, f64) {
    let d = b - a;
    let len_sq = d.norm_squared();
    if len_sq < EPSILON {
        return (*a, 0.0);
    }
    let t = ((p - a).dot(&d) / len_sq).clamp(0.0, 1.0);
    (a + d * t, t)
}

/// Returns the minimum distance from `p` to the segment `a`→`b`.
///
/// Projects the point onto the segment, clamping to the endpoints. Falls back
/// to point-to-point distance for zero-length segments.
#[must_use]
pub fn point_to_segment_dist(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    let (closest, _) = closest_point_on_segment(p, a, b);
    (p - closest).norm()
}

/// Perpendicular distance from `p` to the infinite line through `a` and `b`.
#[must_use]
pub fn point_to_line_dist(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    let d = b - a;
    let len = d.norm();
    if len < EPSILON {
        return (p - a).norm();
    }
    super::cross(&d, &(p - a)).abs() / len
}

/// Closest location on an open polyline: `(distance, segment_index, t, point)`.
///
/// Returns `None` for polylines with fewer than 2 points.
#[must_use]
pub fn closest_on_polyline(p: &Point2, points: &[Point2]) -> Option<(f64, usize, f64, Point2)> {
    let mut best: Option<(f64, usize, f64, Point2)> = None;
    for (i, w) in points.windows(2).enumerate() {
        let (q, t) = closest_point_on_segment(p, &w[0], &w[1]);
        let d = (p - q).norm();
        if best.map_or(true, |(bd, ..)| d < bd) {
            best = Some((d, i, t, q));
        }
    }
    best
}

/// Minimum distance from `p` to any edge of a closed ring.
#[must_use]
pub fn point_to_ring_dist(p: &Point2, ring: &[Point2]) -> f64 {
    let n = ring.len();
    if n == 0 {
        return f64::INFINITY;
    }
    if n == 1 {
        return (p - ring[0]).norm();
    }
    (0..n)
        .map(|i| point_to_segment_dist(p, &ring[i], &ring[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}
