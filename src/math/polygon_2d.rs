use super::distance_2d::point_to_segment_dist;
use super::{cross, Point2, EPSILON};

/// Computes the signed area of a closed ring (shoelace formula).
///
/// Positive for counter-clockwise, negative for clockwise.
#[must_use]
pub fn signed_area_2d(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum * 0.5
}

/// Length of a closed ring including the closing edge.
#[must_use]
pub fn ring_perimeter(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| (points[(i + 1) % n] - points[i]).norm()).sum()
}

/// Length of an open polyline.
#[must_use]
pub fn polyline_length(points: &[Point2]) -> f64 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}

/// Area-weighted centroid of a closed ring. Falls back to the vertex
/// average for degenerate (zero-area) rings.
#[must_use]
pub fn ring_centroid(points: &[Point2]) -> Point2 {
    let n = points.len();
    if n == 0 {
        return Point2::origin();
    }
    let area = signed_area_2d(points);
    if area.abs() < EPSILON {
        #[allow(clippy::cast_precision_loss)]
        let inv_n = 1.0 / n as f64;
        let (sx, sy) = points.iter().fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
        return Point2::new(sx * inv_n, sy * inv_n);
    }
    let (mut cx, mut cy) = (0.0, 0.0);
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let f = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * f;
        cy += (a.y + b.y) * f;
    }
    Point2::new(cx / (6.0 * area), cy / (6.0 * area))
}

/// Classification of a point relative to a closed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointClassification {
    Inside,
    Outside,
    OnBoundary,
}

/// Even-odd ray cast against a set of rings, without a boundary band.
#[must_use]
pub fn point_in_rings_strict(p: &Point2, rings: &[&[Point2]]) -> bool {
    let mut inside = false;
    for ring in rings {
        let n = ring.len();
        if n < 3 {
            continue;
        }
        let mut j = n - 1;
        for i in 0..n {
            let (a, b) = (ring[i], ring[j]);
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
    }
    inside
}

/// Classifies a point against a set of rings (outer boundaries and holes)
/// using the even-odd rule. Points within `tolerance` of any edge are
/// reported as [`PointClassification::OnBoundary`].
#[must_use]
pub fn classify_point_in_rings(p: &Point2, rings: &[&[Point2]], tolerance: f64) -> PointClassification {
    for ring in rings {
        let n = ring.len();
        for i in 0..n {
            if point_to_segment_dist(p, &ring[i], &ring[(i + 1) % n]) <= tolerance {
                return PointClassification::OnBoundary;
            }
        }
    }
    if point_in_rings_strict(p, rings) {
        PointClassification::Inside
    } else {
        PointClassification::Outside
    }
}

/// Returns the ring oriented counter-clockwise (`ccw = true`) or clockwise.
#[must_use]
pub fn oriented(points: &[Point2], ccw: bool) -> Vec<Point2> {
    let area = signed_area_2d(points);
    if (area >= 0.0) == ccw {
        points.to_vec()
    } else {
        points.iter().rev().copied().collect()
    }
}

/// Rotates a closed ring so it starts at the leftmost vertex (smallest x),
/// breaking ties by smallest y. Ensures deterministic output for tests.
#[must_use]
pub fn rotate_to_canonical_start(points: &[Point2], tolerance: f64) -> Vec<Point2> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let mut best = 0;
    for (i, pt) in points.iter().enumerate().skip(1) {
        let b = &points[best];
        if pt.x < b.x - tolerance || (pt.x - b.x).abs() <= tolerance && pt.y < b.y {
            best = i;
        }
    }
    let mut rotated = Vec::with_capacity(points.len());
    rotated.extend_from_slice(&points[best..]);
    rotated.extend_from_slice(&points[..best]);
    rotated
}

/// Removes consecutive near-duplicates (including the wrap-around pair)
/// and collinear vertices from a closed ring.
///
/// Never reduces below 3 vertices: returns the de-duplicated ring instead.
#[must_use]
pub fn clean_ring(points: &[Point2], tolerance: f64) -> Vec<Point2> {
    let deduped = dedup_ring(points, tolerance);
    if deduped.len() < 3 {
        return deduped;
    }

    let n = deduped.len();
    let mut cleaned = Vec::with_capacity(n);
    for i in 0..n {
        let prev = deduped[if i == 0 { n - 1 } else { i - 1 }];
        let next = deduped[(i + 1) % n];
        let chord = next - prev;
        let chord_len = chord.norm();
        let dev = if chord_len < EPSILON {
            (deduped[i] - prev).norm()
        } else {
            cross(&chord, &(deduped[i] - prev)).abs() / chord_len
        };
        // Keep corners and back-tracking spikes; only straight pass-through
        // vertices are dropped here.
        let forward = (deduped[i] - prev).dot(&(next - deduped[i])) > 0.0;
        if dev > tolerance || !forward {
            cleaned.push(deduped[i]);
        }
    }

    if cleaned.len() < 3 {
        return deduped;
    }
    cleaned
}

/// Removes consecutive near-duplicate vertices from a closed ring.
#[must_use]
pub fn dedup_ring(points: &[Point2], tolerance: f64) -> Vec<Point2> {
    let mut deduped: Vec<Point2> = Vec::with_capacity(points.len());
    for &pt in points {
        if let Some(last) = deduped.last() {
            if (pt - last).norm() <= tolerance {
                continue;
            }
        }
        deduped.push(pt);
    }
    while deduped.len() > 1 {
        let first = deduped[0];
        let last = deduped[deduped.len() - 1];
        if (last - first).norm() <= tolerance {
            deduped.pop();
        } else {
            break;
        }
    }
    deduped
}
