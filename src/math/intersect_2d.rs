use super::distance_2d::closest_point_on_segment;
use super::{cross, Point2, Vector2, EPSILON};

/// Parametric 2D line-line intersection.
///
/// Given lines `p1 + t * d1` and `p2 + u * d2`, returns `(t, u)` if not parallel.
/// Parallelism is judged on the sine of the angle between the directions.
#[must_use]
pub fn line_line_intersect_2d(
    p1: &Point2,
    d1: &Vector2,
    p2: &Point2,
    d2: &Vector2,
) -> Option<(f64, f64)> {
    let denom = cross(d1, d2);
    let scale = d1.norm() * d2.norm();
    if scale < EPSILON || (denom / scale).abs() < 1e-9 {
        return None;
    }
    let d = p2 - p1;
    let t = cross(&d, d2) / denom;
    let u = cross(&d, d1) / denom;
    Some((t, u))
}

/// Intersection point of two infinite lines, or `None` when parallel.
#[must_use]
pub fn line_line_point(p1: &Point2, d1: &Vector2, p2: &Point2, d2: &Vector2) -> Option<Point2> {
    line_line_intersect_2d(p1, d1, p2, d2).map(|(t, _)| point_at(p1, d1, t))
}

/// Bounded segment-segment intersection in 2D.
///
/// Returns `(intersection_point, t, u)` where `t` and `u` are in `[0, 1]`.
/// Endpoints are included when they lie within `tolerance` (in model units)
/// of the other segment. Parallel segments return `None`; use
/// [`segment_contacts`] when collinear overlaps matter.
#[must_use]
pub fn segment_segment_intersect_2d(
    a0: &Point2,
    a1: &Point2,
    b0: &Point2,
    b1: &Point2,
    tolerance: f64,
) -> Option<(Point2, f64, f64)> {
    let da = a1 - a0;
    let db = b1 - b0;
    let (t, u) = line_line_intersect_2d(a0, &da, b0, &db)?;

    let eps_a = tolerance / da.norm().max(EPSILON);
    let eps_b = tolerance / db.norm().max(EPSILON);
    if t >= -eps_a && t <= 1.0 + eps_a && u >= -eps_b && u <= 1.0 + eps_b {
        let t_clamped = t.clamp(0.0, 1.0);
        Some((point_at(a0, &da, t_clamped), t_clamped, u.clamp(0.0, 1.0)))
    } else {
        None
    }
}

/// A contact between two segments: a point on both, with its parameter on each.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentContact {
    pub point: Point2,
    pub t: f64,
    pub u: f64,
}

/// All contacts between segments `a` and `b` within `tolerance`.
///
/// Crossing segments produce one contact. Collinear overlapping segments
/// produce the overlap endpoints (each endpoint of one segment that lies on
/// the other). An endpoint within `tolerance` of the other segment's interior
/// produces a contact at that endpoint, so T-touches are reported exactly.
#[must_use]
pub fn segment_contacts(
    a0: &Point2,
    a1: &Point2,
    b0: &Point2,
    b1: &Point2,
    tolerance: f64,
) -> Vec<SegmentContact> {
    let mut contacts: Vec<SegmentContact> = Vec::new();
    let mut push = |c: SegmentContact| {
        if !contacts
            .iter()
            .any(|e| (e.point - c.point).norm() <= tolerance)
        {
            contacts.push(c);
        }
    };

    // Endpoint-on-segment contacts take priority: they keep existing vertices exact.
    for (p, on_a) in [(a0, true), (a1, true), (b0, false), (b1, false)] {
        let (s0, s1) = if on_a { (b0, b1) } else { (a0, a1) };
        let (q, param) = closest_point_on_segment(p, s0, s1);
        if (p - q).norm() <= tolerance {
            let own = if std::ptr::eq(p, a0) || std::ptr::eq(p, b0) { 0.0 } else { 1.0 };
            let (t, u) = if on_a { (own, param) } else { (param, own) };
            push(SegmentContact { point: *p, t, u });
        }
    }

    if let Some((point, t, u)) = segment_segment_intersect_2d(a0, a1, b0, b1, tolerance) {
        push(SegmentContact { point, t, u });
    }

    contacts
}

/// Linear interpolation: `origin + dir * t`.
#[must_use]
pub fn point_at(origin: &Point2, dir: &Vector2, t: f64) -> Point2 {
    origin + dir * t
}

/// True when any two non-adjacent segments of the open polyline intersect.
#[must_use]
pub fn polyline_self_intersects(points: &[Point2], tolerance: f64) -> bool {
    let n = points.len();
    if n < 4 {
        return false;
    }
    let seg_count = n - 1;
    for i in 0..seg_count {
        for j in (i + 2)..seg_count {
            if segments_cross(&points[i], &points[i + 1], &points[j], &points[j + 1], tolerance) {
                return true;
            }
        }
    }
    false
}

/// Counts intersecting pairs of non-adjacent edges in a closed ring.
#[must_use]
pub fn ring_self_intersections(ring: &[Point2], tolerance: f64) -> usize {
    let n = ring.len();
    if n < 4 {
        return 0;
    }
    let mut count = 0;
    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if segments_cross(&ring[i], &ring[(i + 1) % n], &ring[j], &ring[(j + 1) % n], tolerance)
            {
                count += 1;
            }
        }
    }
    count
}

/// Proper crossing or touching of two segments, ignoring shared endpoints.
fn segments_cross(a0: &Point2, a1: &Point2, b0: &Point2, b1: &Point2, tolerance: f64) -> bool {
    let shared = |p: &Point2| (p - b0).norm() <= tolerance || (p - b1).norm() <= tolerance;
    if let Some((pt, _, _)) = segment_segment_intersect_2d(a0, a1, b0, b1, tolerance) {
        // Endpoint-to-endpoint touches are where a closed outline revisits a vertex.
        let at_a_end = (pt - a0).norm() <= tolerance || (pt - a1).norm() <= tolerance;
        return !(at_a_end && shared(&pt));
    }
    // Collinear overlap: parallel but sharing a stretch longer than tolerance.
    let da = a1 - a0;
    let len = da.norm();
    if len < EPSILON {
        return false;
    }
    let off_b0 = cross(&da, &(b0 - a0)).abs() / len;
    let off_b1 = cross(&da, &(b1 - a0)).abs() / len;
    if off_b0 > tolerance || off_b1 > tolerance {
        return false;
    }
    let dir = da / len;
    let (s0, s1) = ((b0 - a0).dot(&dir), (b1 - a0).dot(&dir));
    let (lo, hi) = (s0.min(s1).max(0.0), s0.max(s1).min(len));
    hi - lo > tolerance
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    #[test]
    fn crossing_segments_meet_at_center() {
        let (pt, t, u) =
            segment_segment_intersect_2d(&p(0.0, 0.0), &p(2.0, 2.0), &p(0.0, 2.0), &p(2.0, 0.0), 1e-9)
                .unwrap();
        assert!((pt - p(1.0, 1.0)).norm() < 1e-12);
        assert!((t - 0.5).abs() < 1e-12 && (u - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tolerance_extends_endpoints() {
        // b stops 0.05 short of a.
        let a = (p(0.0, 0.0), p(10.0, 0.0));
        let b = (p(5.0, 0.05), p(5.0, 5.0));
        assert!(segment_segment_intersect_2d(&a.0, &a.1, &b.0, &b.1, 0.01).is_none());
        assert!(segment_segment_intersect_2d(&a.0, &a.1, &b.0, &b.1, 0.1).is_some());
    }

    #[test]
    fn collinear_overlap_reports_both_inner_endpoints() {
        let contacts =
            segment_contacts(&p(0.0, 0.0), &p(10.0, 0.0), &p(4.0, 0.0), &p(14.0, 0.0), 1e-6);
        assert_eq!(contacts.len(), 2, "{contacts:?}");
        assert!(contacts.iter().any(|c| (c.point - p(4.0, 0.0)).norm() < 1e-9));
        assert!(contacts.iter().any(|c| (c.point - p(10.0, 0.0)).norm() < 1e-9));
    }

    #[test]
    fn t_touch_keeps_exact_endpoint() {
        let contacts =
            segment_contacts(&p(0.0, 0.0), &p(10.0, 0.0), &p(3.0, 0.0005), &p(3.0, 5.0), 1e-3);
        assert_eq!(contacts.len(), 1);
        assert!((contacts[0].point - p(3.0, 0.0005)).norm() < 1e-12);
        assert!((contacts[0].t - 0.3).abs() < 1e-9);
        assert!(contacts[0].u.abs() < 1e-12);
    }

    #[test]
    fn bowtie_ring_self_intersects_once() {
        let ring = [p(0.0, 0.0), p(2.0, 2.0), p(2.0, 0.0), p(0.0, 2.0)];
        assert_eq!(ring_self_intersections(&ring, 1e-9), 1);
        let square = [p(0.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(0.0, 2.0)];
        assert_eq!(ring_self_intersections(&square, 1e-9), 0);
    }

    #[test]
    fn zigzag_polyline_crossing_detected() {
        let crossing = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 5.0), p(5.0, -5.0)];
        assert!(polyline_self_intersects(&crossing, 1e-9));
        let clean = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 5.0), p(0.0, 5.0)];
        assert!(!polyline_self_intersects(&clean, 1e-9));
    }
}
