use crate::geometry::Point;
use crate::math::{cross, EPSILON};

/// Collapses consecutive vertices closer than `tolerance`, including the
/// closing pair. Returns the ring and how many vertices were merged.
pub(super) fn merge_duplicates(ring: &[Point], tolerance: f64, closed: bool) -> (Vec<Point>, usize) {
    let mut out: Vec<Point> = Vec::with_capacity(ring.len());
    for p in ring {
        if out.last().is_some_and(|last| last.equals(p, tolerance)) {
            continue;
        }
        out.push(*p);
    }
    if closed {
        while out.len() > 1 && out[0].equals(&out[out.len() - 1], tolerance) {
            out.pop();
        }
    }
    let merged = ring.len() - out.len();
    (out, merged)
}

/// Drops vertices that end a segment shorter than `threshold`. A ring is
/// never reduced below three vertices; such rings are returned unchanged.
pub(super) fn remove_micro_segments(ring: &[Point], threshold: f64) -> (Vec<Point>, usize) {
    let mut out: Vec<Point> = Vec::with_capacity(ring.len());
    for p in ring {
        match out.last() {
            Some(last) if last.distance_to(p) < threshold => {}
            _ => out.push(*p),
        }
    }
    while out.len() > 1 && out[0].distance_to(&out[out.len() - 1]) < threshold {
        out.pop();
    }
    if out.len() < 3 {
        return (ring.to_vec(), 0);
    }
    let removed = ring.len() - out.len();
    (out, removed)
}

/// A vertex where the boundary doubles back on itself, enclosing no area.
fn is_spike(prev: &Point, v: &Point, next: &Point, tolerance: f64) -> bool {
    let d_in = v.position() - prev.position();
    let d_out = next.position() - v.position();
    let len = d_in.norm().max(d_out.norm());
    if len <= EPSILON || d_in.dot(&d_out) >= 0.0 {
        return false;
    }
    cross(&d_in, &d_out).abs() / len <= tolerance
}

/// Removes zero-area back-tracking vertices until none are left, merging
/// any duplicates a removal exposes. Returns the spike count.
pub(super) fn remove_spikes(ring: &[Point], tolerance: f64) -> (Vec<Point>, usize) {
    let mut out = ring.to_vec();
    let mut spikes = 0;
    loop {
        let n = out.len();
        if n < 4 {
            break;
        }
        let found = (0..n).find(|&i| is_spike(&out[(i + n - 1) % n], &out[i], &out[(i + 1) % n], tolerance));
        match found {
            Some(i) => {
                out.remove(i);
                spikes += 1;
                out = merge_duplicates(&out, tolerance, true).0;
            }
            None => break,
        }
    }
    (out, spikes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn merges_consecutive_and_closing_duplicates() {
        let r = ring(&[(0.0, 0.0), (0.001, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 0.0005)]);
        let (out, merged) = merge_duplicates(&r, 0.01, true);
        assert_eq!(merged, 2);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn open_polylines_keep_their_closing_vertex() {
        let r = ring(&[(0.0, 0.0), (10.0, 0.0), (0.0, 0.0)]);
        assert_eq!(merge_duplicates(&r, 0.01, false).1, 0);
    }

    #[test]
    fn micro_segment_vertex_is_dropped() {
        let r = ring(&[(0.0, 0.0), (1000.0, 0.0), (1000.0, 0.05), (1000.0, 100.0), (0.0, 100.0)]);
        let (out, removed) = remove_micro_segments(&r, 0.1);
        assert_eq!(removed, 1);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn tiny_ring_is_left_alone() {
        let r = ring(&[(0.0, 0.0), (0.05, 0.0), (0.0, 0.05)]);
        let (out, removed) = remove_micro_segments(&r, 0.1);
        assert_eq!(removed, 0);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn backtracking_vertex_is_a_spike() {
        let r = ring(&[
            (0.0, 0.0),
            (1000.0, 0.0),
            (1000.0, 100.0),
            (600.0, 100.0),
            (300.0, 100.0),
            (500.0, 100.0),
            (0.0, 100.0),
        ]);
        let (out, spikes) = remove_spikes(&r, 0.01);
        assert_eq!(spikes, 1);
        assert_eq!(out.len(), 6);
        assert!(out.iter().all(|p| (p.x() - 300.0).abs() > 1.0));
    }

    #[test]
    fn rectangle_has_no_spikes() {
        let r = ring(&[(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)]);
        assert_eq!(remove_spikes(&r, 0.01).1, 0);
    }
}
