use crate::math::distance_2d::point_to_segment_dist;
use crate::math::Point2;

/// Marks the interior vertices of `chain[first..=last]` that a
/// Douglas-Peucker pass keeps. Distances are measured to the chord segment,
/// not the infinite line, so vertices beyond an endpoint are never lost.
fn mark(chain: &[Point2], first: usize, last: usize, epsilon: f64, keep: &mut [bool]) {
    if last <= first + 1 {
        return;
    }
    let farthest = (first + 1..last)
        .map(|i| (i, point_to_segment_dist(&chain[i], &chain[first], &chain[last])))
        .max_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((idx, dist)) = farthest {
        if dist > epsilon {
            keep[idx] = true;
            mark(chain, first, idx, epsilon, keep);
            mark(chain, idx, last, epsilon, keep);
        }
    }
}

/// Douglas-Peucker reduction of an open chain. Both endpoints survive.
pub(super) fn douglas_peucker(chain: &[Point2], epsilon: f64) -> Vec<bool> {
    let mut keep = vec![false; chain.len()];
    if let Some(last) = chain.len().checked_sub(1) {
        keep[0] = true;
        keep[last] = true;
        mark(chain, 0, last, epsilon, &mut keep);
    }
    keep
}

/// Index of the vertex farthest from `ring[from]`.
fn farthest_from(ring: &[Point2], from: usize) -> usize {
    (0..ring.len())
        .max_by(|&a, &b| (ring[a] - ring[from]).norm().total_cmp(&(ring[b] - ring[from]).norm()))
        .unwrap_or(from)
}

/// Reduces a closed ring, never removing the `anchors`. The ring is cut at
/// the anchors and each span is reduced on its own. With fewer than two
/// anchors, the first vertex and the vertex farthest from it are used.
///
/// Returns which vertices are kept.
pub(super) fn reduce_ring(ring: &[Point2], anchors: &[usize], epsilon: f64) -> Vec<bool> {
    let n = ring.len();
    let mut cuts: Vec<usize> = anchors.iter().copied().filter(|&i| i < n).collect();
    cuts.sort_unstable();
    cuts.dedup();
    match cuts.len() {
        0 => {
            cuts.push(0);
            cuts.push(farthest_from(ring, 0));
        }
        1 => cuts.push(farthest_from(ring, cuts[0])),
        _ => {}
    }
    cuts.sort_unstable();
    cuts.dedup();

    let mut keep = vec![false; n];
    for &c in &cuts {
        keep[c] = true;
    }
    for (k, &start) in cuts.iter().enumerate() {
        let end = cuts[(k + 1) % cuts.len()];
        let span = if end > start { end - start } else { end + n - start };
        let indices: Vec<usize> = (0..=span).map(|o| (start + o) % n).collect();
        let chain: Vec<Point2> = indices.iter().map(|&i| ring[i]).collect();
        for (o, kept) in douglas_peucker(&chain, epsilon).into_iter().enumerate() {
            if kept {
                keep[indices[o]] = true;
            }
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point2> {
        coords.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    #[test]
    fn chain_drops_points_near_the_chord() {
        let chain = pts(&[(0.0, 0.0), (1.0, 0.1), (2.0, -0.1), (3.0, 5.0), (4.0, 6.0), (5.0, 7.0)]);
        let keep = douglas_peucker(&chain, 1.0);
        assert_eq!(keep, vec![true, false, true, true, false, true]);
    }

    #[test]
    fn ring_keeps_corners() {
        let ring = pts(&[
            (0.0, 0.0),
            (500.0, 0.005),
            (1000.0, 0.0),
            (1000.0, 200.0),
            (500.0, 200.0),
            (0.0, 200.0),
        ]);
        let keep = reduce_ring(&ring, &[], 0.01);
        assert_eq!(keep, vec![true, false, true, true, false, true]);
    }

    #[test]
    fn anchors_survive() {
        let ring = pts(&[(0.0, 0.0), (500.0, 0.0), (1000.0, 0.0), (1000.0, 200.0), (0.0, 200.0)]);
        assert!(!reduce_ring(&ring, &[], 0.01)[1]);
        assert!(reduce_ring(&ring, &[1], 0.01)[1]);
    }
}
