use std::collections::HashMap;
use std::f64::consts::TAU;

use crate::geometry::{CreationMethod, Polygon};
use crate::math::polygon_2d::{clean_ring, point_in_rings_strict, ring_centroid, signed_area_2d};
use crate::math::Point2;

use super::select::KeepDecision;
use super::split::EdgeFragment;

/// Spatial hash-based vertex merger.
///
/// Groups points by grid cell and merges vertices that are within
/// `cell_size` of each other.
struct VertexMerger {
    cell_size: f64,
    map: HashMap<(i64, i64), Vec<(usize, Point2)>>,
    points: Vec<Point2>,
}

impl VertexMerger {
    fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            map: HashMap::new(),
            points: Vec::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell_key(&self, p: &Point2) -> (i64, i64) {
        let inv = 1.0 / self.cell_size;
        ((p.x * inv).floor() as i64, (p.y * inv).floor() as i64)
    }

    fn get_or_create(&mut self, point: &Point2) -> usize {
        let key = self.cell_key(point);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(entries) = self.map.get(&(key.0 + dx, key.1 + dy)) {
                    for &(id, ref existing) in entries {
                        if (point - existing).norm() <= self.cell_size {
                            return id;
                        }
                    }
                }
            }
        }
        let id = self.points.len();
        self.points.push(*point);
        self.map.entry(key).or_default().push((id, *point));
        id
    }
}

/// Polygons traced from kept fragments, plus what had to be dropped.
#[derive(Debug, Default)]
pub struct Assembly {
    pub polygons: Vec<Polygon>,
    pub warnings: Vec<String>,
}

/// Clockwise rotation from `from` to `to`, in `(0, 2π]`.
fn clockwise_turn(from: f64, to: f64) -> f64 {
    let r = (from - to).rem_euclid(TAU);
    if r == 0.0 {
        TAU
    } else {
        r
    }
}

/// Chains kept fragments into closed rings and builds polygons from them.
///
/// At a vertex with several unused outgoing edges the walk takes the first
/// one clockwise from the reversed incoming edge, which keeps the region on
/// the left and separates loops that only touch at a vertex. Counter-
/// clockwise rings become outer boundaries; clockwise rings become holes of
/// the smallest outer ring containing them. Rings enclosing no more than
/// `tolerance²` are dropped with a warning.
pub fn assemble_rings(fragments: &[(EdgeFragment, KeepDecision)], tolerance: f64) -> Assembly {
    let mut merger = VertexMerger::new(tolerance);
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for (fragment, decision) in fragments {
        let fragment = match decision {
            KeepDecision::Discard => continue,
            KeepDecision::Keep => *fragment,
            KeepDecision::KeepReversed => fragment.reversed(),
        };
        let (s, e) = (merger.get_or_create(&fragment.start), merger.get_or_create(&fragment.end));
        if s != e {
            edges.push((s, e));
        }
    }

    let points = &merger.points;
    let mut outgoing: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, &(s, _)) in edges.iter().enumerate() {
        outgoing.entry(s).or_default().push(i);
    }
    let angle = |edge: usize| {
        let (s, e) = edges[edge];
        let d = points[e] - points[s];
        d.y.atan2(d.x)
    };

    let mut assembly = Assembly::default();
    let mut used = vec![false; edges.len()];
    let mut rings: Vec<Vec<Point2>> = Vec::new();
    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        used[first] = true;
        let origin = edges[first].0;
        let mut ring = vec![points[origin]];
        let mut current = first;
        let closed = loop {
            let at = edges[current].1;
            if at == origin {
                break true;
            }
            ring.push(points[at]);
            let back = angle(current) + std::f64::consts::PI;
            let next = outgoing
                .get(&at)
                .and_then(|out| {
                    out.iter()
                        .copied()
                        .filter(|&o| !used[o])
                        .min_by(|&x, &y| clockwise_turn(back, angle(x)).total_cmp(&clockwise_turn(back, angle(y))))
                });
            match next {
                Some(n) => {
                    used[n] = true;
                    current = n;
                }
                None => break false,
            }
        };
        if closed {
            rings.push(ring);
        } else {
            assembly
                .warnings
                .push(format!("open boundary chain of {} vertices dropped", ring.len()));
        }
    }

    let mut outers: Vec<(Vec<Point2>, f64, Vec<Vec<Point2>>)> = Vec::new();
    let mut holes: Vec<Vec<Point2>> = Vec::new();
    let min_area = tolerance * tolerance;
    for ring in rings {
        let ring = clean_ring(&ring, tolerance);
        let area = if ring.len() < 3 { 0.0 } else { signed_area_2d(&ring) };
        if area > min_area {
            outers.push((ring, area, Vec::new()));
        } else if area < -min_area {
            holes.push(ring);
        } else {
            assembly.warnings.push("degenerate loop dropped".to_string());
        }
    }

    for hole in holes {
        let probe = ring_centroid(&hole);
        let owner = outers
            .iter_mut()
            .filter(|(outer, ..)| point_in_rings_strict(&probe, &[outer.as_slice()]))
            .min_by(|x, y| x.1.total_cmp(&y.1));
        match owner {
            Some((_, _, owned)) => owned.push(hole),
            None => assembly.warnings.push("hole outside every boundary dropped".to_string()),
        }
    }

    for (outer, _, owned) in outers {
        match Polygon::from_coords(&outer, &owned, CreationMethod::Boolean, tolerance) {
            Ok(p) => assembly.polygons.push(p),
            Err(e) => assembly.warnings.push(format!("result ring rejected: {e}")),
        }
    }
    assembly
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::boolean::split::ShapeSource;

    fn ring_fragments(pts: &[(f64, f64)]) -> Vec<(EdgeFragment, KeepDecision)> {
        let n = pts.len();
        (0..n)
            .map(|i| {
                let (a, b) = (pts[i], pts[(i + 1) % n]);
                (
                    EdgeFragment {
                        start: Point2::new(a.0, a.1),
                        end: Point2::new(b.0, b.1),
                        source: ShapeSource::A,
                    },
                    KeepDecision::Keep,
                )
            })
            .collect()
    }

    #[test]
    fn square_with_hole() {
        let mut fragments = ring_fragments(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
        fragments.extend(ring_fragments(&[(1.0, 1.0), (1.0, 3.0), (3.0, 3.0), (3.0, 1.0)]));
        let assembly = assemble_rings(&fragments, 1e-6);
        assert_eq!(assembly.polygons.len(), 1);
        assert_eq!(assembly.polygons[0].holes().len(), 1);
        assert!((assembly.polygons[0].area() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn corner_touching_squares_stay_apart() {
        let mut fragments = ring_fragments(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        fragments.extend(ring_fragments(&[(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0)]));
        let assembly = assemble_rings(&fragments, 1e-6);
        assert_eq!(assembly.polygons.len(), 2);
        assert!(assembly.warnings.is_empty());
    }

    #[test]
    fn discarded_and_reversed_fragments() {
        let mut fragments = ring_fragments(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]);
        for f in &mut fragments {
            f.1 = KeepDecision::KeepReversed;
        }
        fragments.extend(ring_fragments(&[(5.0, 5.0), (6.0, 5.0), (6.0, 6.0)]).into_iter().map(|(f, _)| (f, KeepDecision::Discard)));
        let assembly = assemble_rings(&fragments, 1e-6);
        assert_eq!(assembly.polygons.len(), 1);
        assert!((assembly.polygons[0].area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn collapsed_loop_is_reported() {
        let fragments = ring_fragments(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        let assembly = assemble_rings(&fragments, 1e-6);
        assert!(assembly.polygons.is_empty());
        assert_eq!(assembly.warnings.len(), 1);
    }
}
