use crate::config::IntersectionConfig;
use crate::error::Result;
use crate::geometry::{JunctionType, WallSolid};
use crate::math::distance_2d::closest_on_polyline;
use crate::math::intersect_2d::segment_segment_intersect_2d;
use crate::math::{direction, left_normal, Point2, Vector2};

use super::arms::{baseline_path, WallEnd};

/// A meeting of two walls found before resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JunctionCandidate {
    pub junction_type: JunctionType,
    pub point: Point2,
    /// For a T junction, the wall the other one ends on: `0` for the first
    /// wall of the pair, `1` for the second.
    pub main: Option<usize>,
}

/// Acute angle in degrees between the lines along two unit directions.
pub(super) fn line_angle(a: &Vector2, b: &Vector2) -> f64 {
    a.dot(b).abs().clamp(0.0, 1.0).acos().to_degrees()
}

/// Collinear overlap of two baseline segments, in the frame of the first.
#[derive(Debug, Clone, Copy)]
pub(super) struct Overlap {
    pub origin: Point2,
    pub axis: Vector2,
    /// Overlap interval along `axis`, measured from `origin`.
    pub lo: f64,
    pub hi: f64,
    /// Offset of the second segment's center line along the left normal.
    pub lateral: f64,
}

impl Overlap {
    pub(super) fn length(&self) -> f64 {
        self.hi - self.lo
    }

    pub(super) fn at(&self, along: f64, across: f64) -> Point2 {
        self.origin + self.axis * along + left_normal(&self.axis) * across
    }
}

/// Longest overlap between segments of two baselines that run parallel
/// within `max_angle` degrees and whose wall bands overlap by more than
/// `tolerance`.
pub(super) fn find_overlap(
    a: &[Point2],
    half_a: f64,
    b: &[Point2],
    half_b: f64,
    max_angle: f64,
    tolerance: f64,
) -> Option<Overlap> {
    let mut best: Option<Overlap> = None;
    for wa in a.windows(2) {
        let Some(axis) = direction(&wa[0], &wa[1], tolerance) else {
            continue;
        };
        let normal = left_normal(&axis);
        let len_a = (wa[1] - wa[0]).norm();
        for wb in b.windows(2) {
            let Some(dir_b) = direction(&wb[0], &wb[1], tolerance) else {
                continue;
            };
            if line_angle(&axis, &dir_b) >= max_angle {
                continue;
            }
            let lateral = 0.5 * ((wb[0] - wa[0]).dot(&normal) + (wb[1] - wa[0]).dot(&normal));
            if lateral.abs() > half_a + half_b - tolerance {
                continue;
            }
            let (s0, s1) = ((wb[0] - wa[0]).dot(&axis), (wb[1] - wa[0]).dot(&axis));
            let lo = s0.min(s1).max(0.0);
            let hi = s0.max(s1).min(len_a);
            if hi - lo <= tolerance {
                continue;
            }
            let found = Overlap {
                origin: wa[0],
                axis,
                lo,
                hi,
                lateral,
            };
            if best.map_or(true, |o| found.length() > o.length()) {
                best = Some(found);
            }
        }
    }
    best
}

fn free_ends(solid: &WallSolid, path: &[Point2]) -> Vec<(WallEnd, Point2)> {
    if solid.baseline().is_closed() {
        Vec::new()
    } else {
        WallEnd::BOTH.iter().map(|&e| (e, e.point(path))).collect()
    }
}

/// Detects how two walls meet, if they do.
///
/// Checked in order: parallel overlap, shared endpoint (L), an endpoint on
/// the other baseline (T), and crossing baselines (cross).
pub(super) fn classify(
    a: &WallSolid,
    b: &WallSolid,
    config: &IntersectionConfig,
    tolerance: f64,
) -> Result<Option<JunctionCandidate>> {
    if !a.bounding_box().overlaps(&b.bounding_box(), tolerance) {
        return Ok(None);
    }
    let pa = baseline_path(a, tolerance)?;
    let pb = baseline_path(b, tolerance)?;

    if let Some(overlap) = find_overlap(
        &pa,
        a.thickness() * 0.5,
        &pb,
        b.thickness() * 0.5,
        config.parallel_overlap_threshold,
        tolerance,
    ) {
        return Ok(Some(JunctionCandidate {
            junction_type: JunctionType::ParallelOverlap,
            point: overlap.at(0.5 * (overlap.lo + overlap.hi), 0.5 * overlap.lateral),
            main: None,
        }));
    }

    let ends_a = free_ends(a, &pa);
    let ends_b = free_ends(b, &pb);

    let shared = ends_a
        .iter()
        .flat_map(|&(_, p)| ends_b.iter().map(move |&(_, q)| (p, q)))
        .filter(|(p, q)| (p - q).norm() <= tolerance)
        .min_by(|x, y| (x.0 - x.1).norm().total_cmp(&(y.0 - y.1).norm()));
    if let Some((p, q)) = shared {
        return Ok(Some(JunctionCandidate {
            junction_type: JunctionType::L,
            point: nalgebra::center(&p, &q),
            main: None,
        }));
    }

    for (main, ends, path) in [(0, &ends_b, &pa), (1, &ends_a, &pb)] {
        for &(_, p) in ends {
            if closest_on_polyline(&p, path).is_some_and(|(d, ..)| d <= tolerance) {
                return Ok(Some(JunctionCandidate {
                    junction_type: JunctionType::T,
                    point: p,
                    main: Some(main),
                }));
            }
        }
    }

    for wa in pa.windows(2) {
        for wb in pb.windows(2) {
            if let Some((point, ..)) = segment_segment_intersect_2d(&wa[0], &wa[1], &wb[0], &wb[1], 0.0) {
                return Ok(Some(JunctionCandidate {
                    junction_type: JunctionType::Cross,
                    point,
                    main: None,
                }));
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::OffsetConfig;
    use crate::geometry::{Curve, JoinType, WallType};
    use crate::operations::offset::OffsetEngine;

    fn wall(coords: &[(f64, f64)], thickness: f64) -> WallSolid {
        let pts: Vec<Point2> = coords.iter().map(|&(x, y)| Point2::new(x, y)).collect();
        OffsetEngine::new(OffsetConfig::default())
            .offset_wall(&Curve::polyline(&pts).unwrap(), thickness, WallType::Interior, JoinType::Miter, 0.01)
            .unwrap()
    }

    fn kind(a: &WallSolid, b: &WallSolid) -> Option<JunctionType> {
        classify(a, b, &IntersectionConfig::default(), 0.01)
            .unwrap()
            .map(|c| c.junction_type)
    }

    #[test]
    fn detects_each_junction_kind() {
        let main = wall(&[(0.0, 0.0), (2000.0, 0.0)], 150.0);
        let branch = wall(&[(1000.0, 0.0), (1000.0, 1500.0)], 150.0);
        let corner = wall(&[(2000.0, 0.0), (2000.0, 1500.0)], 150.0);
        let crossing = wall(&[(500.0, -700.0), (500.0, 700.0)], 150.0);
        let twin = wall(&[(1500.0, 20.0), (3000.0, 20.0)], 150.0);
        let far = wall(&[(0.0, 5000.0), (1000.0, 5000.0)], 150.0);

        assert_eq!(kind(&main, &branch), Some(JunctionType::T));
        assert_eq!(kind(&main, &corner), Some(JunctionType::L));
        assert_eq!(kind(&main, &crossing), Some(JunctionType::Cross));
        assert_eq!(kind(&main, &twin), Some(JunctionType::ParallelOverlap));
        assert_eq!(kind(&main, &far), None);
    }

    #[test]
    fn t_candidate_names_the_main_wall() {
        let main = wall(&[(0.0, 0.0), (2000.0, 0.0)], 150.0);
        let branch = wall(&[(1000.0, 1500.0), (1000.0, 0.0)], 150.0);
        let c = classify(&branch, &main, &IntersectionConfig::default(), 0.01).unwrap().unwrap();
        assert_eq!(c.main, Some(1));
        assert!((c.point - Point2::new(1000.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn collinear_continuation_is_not_an_overlap() {
        let a = wall(&[(0.0, 0.0), (1000.0, 0.0)], 150.0);
        let b = wall(&[(1000.0, 0.0), (2000.0, 0.0)], 150.0);
        assert_eq!(kind(&a, &b), Some(JunctionType::L));
    }

    #[test]
    fn line_angle_is_acute() {
        let east = Vector2::new(1.0, 0.0);
        let west = Vector2::new(-1.0, 0.0);
        let north = Vector2::new(0.0, 1.0);
        assert!(line_angle(&east, &west).abs() < 1e-9);
        assert!((line_angle(&east, &north) - 90.0).abs() < 1e-9);
    }
}
