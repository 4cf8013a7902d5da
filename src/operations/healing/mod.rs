//! Healing engine: removes small defects left behind by offsets and booleans.

mod rings;

use std::time::{Duration, Instant};

use crate::config::HealingConfig;
use crate::error::GeometricError;
use crate::geometry::{CreationMethod, Curve, HealingOperation, HealingRecord, Point, Polygon, WallSolid};
use crate::math::polygon_2d::{ring_perimeter, signed_area_2d};

use rings::{merge_duplicates, remove_micro_segments, remove_spikes};

/// Outcome of [`HealingEngine::heal_shape`].
///
/// `healed_solid` is the input unchanged when nothing was fixed or the call
/// failed.
#[derive(Debug, Clone)]
pub struct HealingResult {
    pub success: bool,
    pub healed_solid: WallSolid,
    /// Fixes applied, in the order they ran. Also appended to the solid's
    /// healing history.
    pub operations_applied: Vec<HealingRecord>,
    pub warnings: Vec<String>,
    pub errors: Vec<GeometricError>,
    pub processing_time: Duration,
}

impl HealingResult {
    fn failed(solid: &WallSolid, warnings: Vec<String>, error: GeometricError, started: Instant) -> Self {
        Self {
            success: false,
            healed_solid: solid.clone(),
            operations_applied: Vec::new(),
            warnings,
            errors: vec![error.in_operation("heal_shape")],
            processing_time: started.elapsed(),
        }
    }
}

/// Upper bound on fix rounds; each round may expose defects for the next.
const MAX_PASSES: usize = 8;

/// Rings of one face while they are being worked on.
struct Face {
    outer: Vec<Point>,
    holes: Vec<Vec<Point>>,
}

impl Face {
    fn rings_mut(&mut self) -> impl Iterator<Item = &mut Vec<Point>> {
        std::iter::once(&mut self.outer).chain(self.holes.iter_mut())
    }
}

fn ring_ratio(ring: &[Point]) -> f64 {
    let coords: Vec<_> = ring.iter().map(Point::position).collect();
    let perimeter = ring_perimeter(&coords);
    if perimeter <= 0.0 {
        0.0
    } else {
        signed_area_2d(&coords).abs() / perimeter
    }
}

/// Repairs duplicate vertices, micro segments, sliver faces, and micro gaps.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealingEngine {
    config: HealingConfig,
}

impl HealingEngine {
    #[must_use]
    pub fn new(config: HealingConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &HealingConfig {
        &self.config
    }

    /// Heals `solid`, returning a new solid with one history record per
    /// applied fix.
    ///
    /// Fixes run in order: near-duplicate vertices (within `tolerance`) are
    /// merged, segments shorter than the micro-gap threshold are collapsed,
    /// spikes and faces whose area/perimeter ratio is under the sliver
    /// threshold are removed, and vertices of distinct faces closer than the
    /// micro-gap threshold are snapped together. The round repeats until it
    /// changes nothing, since removing a spike or snapping a vertex can leave
    /// a new duplicate or micro segment behind. A solid without defects comes
    /// back unchanged with no operations, so the call is idempotent.
    #[must_use]
    pub fn heal_shape(&self, solid: &WallSolid, tolerance: f64) -> HealingResult {
        let started = Instant::now();
        let _span = tracing::debug_span!("heal_shape", wall = %solid.id()).entered();

        if !(tolerance.is_finite() && tolerance > 0.0) {
            return HealingResult::failed(
                solid,
                Vec::new(),
                GeometricError::invalid_parameter(format!("healing tolerance must be positive, got {tolerance}")),
                started,
            );
        }

        let mut faces: Vec<Face> = solid
            .solid_geometry()
            .iter()
            .map(|p| Face {
                outer: p.outer_ring().to_vec(),
                holes: p.holes().to_vec(),
            })
            .collect();
        let mut warnings = Vec::new();
        let mut applied = Vec::new();
        let record = |operation: HealingOperation, count: usize, applied: &mut Vec<HealingRecord>| {
            if count > 0 {
                tracing::debug!(%operation, count, "healing fix applied");
                applied.push(HealingRecord {
                    operation,
                    count,
                    tolerance,
                });
            }
        };

        let (left, right, offset_merges) = dedup_offsets(solid, tolerance);
        let mut totals = [0; 4];
        let mut converged = false;
        for _ in 0..MAX_PASSES {
            let counts = self.heal_pass(&mut faces, tolerance);
            if counts.iter().all(|&c| c == 0) {
                converged = true;
                break;
            }
            for (total, count) in totals.iter_mut().zip(counts) {
                *total += count;
            }
        }
        if !converged {
            warnings.push(format!("healing still changing geometry after {MAX_PASSES} passes"));
        }

        record(HealingOperation::DuplicateVertexMerge, totals[0] + offset_merges, &mut applied);
        record(HealingOperation::MicroSegmentRemoval, totals[1], &mut applied);
        record(HealingOperation::SliverFaceRemoval, totals[2], &mut applied);
        record(HealingOperation::MicroGapClosure, totals[3], &mut applied);

        if applied.is_empty() {
            return HealingResult {
                success: true,
                healed_solid: solid.clone(),
                operations_applied: applied,
                warnings,
                errors: Vec::new(),
                processing_time: started.elapsed(),
            };
        }

        let mut polygons = Vec::with_capacity(faces.len());
        for face in faces {
            match Polygon::new(face.outer, face.holes) {
                Ok(p) => polygons.push(p),
                Err(e) => warnings.push(format!("healed face rejected: {e}")),
            }
        }
        if polygons.is_empty() && !solid.solid_geometry().is_empty() {
            tracing::warn!(wall = %solid.id(), "healing removed every face");
            return HealingResult::failed(
                solid,
                warnings,
                GeometricError::degenerate("healing removed every face of the solid"),
                started,
            );
        }

        let mut healed = solid.clone().with_geometry(polygons);
        if let (Some(l), Some(r)) = (left, right) {
            healed = healed.with_offsets(l, r);
        }
        for r in &applied {
            healed = healed.with_healing_record(*r);
        }
        for w in &warnings {
            tracing::warn!(wall = %solid.id(), "{w}");
        }

        HealingResult {
            success: true,
            healed_solid: healed,
            operations_applied: applied,
            warnings,
            errors: Vec::new(),
            processing_time: started.elapsed(),
        }
    }

    /// One round of every fix. Returns the counts of duplicate merges, micro
    /// segments, slivers and snapped vertices.
    fn heal_pass(&self, faces: &mut Vec<Face>, tolerance: f64) -> [usize; 4] {
        let mut merged = 0;
        let mut micro = 0;
        for face in faces.iter_mut() {
            for ring in face.rings_mut() {
                let (fixed, n) = merge_duplicates(ring, tolerance, true);
                *ring = fixed;
                merged += n;
                if ring.len() < 3 {
                    continue;
                }
                let (fixed, n) = remove_micro_segments(ring, self.config.micro_gap_threshold);
                *ring = fixed;
                micro += n;
            }
        }
        let slivers = self.remove_slivers(faces, tolerance);
        let snapped = self.close_micro_gaps(faces);
        [merged, micro, slivers, snapped]
    }

    /// Removes spikes, then sliver holes and sliver faces. Faces whose outer
    /// ring has collapsed below three vertices count as slivers too.
    fn remove_slivers(&self, faces: &mut Vec<Face>, tolerance: f64) -> usize {
        let threshold = self.config.sliver_face_threshold;
        let mut removed = 0;
        for face in faces.iter_mut() {
            for ring in face.rings_mut() {
                let (fixed, n) = remove_spikes(ring, tolerance);
                *ring = fixed;
                removed += n;
            }
            let before = face.holes.len();
            face.holes.retain(|h| h.len() >= 3 && ring_ratio(h) >= threshold);
            removed += before - face.holes.len();
        }
        let before = faces.len();
        faces.retain(|f| f.outer.len() >= 3 && ring_ratio(&f.outer) >= threshold);
        removed += before - faces.len();
        removed
    }

    /// Snaps each vertex onto the nearest vertex of an earlier face when the
    /// two are closer than the micro-gap threshold but not coincident.
    fn close_micro_gaps(&self, faces: &mut [Face]) -> usize {
        let threshold = self.config.micro_gap_threshold;
        let mut snapped = 0;
        for j in 1..faces.len() {
            let (earlier, rest) = faces.split_at_mut(j);
            let targets: Vec<Point> = earlier
                .iter()
                .flat_map(|f| std::iter::once(&f.outer).chain(&f.holes))
                .flatten()
                .copied()
                .collect();
            for ring in rest[0].rings_mut() {
                for p in ring.iter_mut() {
                    let nearest = targets
                        .iter()
                        .map(|t| (t.distance_to(p), t))
                        .min_by(|a, b| a.0.total_cmp(&b.0));
                    if let Some((d, target)) = nearest {
                        if d > 0.0 && d < threshold {
                            *p = p.moved_to(target.position(), CreationMethod::Healing);
                            snapped += 1;
                        }
                    }
                }
            }
        }
        snapped
    }
}

/// Merges near-duplicate offset vertices. Offsets that would collapse below
/// two points are left alone.
fn dedup_offsets(solid: &WallSolid, tolerance: f64) -> (Option<Curve>, Option<Curve>, usize) {
    let mut merged = 0;
    let mut fix = |curve: Option<&Curve>| {
        let curve = curve?;
        let (points, n) = merge_duplicates(curve.points(), tolerance, curve.is_closed());
        if n == 0 || points.len() < 2 {
            return Some(curve.clone());
        }
        match curve.with_points(points) {
            Ok(c) => {
                merged += n;
                Some(c)
            }
            Err(_) => Some(curve.clone()),
        }
    };
    let left = fix(solid.left_offset());
    let right = fix(solid.right_offset());
    (left, right, merged)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::geometry::{JoinType, WallType};
    use crate::math::Point2;
    use crate::operations::offset::OffsetEngine;

    fn poly(coords: &[(f64, f64)]) -> Polygon {
        let pts: Vec<Point2> = coords.iter().map(|&(x, y)| Point2::new(x, y)).collect();
        Polygon::from_coords(&pts, &[], CreationMethod::Boolean, 0.01).unwrap()
    }

    fn wall_with(faces: Vec<Polygon>) -> WallSolid {
        let baseline = Curve::polyline(&[Point2::new(0.0, 100.0), Point2::new(1000.0, 100.0)]).unwrap();
        WallSolid::new(baseline, 200.0, WallType::Interior)
            .unwrap()
            .with_geometry(faces)
    }

    fn ops(result: &HealingResult) -> Vec<HealingOperation> {
        result.operations_applied.iter().map(|r| r.operation).collect()
    }

    #[test]
    fn clean_wall_is_untouched() {
        let baseline = Curve::polyline(&[Point2::new(0.0, 0.0), Point2::new(3000.0, 0.0), Point2::new(3000.0, 2000.0)])
            .unwrap();
        let wall = OffsetEngine::default()
            .offset_wall(&baseline, 150.0, WallType::Exterior, JoinType::Miter, 0.01)
            .unwrap();
        let result = HealingEngine::default().heal_shape(&wall, 0.01);
        assert!(result.success);
        assert!(result.operations_applied.is_empty(), "unexpected fixes: {:?}", result.operations_applied);
        assert_eq!(result.healed_solid.id(), wall.id());
        assert_relative_eq!(result.healed_solid.area(), wall.area(), epsilon = 1e-9);
    }

    #[test]
    fn near_duplicate_vertex_is_merged() {
        let wall = wall_with(vec![poly(&[(0.0, 0.0), (0.005, 0.0), (1000.0, 0.0), (1000.0, 200.0), (0.0, 200.0)])]);
        let result = HealingEngine::default().heal_shape(&wall, 0.01);
        assert!(result.success);
        assert_eq!(ops(&result), vec![HealingOperation::DuplicateVertexMerge]);
        assert_eq!(result.operations_applied[0].count, 1);
        assert_eq!(result.healed_solid.solid_geometry()[0].outer_ring().len(), 4);
        assert_relative_eq!(result.healed_solid.area(), 200_000.0, epsilon = 1e-6);
    }

    #[test]
    fn micro_segment_is_collapsed() {
        let wall = wall_with(vec![poly(&[
            (0.0, 0.0),
            (1000.0, 0.0),
            (1000.0, 0.05),
            (1000.0, 200.0),
            (0.0, 200.0),
        ])]);
        let result = HealingEngine::default().heal_shape(&wall, 0.01);
        assert_eq!(ops(&result), vec![HealingOperation::MicroSegmentRemoval]);
        assert_eq!(result.healed_solid.solid_geometry()[0].outer_ring().len(), 4);
    }

    #[test]
    fn sliver_face_is_removed() {
        let wall = wall_with(vec![
            poly(&[(0.0, 0.0), (1000.0, 0.0), (1000.0, 200.0), (0.0, 200.0)]),
            poly(&[(2000.0, 0.0), (2100.0, 0.0), (2100.0, 0.05), (2000.0, 0.05)]),
        ]);
        let result = HealingEngine::default().heal_shape(&wall, 0.01);
        assert_eq!(ops(&result), vec![HealingOperation::SliverFaceRemoval]);
        assert_eq!(result.operations_applied[0].count, 1);
        assert_eq!(result.healed_solid.solid_geometry().len(), 1);
    }

    #[test]
    fn micro_gap_between_faces_is_closed() {
        let wall = wall_with(vec![
            poly(&[(0.0, 0.0), (1000.0, 0.0), (1000.0, 100.0), (0.0, 100.0)]),
            poly(&[(1000.05, 0.0), (2000.0, 0.0), (2000.0, 100.0), (1000.05, 100.0)]),
        ]);
        let result = HealingEngine::default().heal_shape(&wall, 0.01);
        assert_eq!(ops(&result), vec![HealingOperation::MicroGapClosure]);
        assert_eq!(result.operations_applied[0].count, 2);
        assert_relative_eq!(result.healed_solid.area(), 200_000.0, epsilon = 1e-6);
        let snapped = result.healed_solid.solid_geometry()[1]
            .outer_ring()
            .iter()
            .filter(|p| p.creation_method() == CreationMethod::Healing)
            .count();
        assert_eq!(snapped, 2);
    }

    #[test]
    fn healing_is_idempotent_and_appends_history() {
        let wall = wall_with(vec![
            poly(&[(0.0, 0.0), (1000.0, 0.0), (1000.0, 100.0), (0.0, 100.0)]),
            poly(&[(1000.05, 0.0), (2000.0, 0.0), (2000.0, 100.0), (1000.05, 100.0)]),
        ]);
        let engine = HealingEngine::default();
        let first = engine.heal_shape(&wall, 0.01);
        assert!(wall.healing_history().is_empty(), "input must not change");
        assert_eq!(first.healed_solid.healing_history().len(), 1);

        let second = engine.heal_shape(&first.healed_solid, 0.01);
        assert!(second.success);
        assert!(second.operations_applied.is_empty());
        assert_eq!(second.healed_solid.healing_history().len(), 1);
        assert_relative_eq!(second.healed_solid.area(), first.healed_solid.area(), epsilon = 1e-9);
    }

    #[test]
    fn spike_removal_exposing_a_micro_segment_heals_in_one_call() {
        // Dropping the spike at (300, 100) leaves a 0.05 segment behind it.
        let wall = wall_with(vec![poly(&[
            (0.0, 0.0),
            (1000.0, 0.0),
            (1000.0, 100.0),
            (500.05, 100.0),
            (300.0, 100.0),
            (500.0, 100.0),
            (0.0, 100.0),
        ])]);
        let engine = HealingEngine::default();
        let first = engine.heal_shape(&wall, 0.01);
        assert!(first.success, "{:?}", first.errors);
        assert_eq!(
            ops(&first),
            vec![HealingOperation::MicroSegmentRemoval, HealingOperation::SliverFaceRemoval]
        );

        let second = engine.heal_shape(&first.healed_solid, 0.01);
        assert!(second.success);
        assert!(second.operations_applied.is_empty(), "second pass fixed {:?}", second.operations_applied);
        let coords = |r: &HealingResult| r.healed_solid.solid_geometry()[0].outer_coords();
        assert_eq!(coords(&second), coords(&first));
    }

    #[test]
    fn all_sliver_solid_fails() {
        let wall = wall_with(vec![poly(&[(0.0, 0.0), (100.0, 0.0), (100.0, 0.05), (0.0, 0.05)])]);
        let result = HealingEngine::default().heal_shape(&wall, 0.01);
        assert!(!result.success);
        assert_eq!(result.errors[0].kind, crate::error::GeometricErrorType::DegenerateGeometry);
        assert_eq!(result.healed_solid.solid_geometry().len(), 1);
    }

    #[test]
    fn rejects_non_positive_tolerance() {
        let wall = wall_with(Vec::new());
        let result = HealingEngine::default().heal_shape(&wall, 0.0);
        assert!(!result.success);
        assert_eq!(result.errors[0].kind, crate::error::GeometricErrorType::InvalidParameter);
    }
}
