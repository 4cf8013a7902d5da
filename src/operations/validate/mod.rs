//! Validator: recomputes quality metrics of a wall solid from scratch.

mod checks;

use std::time::{Duration, Instant};

use crate::config::ValidationConfig;
use crate::error::{GeometricError, GeometricErrorType, Severity};
use crate::geometry::{Point, QualityMetrics, WallSolid};

use checks::{count_defects, thin_area_fraction, topology_problems, DefectCounts};

/// One category of problem found on a solid.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationIssue {
    pub kind: GeometricErrorType,
    pub severity: Severity,
    pub count: usize,
    pub message: String,
}

impl ValidationIssue {
    fn new(kind: GeometricErrorType, severity: Severity, count: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            count,
            message: message.into(),
        }
    }
}

/// Outcome of [`Validator::validate_wall_solid`].
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// False exactly when a self-intersection or a structural problem was found.
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub quality_score: f64,
    pub metrics: QualityMetrics,
    pub errors: Vec<GeometricError>,
    pub warnings: Vec<String>,
    pub processing_time: Duration,
}

/// Scores wall solids and decides whether they are usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    #[must_use]
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validates `solid` and computes its [`QualityMetrics`].
    ///
    /// Sliver faces and micro gaps lower the score without invalidating the
    /// solid. Thickness, minimum length, and complexity budget violations
    /// only reduce architectural compliance and produce warnings.
    #[must_use]
    pub fn validate_wall_solid(&self, solid: &WallSolid) -> ValidationResult {
        let started = Instant::now();
        let _span = tracing::debug_span!("validate_wall_solid", wall = %solid.id()).entered();
        let tolerance = self.effective_tolerance(solid);
        let faces = solid.solid_geometry();

        let defects = count_defects(
            faces,
            tolerance,
            self.config.sliver_face_threshold,
            self.config.micro_gap_threshold,
        );
        let (checks, problems) = topology_problems(solid, tolerance);
        let (thin_fraction, untriangulated) = thin_area_fraction(faces, self.config.micro_gap_threshold);

        let mut issues = Vec::new();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if defects.self_intersections > 0 {
            let message = format!("{} self-intersecting edge pairs", defects.self_intersections);
            errors.push(GeometricError::self_intersection(message.clone()).in_operation("validate_wall_solid"));
            issues.push(ValidationIssue::new(
                GeometricErrorType::SelfIntersection,
                Severity::High,
                defects.self_intersections,
                message,
            ));
        }
        for p in &problems {
            errors.push(GeometricError::topology(p.clone()).in_operation("validate_wall_solid"));
        }
        if !problems.is_empty() {
            issues.push(ValidationIssue::new(
                GeometricErrorType::TopologicalConsistency,
                Severity::High,
                problems.len(),
                problems.join("; "),
            ));
        }
        self.defect_issues(&defects, untriangulated, &mut issues, &mut warnings);
        let compliance = self.architectural_compliance(solid, &mut issues, &mut warnings);

        #[allow(clippy::cast_precision_loss)]
        let metrics = {
            let accuracy = mean_accuracy(faces.iter().flat_map(|f| f.outer_ring().iter().chain(f.holes().iter().flatten())));
            let penalty = 1.0 / (1.0 + (defects.self_intersections + defects.degenerate) as f64);
            let topological = checks.saturating_sub(problems.len()) as f64 / checks as f64;
            let manufacturability = if faces.is_empty() {
                0.0
            } else {
                ((1.0 - thin_fraction)
                    - 0.1 * (defects.slivers + defects.micro_gaps) as f64
                    - 0.25 * untriangulated as f64)
                    .clamp(0.0, 1.0)
            };
            let face_vertices: usize = faces.iter().map(|f| f.vertex_count()).sum();
            let efficiency = if face_vertices == 0 {
                0.0
            } else {
                (2.0 * solid.baseline().points().len() as f64 / face_vertices as f64).min(1.0)
            };
            QualityMetrics {
                geometric_accuracy: accuracy * penalty,
                topological_consistency: topological,
                manufacturability,
                architectural_compliance: compliance,
                sliver_face_count: defects.slivers,
                micro_gap_count: defects.micro_gaps,
                self_intersection_count: defects.self_intersections,
                degenerate_element_count: defects.degenerate,
                complexity: solid.complexity(),
                processing_efficiency: efficiency,
                memory_usage: std::mem::size_of::<WallSolid>() + solid.complexity() * std::mem::size_of::<Point>(),
            }
        };

        let quality_score = metrics.weighted_score(&self.config.weights);
        let is_valid = defects.self_intersections == 0 && problems.is_empty();
        if is_valid {
            tracing::debug!(wall = %solid.id(), quality_score, "wall valid");
        } else {
            tracing::warn!(wall = %solid.id(), quality_score, errors = errors.len(), "wall invalid");
        }

        ValidationResult {
            is_valid,
            issues,
            quality_score,
            metrics,
            errors,
            warnings,
            processing_time: started.elapsed(),
        }
    }

    /// The largest tolerance carried by the solid's points, or the configured
    /// one when the points carry none.
    fn effective_tolerance(&self, solid: &WallSolid) -> f64 {
        let carried = solid
            .solid_geometry()
            .iter()
            .flat_map(|f| f.outer_ring())
            .map(Point::tolerance)
            .fold(0.0, f64::max);
        if carried > 0.0 {
            carried
        } else {
            self.config.tolerance
        }
    }

    fn defect_issues(
        &self,
        defects: &DefectCounts,
        untriangulated: usize,
        issues: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<String>,
    ) {
        let mut warn = |kind, severity, count: usize, message: String| {
            if count > 0 {
                warnings.push(message.clone());
                issues.push(ValidationIssue::new(kind, severity, count, message));
            }
        };
        warn(
            GeometricErrorType::DegenerateGeometry,
            Severity::Medium,
            defects.degenerate,
            format!("{} degenerate elements", defects.degenerate),
        );
        warn(
            GeometricErrorType::DegenerateGeometry,
            Severity::Low,
            defects.slivers,
            format!(
                "{} sliver faces below ratio {}",
                defects.slivers, self.config.sliver_face_threshold
            ),
        );
        warn(
            GeometricErrorType::DuplicateVertices,
            Severity::Low,
            defects.micro_gaps,
            format!(
                "{} micro gaps below {}",
                defects.micro_gaps, self.config.micro_gap_threshold
            ),
        );
        warn(
            GeometricErrorType::ValidationFailure,
            Severity::Low,
            untriangulated,
            format!("{untriangulated} faces could not be triangulated"),
        );
    }

    /// Fraction of the thickness, length, and complexity checks passed.
    #[allow(clippy::cast_precision_loss)]
    fn architectural_compliance(
        &self,
        solid: &WallSolid,
        issues: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<String>,
    ) -> f64 {
        let mut failed = Vec::new();
        let thickness = solid.thickness();
        if thickness < self.config.min_thickness || thickness > self.config.max_thickness {
            failed.push(format!(
                "thickness {thickness} outside {}..{}",
                self.config.min_thickness, self.config.max_thickness
            ));
        }
        let length = solid.baseline().length();
        if length < thickness * 0.5 {
            failed.push(format!("wall length {length:.3} shorter than half its thickness"));
        }
        let complexity = solid.complexity();
        if complexity > self.config.complexity_budget {
            failed.push(format!(
                "complexity {complexity} over budget {}",
                self.config.complexity_budget
            ));
        }
        for message in &failed {
            warnings.push(message.clone());
            issues.push(ValidationIssue::new(
                GeometricErrorType::DimensionalAccuracy,
                Severity::Low,
                1,
                message.clone(),
            ));
        }
        1.0 - failed.len() as f64 / 3.0
    }
}

fn mean_accuracy<'a>(points: impl Iterator<Item = &'a Point>) -> f64 {
    let (sum, n) = points.fold((0.0, 0_u32), |(s, n), p| (s + p.accuracy(), n + 1));
    if n == 0 {
        0.0
    } else {
        sum / f64::from(n)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::{CreationMethod, Curve, JoinType, Polygon, WallType};
    use crate::math::Point2;
    use crate::operations::offset::OffsetEngine;

    fn offset_wall(coords: &[(f64, f64)], thickness: f64) -> WallSolid {
        let pts: Vec<Point2> = coords.iter().map(|&(x, y)| Point2::new(x, y)).collect();
        let baseline = Curve::polyline(&pts).unwrap();
        OffsetEngine::default()
            .offset_wall(&baseline, thickness, WallType::Interior, JoinType::Miter, 0.01)
            .unwrap()
    }

    fn poly(coords: &[(f64, f64)]) -> Polygon {
        let pts: Vec<Point2> = coords.iter().map(|&(x, y)| Point2::new(x, y)).collect();
        Polygon::from_coords(&pts, &[], CreationMethod::UserInput, 0.01).unwrap()
    }

    #[test]
    fn clean_wall_scores_high() {
        let wall = offset_wall(&[(0.0, 0.0), (3000.0, 0.0)], 150.0);
        let result = Validator::default().validate_wall_solid(&wall);
        assert!(result.is_valid, "errors: {:?}", result.errors);
        assert!(result.issues.is_empty(), "issues: {:?}", result.issues);
        assert!(result.quality_score > 0.95, "score {}", result.quality_score);
        assert_eq!(result.metrics.self_intersection_count, 0);
        assert_eq!(result.metrics.sliver_face_count, 0);
    }

    #[test]
    fn l_shaped_wall_is_valid() {
        let wall = offset_wall(&[(0.0, 0.0), (3000.0, 0.0), (3000.0, 2000.0)], 150.0);
        let result = Validator::default().validate_wall_solid(&wall);
        assert!(result.is_valid, "errors: {:?}", result.errors);
        assert!(result.quality_score > 0.95, "score {}", result.quality_score);
    }

    #[test]
    fn self_intersection_invalidates() {
        let wall = offset_wall(&[(0.0, 0.0), (3000.0, 0.0)], 150.0);
        let bowtie = poly(&[(0.0, -75.0), (3000.0, 75.0), (3000.0, -75.0), (0.0, 75.0)]);
        let result = Validator::default().validate_wall_solid(&wall.with_geometry(vec![bowtie]));
        assert!(!result.is_valid);
        assert!(result.metrics.self_intersection_count > 0);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == GeometricErrorType::SelfIntersection));
    }

    #[test]
    fn slivers_lower_the_score_only() {
        let wall = offset_wall(&[(0.0, 0.0), (3000.0, 0.0)], 150.0);
        let clean = Validator::default().validate_wall_solid(&wall);
        let mut faces = wall.solid_geometry().to_vec();
        faces.push(poly(&[(5000.0, 0.0), (5100.0, 0.0), (5100.0, 0.05), (5000.0, 0.05)]));
        let result = Validator::default().validate_wall_solid(&wall.with_geometry(faces));
        assert!(result.is_valid, "errors: {:?}", result.errors);
        assert_eq!(result.metrics.sliver_face_count, 1);
        assert_eq!(result.metrics.micro_gap_count, 2);
        assert!(result.quality_score < clean.quality_score);
    }

    #[test]
    fn missing_geometry_is_structural() {
        let baseline = Curve::polyline(&[Point2::new(0.0, 0.0), Point2::new(1000.0, 0.0)]).unwrap();
        let wall = WallSolid::new(baseline, 200.0, WallType::Partition).unwrap();
        let result = Validator::default().validate_wall_solid(&wall);
        assert!(!result.is_valid);
        assert!(result
            .errors
            .iter()
            .all(|e| e.kind == GeometricErrorType::TopologicalConsistency));
        assert!(result.quality_score < 0.5);
    }

    #[test]
    fn displaced_offset_is_structural() {
        let wall = offset_wall(&[(0.0, 0.0), (3000.0, 0.0)], 150.0);
        let moved = Curve::polyline(&[Point2::new(0.0, 125.0), Point2::new(3000.0, 125.0)]).unwrap();
        let right = wall.right_offset().unwrap().clone();
        let result = Validator::default().validate_wall_solid(&wall.with_offsets(moved, right));
        assert!(!result.is_valid);
        assert!(result.errors[0].message.contains("left offset"));
    }

    #[test]
    fn thin_wall_loses_compliance() {
        let wall = offset_wall(&[(0.0, 0.0), (3000.0, 0.0)], 30.0);
        let result = Validator::default().validate_wall_solid(&wall);
        assert!(result.is_valid);
        assert!(result.metrics.architectural_compliance < 1.0);
        assert!(result.warnings.iter().any(|w| w.contains("thickness")));
    }
}
