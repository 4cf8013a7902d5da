//! End-to-end wall processing.
//!
//! [`WallPipeline::process_wall`] takes one baseline through tolerance,
//! offset, boolean normalisation, healing, simplification and validation.
//! [`WallPipeline::process_plan`] does the same for a floor plan, resolving
//! junctions between the walls before they are refined and merging the
//! result into one footprint.

use std::fmt;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::config::KernelConfig;
use crate::error::{GeometricError, GeometricErrorType, Result};
use crate::geometry::{Curve, JoinType, Polygon, WallSolid, WallType};
use crate::math::{direction, turn_angle, EPSILON};
use crate::operations::boolean::{BooleanEngine, BooleanResult};
use crate::operations::healing::HealingEngine;
use crate::operations::intersection::{IntersectionResolver, NetworkReport};
use crate::operations::offset::{assemble_wall, OffsetEngine};
use crate::operations::recovery::{ErrorDescriptor, ErrorHandler, RecoveryResult};
use crate::operations::simplify::SimplificationEngine;
use crate::operations::tolerance::{ToleranceContext, ToleranceManager};
use crate::operations::validate::{ValidationResult, Validator};

/// One wall to process.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WallInput {
    pub baseline: Curve,
    pub thickness: f64,
    pub wall_type: WallType,
    /// Falls back to the offset engine's default join.
    pub join_type: Option<JoinType>,
    /// Falls back to the tolerance manager's recommended precision.
    pub document_precision: Option<f64>,
}

impl WallInput {
    #[must_use]
    pub fn new(baseline: Curve, thickness: f64, wall_type: WallType) -> Self {
        Self {
            baseline,
            thickness,
            wall_type,
            join_type: None,
            document_precision: None,
        }
    }

    #[must_use]
    pub fn with_join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = Some(join_type);
        self
    }

    #[must_use]
    pub fn with_document_precision(mut self, precision: f64) -> Self {
        self.document_precision = Some(precision);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PipelineStage {
    Tolerance,
    Offset,
    Normalization,
    Intersection,
    Healing,
    Simplification,
    Validation,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tolerance => "tolerance",
            Self::Offset => "offset",
            Self::Normalization => "normalization",
            Self::Intersection => "intersection",
            Self::Healing => "healing",
            Self::Simplification => "simplification",
            Self::Validation => "validation",
        })
    }
}

/// Outcome of processing one wall.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// True when the wall was built, validates, and no error remains.
    pub success: bool,
    pub wall: Option<WallSolid>,
    /// Offset tolerance the wall was built with; zero when it could not be computed.
    pub tolerance: f64,
    pub stages_completed: Vec<PipelineStage>,
    pub validation: Option<ValidationResult>,
    /// Every repair attempt made on the way, successful or not.
    pub recoveries: Vec<RecoveryResult>,
    pub warnings: Vec<String>,
    pub errors: Vec<GeometricError>,
    pub processing_time: Duration,
}

/// Outcome of processing a floor plan.
#[derive(Debug, Clone)]
pub struct PlanResult {
    pub success: bool,
    /// One entry per input, in input order.
    pub walls: Vec<PipelineResult>,
    /// Junction resolution over the walls that could be built.
    pub network: Option<NetworkReport>,
    /// Union of every finished wall.
    pub footprint: Option<BooleanResult>,
    pub warnings: Vec<String>,
    pub errors: Vec<GeometricError>,
    pub processing_time: Duration,
}

impl PlanResult {
    /// Walls that came out of the pipeline, in input order.
    #[must_use]
    pub fn solids(&self) -> Vec<&WallSolid> {
        self.walls.iter().filter_map(|w| w.wall.as_ref()).collect()
    }
}

/// State of one wall between stages.
#[derive(Debug, Default)]
struct WallRun {
    solid: Option<WallSolid>,
    tolerances: Tolerances,
    stages: Vec<PipelineStage>,
    validation: Option<ValidationResult>,
    recoveries: Vec<RecoveryResult>,
    warnings: Vec<String>,
    errors: Vec<GeometricError>,
    started: Option<Instant>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tolerances {
    offset: f64,
    boolean: f64,
    healing: f64,
}

impl WallRun {
    fn start() -> Self {
        Self {
            started: Some(Instant::now()),
            ..Self::default()
        }
    }

    fn finish(self) -> PipelineResult {
        let valid = self.validation.as_ref().is_some_and(|v| v.is_valid);
        let success = self.solid.is_some() && valid && self.errors.is_empty();
        PipelineResult {
            success,
            wall: self.solid,
            tolerance: self.tolerances.offset,
            stages_completed: self.stages,
            validation: self.validation,
            recoveries: self.recoveries,
            warnings: self.warnings,
            errors: self.errors,
            processing_time: self.started.map(|s| s.elapsed()).unwrap_or_default(),
        }
    }
}

/// Interior angle (degrees) of the baseline corner farthest from a right
/// angle; 90 for a straight baseline.
fn sharpest_corner(baseline: &Curve) -> f64 {
    let coords = baseline.coords();
    let n = coords.len();
    if n < 3 {
        return 90.0;
    }
    let corners = if baseline.is_closed() { n } else { n - 2 };
    let mut sharpest: f64 = 90.0;
    for k in 0..corners {
        let i = if baseline.is_closed() { k } else { k + 1 };
        let prev = coords[(i + n - 1) % n];
        let next = coords[(i + 1) % n];
        let (Some(d_in), Some(d_out)) = (direction(&prev, &coords[i], EPSILON), direction(&coords[i], &next, EPSILON))
        else {
            continue;
        };
        let interior = 180.0 - turn_angle(&d_in, &d_out).abs().to_degrees();
        if (interior - 90.0).abs() > (sharpest - 90.0).abs() {
            sharpest = interior;
        }
    }
    sharpest
}

/// Runs walls through every engine, configured from one [`KernelConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WallPipeline {
    config: KernelConfig,
    tolerances: ToleranceManager,
    offset: OffsetEngine,
    resolver: IntersectionResolver,
    boolean: BooleanEngine,
    healing: HealingEngine,
    simplifier: SimplificationEngine,
    validator: Validator,
    recovery: ErrorHandler,
}

impl WallPipeline {
    #[must_use]
    pub fn new(config: KernelConfig) -> Self {
        let tolerances = ToleranceManager::new(config.tolerance);
        let healing = HealingEngine::new(config.healing);
        let validator = Validator::new(config.validation);
        Self {
            config,
            tolerances,
            offset: OffsetEngine::new(config.offset),
            resolver: IntersectionResolver::new(config.intersection, tolerances),
            boolean: BooleanEngine::new(config.boolean).with_batch(config.batch),
            healing,
            simplifier: SimplificationEngine::new(config.simplification),
            validator,
            recovery: ErrorHandler::new(config.recovery, healing, validator),
        }
    }

    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Builds, repairs and validates a single wall.
    ///
    /// Stage errors go to the error handler; the pipeline continues with the
    /// repaired solid when recovery succeeds and stops otherwise.
    #[must_use]
    pub fn process_wall(&self, input: &WallInput) -> PipelineResult {
        let _span = tracing::debug_span!("process_wall", thickness = input.thickness).entered();
        let mut run = self.shape(input);
        self.refine(&mut run);
        let result = run.finish();
        tracing::info!(
            success = result.success,
            stages = result.stages_completed.len(),
            warnings = result.warnings.len(),
            errors = result.errors.len(),
            "wall processed"
        );
        result
    }

    /// Processes a floor plan.
    ///
    /// Walls are shaped in groups of the configured batch size, then the
    /// junctions between them are resolved in one network pass, then each
    /// wall is healed, simplified and validated, and finally every finished
    /// wall is merged into a footprint.
    #[must_use]
    pub fn process_plan(&self, inputs: &[WallInput]) -> PlanResult {
        let started = Instant::now();
        let _span = tracing::info_span!("process_plan", walls = inputs.len()).entered();
        let group = self.config.batch.group_size();
        let parallel = self.config.intersection.enable_parallel_processing;

        let shape_group = |chunk: &[WallInput]| chunk.iter().map(|input| self.shape(input)).collect::<Vec<_>>();
        let mut runs: Vec<WallRun> = if parallel {
            inputs.par_chunks(group).map(shape_group).collect::<Vec<_>>().into_iter().flatten().collect()
        } else {
            inputs.chunks(group).flat_map(shape_group).collect()
        };

        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        let network = self.resolve_network(&mut runs);
        if let Some(report) = &network {
            warnings.extend(report.warnings.iter().cloned());
            errors.extend(report.errors.iter().filter(|e| e.is_fatal()).cloned());
        }

        let refine_group = |chunk: &mut [WallRun]| chunk.iter_mut().for_each(|run| self.refine(run));
        if parallel {
            runs.par_chunks_mut(group).for_each(refine_group);
        } else {
            runs.chunks_mut(group).for_each(refine_group);
        }
        let walls: Vec<PipelineResult> = runs.into_iter().map(WallRun::finish).collect();

        let finished: Vec<WallSolid> = walls.iter().filter_map(|w| w.wall.clone()).collect();
        let footprint = (!finished.is_empty()).then(|| {
            let tolerance = walls
                .iter()
                .filter(|w| w.wall.is_some())
                .map(|w| w.tolerance)
                .fold(0.0, f64::max);
            let union = self.boolean.batch_union(&finished, tolerance);
            warnings.extend(union.warnings.iter().cloned());
            errors.extend(union.errors.iter().cloned());
            union
        });

        let success = walls.iter().all(|w| w.success)
            && network.as_ref().is_none_or(|n| n.success)
            && footprint.as_ref().is_none_or(|f| f.success)
            && errors.is_empty();
        let failed = walls.iter().filter(|w| !w.success).count();
        tracing::info!(
            walls = walls.len(),
            failed,
            junctions = network.as_ref().map_or(0, |n| n.intersections.len()),
            success,
            "floor plan processed"
        );
        PlanResult {
            success,
            walls,
            network,
            footprint,
            warnings,
            errors,
            processing_time: started.elapsed(),
        }
    }

    /// Tolerance, offset and normalisation.
    fn shape(&self, input: &WallInput) -> WallRun {
        let mut run = WallRun::start();

        let tolerances = {
            let _stage = tracing::debug_span!("stage", stage = %PipelineStage::Tolerance).entered();
            match self.tolerances_for(input) {
                Ok(t) => t,
                Err(e) => {
                    self.recover(&mut run, e.in_operation("process_wall"));
                    return run;
                }
            }
        };
        run.tolerances = tolerances;
        run.stages.push(PipelineStage::Tolerance);

        let solid = {
            let _stage = tracing::debug_span!("stage", stage = %PipelineStage::Offset).entered();
            let join = input.join_type.unwrap_or(self.offset.config().default_join_type);
            let offset = self
                .offset
                .offset_curve(&input.baseline, input.thickness * 0.5, join, tolerances.offset);
            run.warnings.extend(offset.warnings.iter().cloned());
            let built = WallSolid::new(input.baseline.clone(), input.thickness, input.wall_type)
                .and_then(|wall| assemble_wall(wall, &offset, tolerances.offset));
            match built {
                Ok(solid) => solid,
                Err(e) => {
                    self.recover(&mut run, e.in_operation("offset_wall"));
                    return run;
                }
            }
        };
        run.stages.push(PipelineStage::Offset);

        let _stage = tracing::debug_span!("stage", stage = %PipelineStage::Normalization).entered();
        match self.normalize(&solid, tolerances.boolean, &mut run.warnings) {
            Ok(normalized) => {
                run.solid = Some(normalized);
                run.stages.push(PipelineStage::Normalization);
            }
            Err(e) => {
                run.solid = Some(solid);
                self.recover(&mut run, e);
                if run.solid.is_some() {
                    run.stages.push(PipelineStage::Normalization);
                }
            }
        }
        run
    }

    /// Healing, simplification and validation.
    fn refine(&self, run: &mut WallRun) {
        let Some(mut solid) = run.solid.take() else {
            return;
        };
        let tolerances = run.tolerances;

        if self.healing.config().enable_auto_healing {
            let _stage = tracing::debug_span!("stage", stage = %PipelineStage::Healing).entered();
            let healed = self.healing.heal_shape(&solid, tolerances.healing);
            run.warnings.extend(healed.warnings);
            if healed.success {
                solid = healed.healed_solid;
            } else if let Some(e) = healed.errors.into_iter().next() {
                run.solid = Some(solid);
                self.recover(run, e);
                let Some(recovered) = run.solid.take() else {
                    return;
                };
                solid = recovered;
            }
            run.stages.push(PipelineStage::Healing);
        }

        {
            let _stage = tracing::debug_span!("stage", stage = %PipelineStage::Simplification).entered();
            let simplified = self.simplifier.simplify_wall_geometry(&solid, tolerances.offset);
            run.warnings.extend(simplified.warnings);
            if simplified.success {
                solid = simplified.simplified_solid;
                run.stages.push(PipelineStage::Simplification);
            } else {
                for e in &simplified.errors {
                    run.warnings.push(format!("simplification skipped: {e}"));
                }
            }
        }

        let _stage = tracing::debug_span!("stage", stage = %PipelineStage::Validation).entered();
        let mut check = self.validator.validate_wall_solid(&solid);
        if !check.is_valid {
            let error = check
                .errors
                .first()
                .cloned()
                .unwrap_or_else(|| GeometricError::new(GeometricErrorType::ValidationFailure, "wall solid failed validation"));
            run.solid = Some(solid);
            self.recover(run, error);
            let Some(recovered) = run.solid.take() else {
                run.validation = Some(check);
                return;
            };
            solid = recovered;
            check = self.validator.validate_wall_solid(&solid);
        }
        run.warnings.extend(check.warnings.iter().cloned());
        run.stages.push(PipelineStage::Validation);
        run.solid = Some(solid.with_quality(check.metrics));
        run.validation = Some(check);
    }

    fn tolerances_for(&self, input: &WallInput) -> Result<Tolerances> {
        let precision = input
            .document_precision
            .unwrap_or_else(|| self.tolerances.recommended_precision());
        let angle = sharpest_corner(&input.baseline);
        let at = |context| {
            self.tolerances
                .calculate_tolerance(input.thickness, precision, angle, context)
        };
        Ok(Tolerances {
            offset: at(ToleranceContext::OffsetOperation)?,
            boolean: at(ToleranceContext::BooleanOperation)?,
            healing: at(ToleranceContext::ShapeHealing)?,
        })
    }

    /// Unions the faces of a solid one at a time so overlapping faces merge
    /// and invalid ones are caught before healing.
    fn normalize(&self, solid: &WallSolid, tolerance: f64, warnings: &mut Vec<String>) -> Result<WallSolid> {
        let mut merged: Vec<Polygon> = Vec::new();
        for face in solid.solid_geometry() {
            let result = self.boolean.union(&merged, std::slice::from_ref(face), tolerance);
            if let Some(e) = result.errors.into_iter().next() {
                return Err(e.in_operation("normalize"));
            }
            warnings.extend(result.warnings);
            merged = result.polygons;
        }
        Ok(solid.clone().with_geometry(merged))
    }

    /// Resolves junctions between every wall that has a solid and writes
    /// the adjusted solids back.
    fn resolve_network(&self, runs: &mut [WallRun]) -> Option<NetworkReport> {
        let built: Vec<usize> = runs
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.solid.as_ref().map(|_| i))
            .collect();
        if built.len() < 2 {
            return None;
        }
        let walls: Vec<WallSolid> = built.iter().filter_map(|&i| runs[i].solid.clone()).collect();
        let tolerance = built.iter().map(|&i| runs[i].tolerances.offset).fold(0.0, f64::max);

        let _stage = tracing::debug_span!("stage", stage = %PipelineStage::Intersection).entered();
        let report = self.resolver.optimize_intersection_network(&walls, tolerance);
        if report.walls.len() == built.len() {
            for (&i, wall) in built.iter().zip(&report.walls) {
                let run = &mut runs[i];
                run.solid = Some(wall.clone());
                run.stages.push(PipelineStage::Intersection);
            }
        } else {
            tracing::warn!(expected = built.len(), got = report.walls.len(), "network returned a different wall count");
        }
        Some(report)
    }

    /// Hands `error` to the error handler. On success the repaired solid
    /// replaces the current one; otherwise the solid is dropped and the
    /// handler's errors are recorded.
    fn recover(&self, run: &mut WallRun, error: GeometricError) {
        let tolerance = run.tolerances.healing.max(self.tolerances.recommended_precision());
        let mut descriptor = ErrorDescriptor::new(error, tolerance);
        if let Some(solid) = &run.solid {
            descriptor = descriptor.with_solid(solid);
        }
        let outcome = self.recovery.handle_geometric_error(&descriptor);
        let kind = descriptor.error.kind;

        if outcome.success {
            run.warnings.push(format!(
                "recovered from {kind} after {} attempt(s)",
                outcome.attempts
            ));
            run.solid.clone_from(&outcome.recovered_solid);
        } else {
            tracing::warn!(%kind, attempts = outcome.attempts, "stage failed");
            run.errors.extend(outcome.errors.iter().cloned());
            run.solid = None;
        }
        run.recoveries.push(outcome);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{HealingConfig, RecoveryConfig};
    use crate::math::Point2;

    fn baseline(coords: &[(f64, f64)]) -> Curve {
        let pts: Vec<Point2> = coords.iter().map(|&(x, y)| Point2::new(x, y)).collect();
        Curve::polyline(&pts).unwrap()
    }

    #[test]
    fn straight_wall_runs_every_stage() {
        let pipeline = WallPipeline::default();
        let input = WallInput::new(baseline(&[(0.0, 0.0), (4000.0, 0.0)]), 200.0, WallType::Exterior);
        let result = pipeline.process_wall(&input);
        assert!(result.success, "errors: {:?}", result.errors);
        assert_eq!(
            result.stages_completed,
            vec![
                PipelineStage::Tolerance,
                PipelineStage::Offset,
                PipelineStage::Normalization,
                PipelineStage::Healing,
                PipelineStage::Simplification,
                PipelineStage::Validation,
            ]
        );
        let wall = result.wall.unwrap();
        assert!((wall.area() - 800_000.0).abs() < 1.0, "area {}", wall.area());
        assert!(wall.geometric_quality().geometric_accuracy > 0.9);
        assert!(result.recoveries.is_empty());
    }

    #[test]
    fn healing_stage_is_skipped_when_disabled() {
        let config = KernelConfig::default().with_healing(HealingConfig::default().with_auto_healing(false));
        let pipeline = WallPipeline::new(config);
        let input = WallInput::new(baseline(&[(0.0, 0.0), (3000.0, 0.0)]), 150.0, WallType::Interior);
        let result = pipeline.process_wall(&input);
        assert!(result.success);
        assert!(!result.stages_completed.contains(&PipelineStage::Healing));
    }

    #[test]
    fn non_positive_thickness_is_fatal() {
        let pipeline = WallPipeline::default();
        let input = WallInput::new(baseline(&[(0.0, 0.0), (3000.0, 0.0)]), 0.0, WallType::Interior);
        let result = pipeline.process_wall(&input);
        assert!(!result.success);
        assert!(result.wall.is_none());
        assert!(result.stages_completed.is_empty());
        assert_eq!(result.errors[0].kind, GeometricErrorType::InvalidParameter);
        assert_eq!(result.recoveries.len(), 1);
        assert!(!result.recoveries[0].recovery_applied);
    }

    #[test]
    fn recovery_disabled_still_reports() {
        let config = KernelConfig::default().with_recovery(RecoveryConfig::default().with_auto_recovery(false));
        let pipeline = WallPipeline::new(config);
        let input = WallInput::new(baseline(&[(0.0, 0.0), (3000.0, 0.0)]), -5.0, WallType::Interior);
        let result = pipeline.process_wall(&input);
        assert!(!result.success);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn corner_angle_of_baselines() {
        assert!((sharpest_corner(&baseline(&[(0.0, 0.0), (1000.0, 0.0)])) - 90.0).abs() < 1e-9);
        assert!((sharpest_corner(&baseline(&[(0.0, 0.0), (1000.0, 0.0), (1000.0, 1000.0)])) - 90.0).abs() < 1e-9);
        let acute = sharpest_corner(&baseline(&[(0.0, 0.0), (1000.0, 0.0), (0.0, 200.0)]));
        assert!(acute < 20.0, "got {acute}");
    }

    #[test]
    fn plan_resolves_an_l_corner_and_builds_a_footprint() {
        let pipeline = WallPipeline::default();
        let inputs = vec![
            WallInput::new(baseline(&[(0.0, 0.0), (3000.0, 0.0)]), 200.0, WallType::Exterior),
            WallInput::new(baseline(&[(3000.0, 0.0), (3000.0, 2000.0)]), 200.0, WallType::Exterior),
        ];
        let plan = pipeline.process_plan(&inputs);
        assert!(plan.success, "errors: {:?}", plan.errors);
        assert_eq!(plan.walls.len(), 2);
        let network = plan.network.as_ref().unwrap();
        assert_eq!(network.intersections.len(), 1);
        assert!(plan.walls[0].stages_completed.contains(&PipelineStage::Intersection));
        let footprint = plan.footprint.as_ref().unwrap();
        assert!(footprint.success);
        let walls: f64 = plan.solids().iter().map(|w| w.area()).sum();
        assert!((footprint.area() - walls).abs() < 1.0, "{} vs {walls}", footprint.area());
    }

    #[test]
    fn plan_keeps_going_past_a_bad_wall() {
        let pipeline = WallPipeline::default();
        let inputs = vec![
            WallInput::new(baseline(&[(0.0, 0.0), (3000.0, 0.0)]), 200.0, WallType::Exterior),
            WallInput::new(baseline(&[(0.0, 5000.0), (3000.0, 5000.0)]), 0.0, WallType::Exterior),
        ];
        let plan = pipeline.process_plan(&inputs);
        assert!(!plan.success);
        assert!(plan.walls[0].success);
        assert!(!plan.walls[1].success);
        assert!(plan.network.is_none());
        assert_eq!(plan.solids().len(), 1);
    }
}
