//! Boolean engine: union, intersection and difference of wall faces.
//!
//! Operands are sets of non-overlapping polygons. Their boundary edges are
//! split at every mutual contact, each fragment is classified against the
//! other operand, kept or dropped by the operation's decision table, and
//! the kept fragments are chained back into rings. Every predicate runs
//! against the caller's tolerance.

mod assemble;
mod classify;
mod engine;
mod select;
mod split;

use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::config::{BatchConfig, BooleanConfig};
use crate::error::{GeometricError, Result};
use crate::geometry::{IntersectionData, Polygon, WallSolid};
use crate::operations::intersection::{IntersectionResolver, JunctionResult};

pub use engine::boolean_execute;
pub use select::BooleanOp;

/// Outcome of a boolean operation.
#[derive(Debug, Clone)]
pub struct BooleanResult {
    pub success: bool,
    pub polygons: Vec<Polygon>,
    /// Set when the result is valid but has sliver faces.
    pub requires_healing: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<GeometricError>,
    pub processing_time: Duration,
}

impl BooleanResult {
    #[must_use]
    pub fn area(&self) -> f64 {
        self.polygons.iter().map(Polygon::area).sum()
    }

    fn failed(error: GeometricError, operation: &'static str, started: Instant) -> Self {
        tracing::warn!(%error, operation, "boolean operation failed");
        Self {
            success: false,
            polygons: Vec::new(),
            requires_healing: false,
            warnings: Vec::new(),
            errors: vec![error.in_operation(operation)],
            processing_time: started.elapsed(),
        }
    }
}

/// Two walls resolved at a junction and unioned into one footprint.
#[derive(Debug, Clone)]
pub struct JunctionComposition {
    pub success: bool,
    pub polygons: Vec<Polygon>,
    pub intersection: Option<IntersectionData>,
    /// The walls after junction resolution.
    pub walls: Vec<WallSolid>,
    pub requires_healing: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<GeometricError>,
}

/// Accumulated state of a union fold.
#[derive(Debug, Default)]
struct Fold {
    polygons: Vec<Polygon>,
    merged: usize,
    /// Shapes dropped after a recoverable failure.
    skipped: usize,
    stopped: bool,
    warnings: Vec<String>,
    errors: Vec<GeometricError>,
}

impl Fold {
    fn absorb(&mut self, label: &str, shape: &[Polygon], tolerance: f64) {
        if self.stopped {
            return;
        }
        if shape.is_empty() {
            self.warnings.push(format!("{label} has no solid geometry, skipped"));
            return;
        }
        match boolean_execute(&self.polygons, shape, BooleanOp::Union, tolerance) {
            Ok(outcome) => {
                self.polygons = outcome.polygons;
                self.warnings.extend(outcome.warnings);
                self.merged += 1;
            }
            Err(e) if e.is_fatal() => {
                tracing::warn!(error = %e, label, "batch union stopped");
                self.stopped = true;
                self.errors.push(e.in_operation("batch_union"));
            }
            Err(e) => {
                self.skipped += 1;
                self.warnings.push(format!("{label} skipped: {e}"));
                self.errors.push(e.in_operation("batch_union"));
            }
        }
    }
}

fn check_tolerance(tolerance: f64) -> Result<()> {
    if tolerance.is_finite() && tolerance > 0.0 {
        Ok(())
    } else {
        Err(GeometricError::invalid_parameter(format!(
            "tolerance must be positive, got {tolerance}"
        )))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanEngine {
    config: BooleanConfig,
    batch: BatchConfig,
}

impl BooleanEngine {
    #[must_use]
    pub fn new(config: BooleanConfig) -> Self {
        Self {
            config,
            batch: BatchConfig::default(),
        }
    }

    /// Sets how many walls [`BooleanEngine::batch_union`] folds per task.
    #[must_use]
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    #[must_use]
    pub fn config(&self) -> &BooleanConfig {
        &self.config
    }

    fn check_complexity(&self, vertices: usize) -> Result<()> {
        if vertices > self.config.max_complexity {
            return Err(GeometricError::complexity_exceeded(format!(
                "{vertices} input vertices exceed the budget of {}",
                self.config.max_complexity
            )));
        }
        Ok(())
    }

    fn finish(&self, polygons: Vec<Polygon>, mut warnings: Vec<String>, started: Instant) -> BooleanResult {
        let slivers = polygons
            .iter()
            .filter(|p| p.is_sliver(self.config.sliver_face_threshold))
            .count();
        if slivers > 0 {
            warnings.push(format!("{slivers} sliver faces in result"));
        }
        for w in &warnings {
            tracing::warn!("{w}");
        }
        BooleanResult {
            success: true,
            polygons,
            requires_healing: slivers > 0,
            warnings,
            errors: Vec::new(),
            processing_time: started.elapsed(),
        }
    }

    /// Runs `op` on two shapes.
    ///
    /// Fails with `boolean_failure` on invalid inputs and with
    /// `complexity_exceeded` when the operands together have more vertices
    /// than the configured budget. A valid result with slivers sets
    /// `requires_healing` instead of failing.
    #[must_use]
    pub fn execute(&self, a: &[Polygon], b: &[Polygon], op: BooleanOp, tolerance: f64) -> BooleanResult {
        let started = Instant::now();
        let _span = tracing::debug_span!("boolean", %op, a = a.len(), b = b.len()).entered();
        let vertices: usize = a.iter().chain(b).map(Polygon::vertex_count).sum();
        let outcome = check_tolerance(tolerance)
            .and_then(|()| self.check_complexity(vertices))
            .and_then(|()| boolean_execute(a, b, op, tolerance));
        match outcome {
            Ok(outcome) => self.finish(outcome.polygons, outcome.warnings, started),
            Err(e) => BooleanResult::failed(e, "boolean", started),
        }
    }

    #[must_use]
    pub fn union(&self, a: &[Polygon], b: &[Polygon], tolerance: f64) -> BooleanResult {
        self.execute(a, b, BooleanOp::Union, tolerance)
    }

    #[must_use]
    pub fn intersection(&self, a: &[Polygon], b: &[Polygon], tolerance: f64) -> BooleanResult {
        self.execute(a, b, BooleanOp::Intersection, tolerance)
    }

    /// `a` minus `b`.
    #[must_use]
    pub fn difference(&self, a: &[Polygon], b: &[Polygon], tolerance: f64) -> BooleanResult {
        self.execute(a, b, BooleanOp::Difference, tolerance)
    }

    /// Union of two walls' solid geometry.
    #[must_use]
    pub fn union_solids(&self, a: &WallSolid, b: &WallSolid, tolerance: f64) -> BooleanResult {
        self.union(a.solid_geometry(), b.solid_geometry(), tolerance)
    }

    /// Folds every wall's solid geometry into one union.
    ///
    /// Walls are folded in groups of the batch group size, in parallel when
    /// enabled, and the group results are folded in order. A recoverable
    /// failure skips the wall and the fold carries on; the first
    /// unrecoverable one stops it. Either way the union so far is returned
    /// with `success` false and the failures in `errors`. Walls without
    /// geometry contribute nothing and only raise a warning.
    #[must_use]
    pub fn batch_union(&self, walls: &[WallSolid], tolerance: f64) -> BooleanResult {
        let started = Instant::now();
        let _span = tracing::debug_span!("batch_union", walls = walls.len()).entered();
        let vertices: usize = walls
            .iter()
            .flat_map(WallSolid::solid_geometry)
            .map(Polygon::vertex_count)
            .sum();
        if let Err(e) = check_tolerance(tolerance).and_then(|()| self.check_complexity(vertices)) {
            return BooleanResult::failed(e, "batch_union", started);
        }

        let group_size = self.batch.group_size();
        let fold_group = |group: &[WallSolid]| {
            let mut fold = Fold::default();
            for wall in group {
                fold.absorb(&format!("wall {}", wall.id()), wall.solid_geometry(), tolerance);
            }
            fold
        };
        let groups: Vec<Fold> = if self.config.enable_parallel_processing {
            walls.par_chunks(group_size).map(fold_group).collect()
        } else {
            walls.chunks(group_size).map(fold_group).collect()
        };

        let mut total = Fold::default();
        for (i, group) in groups.into_iter().enumerate() {
            if total.stopped {
                break;
            }
            total.warnings.extend(group.warnings);
            total.errors.extend(group.errors);
            total.skipped += group.skipped;
            if !group.polygons.is_empty() {
                total.absorb(&format!("group {i}"), &group.polygons, tolerance);
                total.merged += group.merged.saturating_sub(1);
            }
            if group.stopped {
                total.stopped = true;
            }
        }

        let stopped = total.stopped;
        let skipped = total.skipped;
        let mut result = self.finish(total.polygons, total.warnings, started);
        if skipped > 0 {
            result.success = false;
            result
                .warnings
                .push(format!("batch_union left out {skipped} shape(s) that failed to merge"));
        }
        if stopped {
            result.success = false;
            result
                .warnings
                .push(format!("batch_union stopped early; partial result covers {} of {} walls", total.merged, walls.len()));
        }
        result.errors = total.errors;
        tracing::info!(walls = walls.len(), merged = total.merged, polygons = result.polygons.len(), "batch union done");
        result
    }

    /// Resolves a T junction and unions the two walls with the junction patch.
    #[must_use]
    pub fn compose_t_junction(
        &self,
        resolver: &IntersectionResolver,
        main: &WallSolid,
        branch: &WallSolid,
        tolerance: f64,
    ) -> JunctionComposition {
        let junction = resolver.resolve_t_junction(main, branch, tolerance);
        self.compose(junction, tolerance)
    }

    /// Resolves an L junction and unions the two walls with the corner patch.
    #[must_use]
    pub fn compose_l_junction(
        &self,
        resolver: &IntersectionResolver,
        a: &WallSolid,
        b: &WallSolid,
        tolerance: f64,
    ) -> JunctionComposition {
        let junction = resolver.resolve_l_junction(a, b, tolerance);
        self.compose(junction, tolerance)
    }

    fn compose(&self, junction: JunctionResult, tolerance: f64) -> JunctionComposition {
        let JunctionResult {
            success,
            intersection,
            walls,
            mut warnings,
            mut errors,
        } = junction;

        if let [a, b] = walls.as_slice() {
            if (a.thickness() - b.thickness()).abs() > tolerance && !warnings.iter().any(|w| w.contains("thickness")) {
                warnings.push(format!(
                    "thickness mismatch at junction: {} vs {}",
                    a.thickness(),
                    b.thickness()
                ));
            }
        }

        if !success {
            return JunctionComposition {
                success: false,
                polygons: Vec::new(),
                intersection,
                walls,
                requires_healing: false,
                warnings,
                errors,
            };
        }

        let mut result = self.batch_union(&walls, tolerance);
        if let Some(patch) = intersection.as_ref().and_then(|i| i.resolved_geometry.clone()) {
            if result.success {
                result = self.union(&result.polygons, &[patch], tolerance);
            }
        }
        warnings.extend(result.warnings);
        errors.extend(result.errors);
        JunctionComposition {
            success: result.success,
            polygons: result.polygons,
            intersection,
            walls,
            requires_healing: result.requires_healing,
            warnings,
            errors,
        }
    }
}
