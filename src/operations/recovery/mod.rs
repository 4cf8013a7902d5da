//! Error handler: turns a failed stage's error into bounded repair attempts.

use std::fmt;
use std::time::{Duration, Instant};

use crate::config::RecoveryConfig;
use crate::error::{GeometricError, GeometricErrorType};
use crate::geometry::WallSolid;
use crate::operations::healing::HealingEngine;
use crate::operations::validate::Validator;

/// How an error kind is repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RecoveryStrategy {
    /// Heal at the given tolerance, then validate again.
    HealAndRevalidate,
    /// Heal at a tolerance doubled on every attempt.
    WidenToleranceAndHeal,
    /// Report only.
    None,
}

impl RecoveryStrategy {
    #[must_use]
    pub fn for_error(kind: GeometricErrorType) -> Self {
        match kind {
            GeometricErrorType::DegenerateGeometry
            | GeometricErrorType::OffsetFailure
            | GeometricErrorType::DuplicateVertices
            | GeometricErrorType::SelfIntersection
            | GeometricErrorType::BooleanFailure
            | GeometricErrorType::TopologicalConsistency
            | GeometricErrorType::ValidationFailure
            | GeometricErrorType::DimensionalAccuracy => Self::HealAndRevalidate,
            GeometricErrorType::NumericalInstability | GeometricErrorType::ToleranceExceeded => {
                Self::WidenToleranceAndHeal
            }
            GeometricErrorType::InvalidParameter | GeometricErrorType::ComplexityExceeded => Self::None,
        }
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HealAndRevalidate => "heal_and_revalidate",
            Self::WidenToleranceAndHeal => "widen_tolerance_and_heal",
            Self::None => "none",
        })
    }
}

/// An error together with the solid it was raised on.
#[derive(Debug, Clone)]
pub struct ErrorDescriptor<'a> {
    pub error: GeometricError,
    pub solid: Option<&'a WallSolid>,
    pub tolerance: f64,
}

impl<'a> ErrorDescriptor<'a> {
    #[must_use]
    pub fn new(error: GeometricError, tolerance: f64) -> Self {
        Self {
            error,
            solid: None,
            tolerance,
        }
    }

    #[must_use]
    pub fn with_solid(mut self, solid: &'a WallSolid) -> Self {
        self.solid = Some(solid);
        self
    }
}

/// Outcome of [`ErrorHandler::handle_geometric_error`].
#[derive(Debug, Clone)]
pub struct RecoveryResult {
    /// True when the repaired solid validates.
    pub success: bool,
    /// True when at least one repair attempt ran.
    pub recovery_applied: bool,
    pub strategy: RecoveryStrategy,
    pub recovery_steps: Vec<String>,
    pub attempts: usize,
    /// Quality score after recovery minus the score before.
    pub quality_improvement: f64,
    pub recovered_solid: Option<WallSolid>,
    /// The original error, plus anything raised while recovering, when
    /// recovery did not succeed.
    pub errors: Vec<GeometricError>,
    pub processing_time: Duration,
}

impl RecoveryResult {
    fn not_attempted(error: &GeometricError, strategy: RecoveryStrategy, step: String, started: Instant) -> Self {
        Self {
            success: false,
            recovery_applied: false,
            strategy,
            recovery_steps: vec![step],
            attempts: 0,
            quality_improvement: 0.0,
            recovered_solid: None,
            errors: vec![error.clone()],
            processing_time: started.elapsed(),
        }
    }
}

/// Dispatches errors to repair strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorHandler {
    config: RecoveryConfig,
    healing: HealingEngine,
    validator: Validator,
}

impl ErrorHandler {
    #[must_use]
    pub fn new(config: RecoveryConfig, healing: HealingEngine, validator: Validator) -> Self {
        Self {
            config,
            healing,
            validator,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Attempts to repair the solid attached to `descriptor`.
    ///
    /// Fatal errors and kinds without a strategy are reported without an
    /// attempt. Otherwise the solid is healed and revalidated up to
    /// `max_recovery_attempts` times, stopping at the first valid result.
    /// Healing at an unchanged tolerance stops as soon as it finds nothing
    /// left to fix.
    #[must_use]
    pub fn handle_geometric_error(&self, descriptor: &ErrorDescriptor<'_>) -> RecoveryResult {
        let started = Instant::now();
        let error = &descriptor.error;
        let strategy = RecoveryStrategy::for_error(error.kind);
        let _span = tracing::debug_span!("handle_geometric_error", kind = %error.kind, %strategy).entered();

        if error.is_fatal() || strategy == RecoveryStrategy::None {
            tracing::warn!(kind = %error.kind, "error is not recoverable");
            return RecoveryResult::not_attempted(
                error,
                RecoveryStrategy::None,
                format!("{} is not recoverable", error.kind),
                started,
            );
        }
        if !self.config.enable_auto_recovery {
            return RecoveryResult::not_attempted(error, strategy, "automatic recovery disabled".to_string(), started);
        }
        let Some(solid) = descriptor.solid else {
            return RecoveryResult::not_attempted(error, strategy, "no solid to repair".to_string(), started);
        };

        let before = self.validator.validate_wall_solid(solid).quality_score;
        let mut current = solid.clone();
        let mut steps = Vec::new();
        let mut errors = Vec::new();
        let mut attempts = 0;
        let mut tolerance = descriptor.tolerance;
        let mut valid = false;
        let mut after = before;

        while attempts < self.config.max_recovery_attempts {
            attempts += 1;
            let healed = self.healing.heal_shape(&current, tolerance);
            if healed.success {
                let ops: Vec<String> = healed.operations_applied.iter().map(|r| r.operation.to_string()).collect();
                steps.push(format!(
                    "attempt {attempts}: healed at tolerance {tolerance} ({})",
                    if ops.is_empty() { "nothing to fix".to_string() } else { ops.join(", ") }
                ));
                let progressed = !healed.operations_applied.is_empty();
                current = healed.healed_solid;

                let check = self.validator.validate_wall_solid(&current);
                after = check.quality_score;
                valid = check.is_valid;
                steps.push(format!(
                    "attempt {attempts}: revalidated, valid = {}, score = {:.4}",
                    check.is_valid, check.quality_score
                ));
                if valid {
                    break;
                }
                if !progressed && strategy == RecoveryStrategy::HealAndRevalidate {
                    break;
                }
                if attempts == self.config.max_recovery_attempts {
                    errors.extend(check.errors);
                }
            } else {
                steps.push(format!("attempt {attempts}: healing failed at tolerance {tolerance}"));
                errors.extend(healed.errors);
                if strategy == RecoveryStrategy::HealAndRevalidate {
                    break;
                }
            }
            if strategy == RecoveryStrategy::WidenToleranceAndHeal {
                tolerance *= 2.0;
            }
        }

        let quality_improvement = after - before;
        if valid {
            tracing::debug!(attempts, quality_improvement, "recovered");
            errors.clear();
        } else {
            tracing::warn!(attempts, kind = %error.kind, "recovery exhausted");
            errors.insert(0, error.clone());
        }

        RecoveryResult {
            success: valid,
            recovery_applied: attempts > 0,
            strategy,
            recovery_steps: steps,
            attempts,
            quality_improvement,
            recovered_solid: Some(current),
            errors,
            processing_time: started.elapsed(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::{CreationMethod, Curve, JoinType, Polygon, WallType};
    use crate::math::Point2;
    use crate::operations::offset::OffsetEngine;

    fn wall() -> WallSolid {
        let baseline = Curve::polyline(&[Point2::new(0.0, 0.0), Point2::new(3000.0, 0.0)]).unwrap();
        OffsetEngine::default()
            .offset_wall(&baseline, 150.0, WallType::Interior, JoinType::Miter, 0.01)
            .unwrap()
    }

    fn poly(coords: &[(f64, f64)]) -> Polygon {
        let pts: Vec<Point2> = coords.iter().map(|&(x, y)| Point2::new(x, y)).collect();
        Polygon::from_coords(&pts, &[], CreationMethod::UserInput, 0.01).unwrap()
    }

    fn with_sliver(wall: WallSolid) -> WallSolid {
        let mut faces = wall.solid_geometry().to_vec();
        faces.push(poly(&[(5000.0, 0.0), (5100.0, 0.0), (5100.0, 0.05), (5000.0, 0.05)]));
        wall.with_geometry(faces)
    }

    fn bowtie(wall: WallSolid) -> WallSolid {
        wall.with_geometry(vec![poly(&[(0.0, -75.0), (3000.0, 75.0), (3000.0, -75.0), (0.0, 40.0)])])
    }

    #[test]
    fn strategy_dispatch() {
        assert_eq!(
            RecoveryStrategy::for_error(GeometricErrorType::OffsetFailure),
            RecoveryStrategy::HealAndRevalidate
        );
        assert_eq!(
            RecoveryStrategy::for_error(GeometricErrorType::NumericalInstability),
            RecoveryStrategy::WidenToleranceAndHeal
        );
        assert_eq!(
            RecoveryStrategy::for_error(GeometricErrorType::ComplexityExceeded),
            RecoveryStrategy::None
        );
    }

    #[test]
    fn invalid_parameter_is_never_retried() {
        let solid = wall();
        let descriptor = ErrorDescriptor::new(GeometricError::invalid_parameter("thickness"), 0.01).with_solid(&solid);
        let result = ErrorHandler::default().handle_geometric_error(&descriptor);
        assert!(!result.success);
        assert!(!result.recovery_applied);
        assert_eq!(result.attempts, 0);
        assert_eq!(result.errors[0].kind, GeometricErrorType::InvalidParameter);
    }

    #[test]
    fn degenerate_solid_is_healed() {
        let solid = with_sliver(wall());
        let descriptor = ErrorDescriptor::new(GeometricError::degenerate("sliver"), 0.01).with_solid(&solid);
        let result = ErrorHandler::default().handle_geometric_error(&descriptor);
        assert!(result.success, "steps: {:?}", result.recovery_steps);
        assert!(result.recovery_applied);
        assert_eq!(result.attempts, 1);
        assert!(result.quality_improvement > 0.0);
        assert!(result.errors.is_empty());
        let recovered = result.recovered_solid.unwrap();
        assert_eq!(recovered.solid_geometry().len(), 1);
        assert_eq!(recovered.healing_history().len(), 1);
    }

    #[test]
    fn unfixable_solid_stops_after_one_heal() {
        let solid = bowtie(wall());
        let descriptor = ErrorDescriptor::new(GeometricError::self_intersection("crossing"), 0.01).with_solid(&solid);
        let result = ErrorHandler::default().handle_geometric_error(&descriptor);
        assert!(!result.success);
        assert!(result.recovery_applied);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.errors[0].kind, GeometricErrorType::SelfIntersection);
    }

    #[test]
    fn widening_runs_every_attempt() {
        let solid = bowtie(wall());
        let descriptor = ErrorDescriptor::new(GeometricError::numerical("unstable"), 0.01).with_solid(&solid);
        let result = ErrorHandler::default().handle_geometric_error(&descriptor);
        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert!(result.recovery_steps.iter().any(|s| s.contains("tolerance 0.04")));
    }

    #[test]
    fn disabled_recovery_reports_only() {
        let solid = with_sliver(wall());
        let handler = ErrorHandler::new(
            RecoveryConfig::default().with_auto_recovery(false),
            HealingEngine::default(),
            Validator::default(),
        );
        let descriptor = ErrorDescriptor::new(GeometricError::degenerate("sliver"), 0.01).with_solid(&solid);
        let result = handler.handle_geometric_error(&descriptor);
        assert!(!result.recovery_applied);
        assert_eq!(result.recovery_steps, vec!["automatic recovery disabled".to_string()]);
    }

    #[test]
    fn missing_solid_is_reported() {
        let descriptor = ErrorDescriptor::new(GeometricError::offset_failure("no offsets"), 0.01);
        let result = ErrorHandler::default().handle_geometric_error(&descriptor);
        assert!(!result.success);
        assert_eq!(result.attempts, 0);
    }
}
