use std::fmt;

use crate::config::ToleranceConfig;
use crate::error::{GeometricError, Result};

/// Operation a tolerance is computed for. Each context scales the base value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ToleranceContext {
    VertexMerge,
    OffsetOperation,
    ShapeHealing,
    BooleanOperation,
}

impl ToleranceContext {
    /// Multiplier applied to the base tolerance. Vertex merging is the
    /// tightest; booleans accumulate the most error and get the loosest.
    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            Self::VertexMerge => 0.5,
            Self::OffsetOperation => 1.0,
            Self::ShapeHealing => 1.5,
            Self::BooleanOperation => 2.0,
        }
    }
}

impl fmt::Display for ToleranceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VertexMerge => "vertex_merge",
            Self::OffsetOperation => "offset_operation",
            Self::ShapeHealing => "shape_healing",
            Self::BooleanOperation => "boolean_operation",
        })
    }
}

/// Outcome of [`ToleranceManager::validate_tolerance`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceValidation {
    pub is_valid: bool,
    /// Accepted range `(min, max)`.
    pub bounds: (f64, f64),
    pub recommendations: Vec<String>,
}

/// Turns wall thickness, document precision, local angle and operation
/// context into a numeric tolerance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToleranceManager {
    config: ToleranceConfig,
}

impl ToleranceManager {
    #[must_use]
    pub fn new(config: ToleranceConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ToleranceConfig {
        &self.config
    }

    /// Computes the tolerance for one operation.
    ///
    /// The base is the larger of the configured base tolerance and the
    /// document precision. It grows linearly with thickness (doubling at the
    /// reference thickness) and with the departure of `local_angle` (degrees)
    /// from 90°, is scaled by the context factor, and is clamped to
    /// `base / max_adjustment ..= base * max_adjustment`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_parameter` for non-positive thickness or precision,
    /// or a non-finite angle.
    pub fn calculate_tolerance(
        &self,
        thickness: f64,
        document_precision: f64,
        local_angle: f64,
        context: ToleranceContext,
    ) -> Result<f64> {
        if !(thickness.is_finite() && thickness > 0.0) {
            return Err(GeometricError::invalid_parameter(format!(
                "thickness must be positive, got {thickness}"
            ))
            .in_operation("calculate_tolerance"));
        }
        if !(document_precision.is_finite() && document_precision > 0.0) {
            return Err(GeometricError::invalid_parameter(format!(
                "document precision must be positive, got {document_precision}"
            ))
            .in_operation("calculate_tolerance"));
        }
        if !local_angle.is_finite() {
            return Err(GeometricError::invalid_parameter("local angle must be finite")
                .in_operation("calculate_tolerance"));
        }

        let base = self.config.base_tolerance.max(document_precision);
        let thickness_factor = 1.0 + thickness / self.config.reference_thickness.max(f64::EPSILON);
        let angle_factor =
            1.0 + self.config.angle_sensitivity.max(0.0) * angle_departure(local_angle) / 90.0;

        let raw = base * thickness_factor * angle_factor * context.factor();
        let (min, max) = self.bounds();
        let tolerance = raw.clamp(min, max);

        tracing::debug!(thickness, local_angle, %context, tolerance, "calculated tolerance");
        Ok(tolerance)
    }

    /// Tolerance for `context` at a right angle with the default precision.
    ///
    /// # Errors
    ///
    /// Same as [`ToleranceManager::calculate_tolerance`].
    pub fn for_context(&self, thickness: f64, context: ToleranceContext) -> Result<f64> {
        self.calculate_tolerance(thickness, self.recommended_precision(), 90.0, context)
    }

    /// Precision callers should pass when the document does not define one.
    #[must_use]
    pub fn recommended_precision(&self) -> f64 {
        self.config.base_tolerance
    }

    /// Range every computed tolerance is clamped to.
    #[must_use]
    pub fn bounds(&self) -> (f64, f64) {
        let base = self.config.base_tolerance;
        let adj = self.config.max_tolerance_adjustment.max(1.0);
        (base / adj, base * adj)
    }

    /// Checks an externally supplied tolerance against the accepted range.
    #[must_use]
    pub fn validate_tolerance(&self, value: f64) -> ToleranceValidation {
        let bounds = self.bounds();
        let mut recommendations = Vec::new();

        if !value.is_finite() || value <= 0.0 {
            recommendations.push(format!(
                "tolerance must be a positive finite number; use {}",
                self.config.base_tolerance
            ));
        } else if value < bounds.0 {
            recommendations.push(format!(
                "tolerance {value} is below the minimum {}; raise it to avoid numerical noise",
                bounds.0
            ));
        } else if value > bounds.1 {
            recommendations.push(format!(
                "tolerance {value} exceeds the maximum {}; lower it to keep small features",
                bounds.1
            ));
        }

        ToleranceValidation {
            is_valid: recommendations.is_empty(),
            bounds,
            recommendations,
        }
    }
}

/// Distance in degrees of an angle from 90°, after folding it into `[0, 180]`.
fn angle_departure(angle: f64) -> f64 {
    let mut a = angle.abs() % 360.0;
    if a > 180.0 {
        a = 360.0 - a;
    }
    (a - 90.0).abs()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::GeometricErrorType;

    fn manager() -> ToleranceManager {
        ToleranceManager::new(ToleranceConfig::default())
    }

    #[test]
    fn context_ordering() {
        let m = manager();
        let merge = m.for_context(150.0, ToleranceContext::VertexMerge).unwrap();
        let offset = m.for_context(150.0, ToleranceContext::OffsetOperation).unwrap();
        let heal = m.for_context(150.0, ToleranceContext::ShapeHealing).unwrap();
        let boolean = m.for_context(150.0, ToleranceContext::BooleanOperation).unwrap();
        assert!(merge < offset && offset < heal && heal < boolean);
    }

    #[test]
    fn monotonic_in_thickness_and_angle() {
        let m = manager();
        let ctx = ToleranceContext::OffsetOperation;
        let mut last = 0.0;
        for thickness in [10.0, 100.0, 150.0, 400.0, 1000.0, 10_000.0] {
            let t = m.calculate_tolerance(thickness, 0.01, 90.0, ctx).unwrap();
            assert!(t >= last, "thickness {thickness}: {t} < {last}");
            last = t;
        }
        let mut last = 0.0;
        for angle in [90.0, 75.0, 45.0, 15.0, 1.0, 0.0] {
            let t = m.calculate_tolerance(150.0, 0.01, angle, ctx).unwrap();
            assert!(t >= last, "angle {angle}: {t} < {last}");
            last = t;
        }
        // Obtuse angles depart from 90° symmetrically.
        let acute = m.calculate_tolerance(150.0, 0.01, 60.0, ctx).unwrap();
        let obtuse = m.calculate_tolerance(150.0, 0.01, 120.0, ctx).unwrap();
        assert!((acute - obtuse).abs() < 1e-15);
    }

    #[test]
    fn result_is_bounded() {
        let m = manager();
        let (min, max) = m.bounds();
        let t = m
            .calculate_tolerance(1e9, 0.01, 0.0, ToleranceContext::BooleanOperation)
            .unwrap();
        assert!((t - max).abs() < 1e-15);
        assert!(t >= min);
    }

    #[test]
    fn non_positive_inputs_are_invalid_parameters() {
        let m = manager();
        for (thickness, precision) in [(0.0, 0.01), (-1.0, 0.01), (150.0, 0.0), (150.0, -0.1)] {
            let err = m
                .calculate_tolerance(thickness, precision, 90.0, ToleranceContext::VertexMerge)
                .unwrap_err();
            assert_eq!(err.kind, GeometricErrorType::InvalidParameter);
        }
    }

    #[test]
    fn validation_reports_bounds_and_advice() {
        let m = manager();
        let ok = m.validate_tolerance(0.02);
        assert!(ok.is_valid);
        assert!(ok.recommendations.is_empty());

        let too_big = m.validate_tolerance(5.0);
        assert!(!too_big.is_valid);
        assert_eq!(too_big.recommendations.len(), 1);
        assert!((too_big.bounds.1 - 0.1).abs() < 1e-12);

        assert!(!m.validate_tolerance(f64::NAN).is_valid);
        assert!(!m.validate_tolerance(0.0).is_valid);
    }
}
