use std::fmt;

use thiserror::Error;

/// Kinds of geometric failure the kernel can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GeometricErrorType {
    OffsetFailure,
    BooleanFailure,
    SelfIntersection,
    DegenerateGeometry,
    ToleranceExceeded,
    NumericalInstability,
    DuplicateVertices,
    ValidationFailure,
    ComplexityExceeded,
    InvalidParameter,
    TopologicalConsistency,
    DimensionalAccuracy,
}

impl GeometricErrorType {
    /// Returns the snake_case name used in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OffsetFailure => "offset_failure",
            Self::BooleanFailure => "boolean_failure",
            Self::SelfIntersection => "self_intersection",
            Self::DegenerateGeometry => "degenerate_geometry",
            Self::ToleranceExceeded => "tolerance_exceeded",
            Self::NumericalInstability => "numerical_instability",
            Self::DuplicateVertices => "duplicate_vertices",
            Self::ValidationFailure => "validation_failure",
            Self::ComplexityExceeded => "complexity_exceeded",
            Self::InvalidParameter => "invalid_parameter",
            Self::TopologicalConsistency => "topological_consistency",
            Self::DimensionalAccuracy => "dimensional_accuracy",
        }
    }

    /// Default severity assigned to errors of this kind.
    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            Self::InvalidParameter => Severity::Critical,
            Self::ComplexityExceeded
            | Self::SelfIntersection
            | Self::BooleanFailure
            | Self::OffsetFailure
            | Self::TopologicalConsistency => Severity::High,
            Self::DuplicateVertices => Severity::Low,
            Self::DegenerateGeometry
            | Self::NumericalInstability
            | Self::ToleranceExceeded
            | Self::ValidationFailure
            | Self::DimensionalAccuracy => Severity::Medium,
        }
    }

    /// Whether errors of this kind may be handed to the recovery handler.
    #[must_use]
    pub fn default_recoverable(self) -> bool {
        !matches!(self, Self::InvalidParameter | Self::ComplexityExceeded)
    }
}

impl fmt::Display for GeometricErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a geometric error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        })
    }
}

/// A typed geometric error raised by one pipeline stage.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("{kind} ({severity}): {message}")]
pub struct GeometricError {
    pub kind: GeometricErrorType,
    pub severity: Severity,
    pub recoverable: bool,
    pub message: String,
    #[cfg_attr(feature = "serde", serde(skip_deserializing))]
    pub operation: Option<&'static str>,
}

impl GeometricError {
    /// Creates an error with the kind's default severity and recoverability.
    pub fn new(kind: GeometricErrorType, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            recoverable: kind.default_recoverable(),
            message: message.into(),
            operation: None,
        }
    }

    /// Tags the error with the operation that raised it.
    #[must_use]
    pub fn in_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Overrides the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Overrides recoverability. `invalid_parameter` stays fatal regardless.
    #[must_use]
    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable && self.kind != GeometricErrorType::InvalidParameter;
        self
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(GeometricErrorType::InvalidParameter, message)
    }

    pub fn offset_failure(message: impl Into<String>) -> Self {
        Self::new(GeometricErrorType::OffsetFailure, message)
    }

    pub fn boolean_failure(message: impl Into<String>) -> Self {
        Self::new(GeometricErrorType::BooleanFailure, message)
    }

    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::new(GeometricErrorType::DegenerateGeometry, message)
    }

    pub fn complexity_exceeded(message: impl Into<String>) -> Self {
        Self::new(GeometricErrorType::ComplexityExceeded, message)
    }

    pub fn self_intersection(message: impl Into<String>) -> Self {
        Self::new(GeometricErrorType::SelfIntersection, message)
    }

    pub fn topology(message: impl Into<String>) -> Self {
        Self::new(GeometricErrorType::TopologicalConsistency, message)
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::new(GeometricErrorType::NumericalInstability, message)
    }

    /// True when the error must abort the pipeline without a recovery attempt.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.recoverable || self.severity == Severity::Critical
    }
}

/// Convenience type alias for results using [`GeometricError`].
pub type Result<T> = std::result::Result<T, GeometricError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_parameter_is_always_fatal() {
        let err = GeometricError::invalid_parameter("thickness must be positive")
            .with_recoverable(true);
        assert!(!err.recoverable);
        assert_eq!(err.severity, Severity::Critical);
        assert!(err.is_fatal());
    }

    #[test]
    fn display_uses_snake_case_kind() {
        let err = GeometricError::offset_failure("no valid join").in_operation("offset_curve");
        let text = err.to_string();
        assert!(text.starts_with("offset_failure (high)"), "got {text}");
        assert_eq!(err.operation, Some("offset_curve"));
    }

    #[test]
    fn healing_kinds_are_recoverable() {
        for kind in [
            GeometricErrorType::DegenerateGeometry,
            GeometricErrorType::OffsetFailure,
            GeometricErrorType::DuplicateVertices,
            GeometricErrorType::SelfIntersection,
        ] {
            assert!(GeometricError::new(kind, "x").recoverable, "{kind} should recover");
        }
        assert!(!GeometricError::complexity_exceeded("x").recoverable);
    }
}
