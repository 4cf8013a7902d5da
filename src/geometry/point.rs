use uuid::Uuid;

use crate::error::{GeometricError, Result};
use crate::math::Point2;

/// How a point came into existence. Recorded for provenance only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CreationMethod {
    #[default]
    UserInput,
    Offset,
    Intersection,
    Boolean,
    Healing,
    Simplification,
    Imported,
}

impl CreationMethod {
    /// Provenance confidence assigned to points created this way.
    #[must_use]
    pub fn default_accuracy(self) -> f64 {
        match self {
            Self::UserInput | Self::Imported | Self::Offset => 1.0,
            Self::Intersection | Self::Boolean => 0.99,
            Self::Simplification => 0.98,
            Self::Healing => 0.95,
        }
    }
}

/// A 2D point with identity and provenance.
///
/// Fields are read-only: every kernel operation that moves a point creates a
/// new one with a fresh id.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    id: Uuid,
    position: Point2,
    tolerance: f64,
    creation_method: CreationMethod,
    accuracy: f64,
    validated: bool,
}

impl Point {
    /// Creates a user-input point with zero tolerance and full accuracy.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self::from_position(Point2::new(x, y), CreationMethod::UserInput)
    }

    /// Creates a point at `position` with the given provenance.
    #[must_use]
    pub fn from_position(position: Point2, creation_method: CreationMethod) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            tolerance: 0.0,
            creation_method,
            accuracy: creation_method.default_accuracy(),
            validated: false,
        }
    }

    /// Returns a copy carrying the given tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        if !self.validated {
            self.tolerance = tolerance.max(0.0);
        }
        self
    }

    /// Returns a copy carrying the given accuracy, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        if !self.validated {
            self.accuracy = accuracy.clamp(0.0, 1.0);
        }
        self
    }

    /// Validates the coordinates and freezes the point.
    ///
    /// # Errors
    ///
    /// Returns `invalid_parameter` for non-finite coordinates or tolerance.
    pub fn validate(mut self) -> Result<Self> {
        if !self.position.x.is_finite() || !self.position.y.is_finite() {
            return Err(GeometricError::invalid_parameter(format!(
                "non-finite point ({}, {})",
                self.position.x, self.position.y
            )));
        }
        if !self.tolerance.is_finite() {
            return Err(GeometricError::invalid_parameter("non-finite point tolerance"));
        }
        self.validated = true;
        Ok(self)
    }

    /// A new point at `position`, inheriting this point's tolerance.
    #[must_use]
    pub fn moved_to(&self, position: Point2, creation_method: CreationMethod) -> Self {
        Self::from_position(position, creation_method)
            .with_tolerance(self.tolerance)
            .with_accuracy(self.accuracy.min(creation_method.default_accuracy()))
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn position(&self) -> Point2 {
        self.position
    }

    #[must_use]
    pub fn x(&self) -> f64 {
        self.position.x
    }

    #[must_use]
    pub fn y(&self) -> f64 {
        self.position.y
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[must_use]
    pub fn creation_method(&self) -> CreationMethod {
        self.creation_method
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.position - other.position).norm()
    }

    /// Coordinate equality within `tolerance`. Identity is ignored.
    #[must_use]
    pub fn equals(&self, other: &Point, tolerance: f64) -> bool {
        self.distance_to(other) <= tolerance
    }
}

impl From<Point2> for Point {
    fn from(position: Point2) -> Self {
        Self::from_position(position, CreationMethod::UserInput)
    }
}

/// Wraps raw coordinates as points with a shared provenance and tolerance.
#[must_use]
pub fn points_from_coords(coords: &[Point2], method: CreationMethod, tolerance: f64) -> Vec<Point> {
    coords
        .iter()
        .map(|&c| Point::from_position(c, method).with_tolerance(tolerance))
        .collect()
}

/// Extracts raw coordinates from points.
#[must_use]
pub fn coords_of(points: &[Point]) -> Vec<Point2> {
    points.iter().map(Point::position).collect()
}
