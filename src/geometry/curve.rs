use crate::error::{GeometricError, Result};
use crate::math::polygon_2d::polyline_length;
use crate::math::{arc_subdivision_count, cross, turn_angle, Point2, Vector2, EPSILON};

use super::bounding_box::BoundingBox;
use super::point::{coords_of, points_from_coords, CreationMethod, Point};

/// Interpretation of a curve's points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CurveType {
    /// Straight segments between consecutive points.
    #[default]
    Polyline,
    /// Points are the control polygon of a single Bézier curve.
    Bezier,
    /// Catmull-Rom spline interpolating the points.
    Spline,
    /// Circular arc through the first, middle and last point.
    Arc,
}

/// An ordered sequence of points with cached derived data.
///
/// Cached fields are computed at construction. Curves are never edited in
/// place: [`Curve::with_points`] builds a new curve.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Curve {
    points: Vec<Point>,
    curve_type: CurveType,
    is_closed: bool,
    length: f64,
    bounding_box: BoundingBox,
    curvature: Vec<f64>,
    tangents: Vec<Vector2>,
}

impl Curve {
    /// Creates a curve and computes its cached fields.
    ///
    /// # Errors
    ///
    /// Returns `invalid_parameter` for fewer than 2 points or non-finite
    /// coordinates.
    pub fn new(points: Vec<Point>, curve_type: CurveType, is_closed: bool) -> Result<Self> {
        if points.len() < 2 {
            return Err(GeometricError::invalid_parameter(format!(
                "a curve needs at least 2 points, got {}",
                points.len()
            )));
        }
        if let Some(bad) = points.iter().find(|p| !p.x().is_finite() || !p.y().is_finite()) {
            return Err(GeometricError::invalid_parameter(format!(
                "non-finite curve point ({}, {})",
                bad.x(),
                bad.y()
            )));
        }
        let coords = coords_of(&points);
        let mut length = polyline_length(&coords);
        if is_closed && coords.len() > 2 {
            length += (coords[0] - coords[coords.len() - 1]).norm();
        }
        Ok(Self {
            bounding_box: BoundingBox::from_points(&coords),
            curvature: discrete_curvature(&coords, is_closed),
            tangents: unit_tangents(&coords, is_closed),
            length,
            points,
            curve_type,
            is_closed,
        })
    }

    /// Open polyline from raw user coordinates.
    ///
    /// # Errors
    ///
    /// Same as [`Curve::new`].
    pub fn polyline(coords: &[Point2]) -> Result<Self> {
        Self::new(
            points_from_coords(coords, CreationMethod::UserInput, 0.0),
            CurveType::Polyline,
            false,
        )
    }

    /// Polyline built from computed coordinates with shared provenance.
    ///
    /// # Errors
    ///
    /// Same as [`Curve::new`].
    pub fn from_coords(
        coords: &[Point2],
        method: CreationMethod,
        tolerance: f64,
        is_closed: bool,
    ) -> Result<Self> {
        Self::new(
            points_from_coords(coords, method, tolerance),
            CurveType::Polyline,
            is_closed,
        )
    }

    /// A new curve of the same type and closure with different points.
    ///
    /// # Errors
    ///
    /// Same as [`Curve::new`].
    pub fn with_points(&self, points: Vec<Point>) -> Result<Self> {
        Self::new(points, self.curve_type, self.is_closed)
    }

    /// The same curve traversed in the opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let points: Vec<Point> = self.points.iter().rev().copied().collect();
        let coords = coords_of(&points);
        Self {
            curvature: discrete_curvature(&coords, self.is_closed),
            tangents: unit_tangents(&coords, self.is_closed),
            points,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[must_use]
    pub fn coords(&self) -> Vec<Point2> {
        coords_of(&self.points)
    }

    #[must_use]
    pub fn curve_type(&self) -> CurveType {
        self.curve_type
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    #[must_use]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    #[must_use]
    pub fn curvature(&self) -> &[f64] {
        &self.curvature
    }

    #[must_use]
    pub fn tangents(&self) -> &[Vector2] {
        &self.tangents
    }

    #[must_use]
    pub fn start(&self) -> Point2 {
        self.points[0].position()
    }

    #[must_use]
    pub fn end(&self) -> Point2 {
        self.points[self.points.len() - 1].position()
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        let n = self.points.len();
        if self.is_closed { n } else { n - 1 }
    }

    /// Largest point tolerance recorded on the curve.
    #[must_use]
    pub fn max_point_tolerance(&self) -> f64 {
        self.points.iter().map(Point::tolerance).fold(0.0, f64::max)
    }

    /// Converts the curve into a polyline whose chord error is at most
    /// `tolerance`. Polylines are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `invalid_parameter` for a non-positive tolerance.
    pub fn flatten(&self, tolerance: f64) -> Result<Self> {
        if tolerance <= 0.0 || !tolerance.is_finite() {
            return Err(GeometricError::invalid_parameter(format!(
                "flatten tolerance must be positive, got {tolerance}"
            )));
        }
        let coords = self.coords();
        let flat = match self.curve_type {
            CurveType::Polyline => return Ok(self.clone()),
            CurveType::Bezier => flatten_bezier(&coords, tolerance),
            CurveType::Spline => flatten_catmull_rom(&coords, self.is_closed, tolerance),
            CurveType::Arc => flatten_arc(&coords, tolerance),
        };
        let tol = self.max_point_tolerance().max(tolerance);
        Self::new(
            points_from_coords(&flat, CreationMethod::Offset, tol),
            CurveType::Polyline,
            self.is_closed,
        )
    }
}

/// Turning angle divided by the mean adjacent segment length. Zero at open ends.
fn discrete_curvature(coords: &[Point2], closed: bool) -> Vec<f64> {
    let n = coords.len();
    (0..n)
        .map(|i| {
            if n < 3 || (!closed && (i == 0 || i == n - 1)) {
                return 0.0;
            }
            let prev = coords[(i + n - 1) % n];
            let next = coords[(i + 1) % n];
            let d_in = coords[i] - prev;
            let d_out = next - coords[i];
            let mean_len = 0.5 * (d_in.norm() + d_out.norm());
            if mean_len < EPSILON || d_in.norm() < EPSILON || d_out.norm() < EPSILON {
                return 0.0;
            }
            turn_angle(&d_in, &d_out) / mean_len
        })
        .collect()
}

fn unit_tangents(coords: &[Point2], closed: bool) -> Vec<Vector2> {
    let n = coords.len();
    let seg_dir = |i: usize, j: usize| {
        let d = coords[j] - coords[i];
        let len = d.norm();
        if len < EPSILON { Vector2::zeros() } else { d / len }
    };
    (0..n)
        .map(|i| {
            let incoming = if i > 0 {
                Some(seg_dir(i - 1, i))
            } else if closed {
                Some(seg_dir(n - 1, 0))
            } else {
                None
            };
            let outgoing = if i + 1 < n {
                Some(seg_dir(i, i + 1))
            } else if closed {
                Some(seg_dir(n - 1, 0))
            } else {
                None
            };
            let sum = incoming.unwrap_or_else(Vector2::zeros) + outgoing.unwrap_or_else(Vector2::zeros);
            let len = sum.norm();
            if len < EPSILON { Vector2::zeros() } else { sum / len }
        })
        .collect()
}

fn flatten_bezier(control: &[Point2], tolerance: f64) -> Vec<Point2> {
    let degree = control.len() - 1;
    if degree < 2 {
        return control.to_vec();
    }
    // Flatness bound: deviation <= n(n-1)/8 * max|Δ²P| / N².
    let max_second = control
        .windows(3)
        .map(|w| (w[2].coords - w[1].coords * 2.0 + w[0].coords).norm())
        .fold(0.0, f64::max);
    #[allow(clippy::cast_precision_loss)]
    let bound = (degree * (degree - 1)) as f64 / 8.0 * max_second;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let segments = (bound / tolerance).sqrt().ceil().clamp(1.0, 1024.0) as usize;

    (0..=segments)
        .map(|k| {
            #[allow(clippy::cast_precision_loss)]
            let t = k as f64 / segments as f64;
            de_casteljau(control, t)
        })
        .collect()
}

fn de_casteljau(control: &[Point2], t: f64) -> Point2 {
    let mut work: Vec<Point2> = control.to_vec();
    let n = work.len();
    for level in 1..n {
        for i in 0..n - level {
            work[i] = work[i] + (work[i + 1] - work[i]) * t;
        }
    }
    work[0]
}

fn flatten_catmull_rom(points: &[Point2], closed: bool, tolerance: f64) -> Vec<Point2> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let at = |i: isize| -> Point2 {
        #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let len = n as isize;
        if closed {
            points[i.rem_euclid(len) as usize]
        } else {
            points[i.clamp(0, len - 1) as usize]
        }
    };
    let seg_count = if closed { n } else { n - 1 };
    let mut out = vec![points[0]];
    for s in 0..seg_count {
        #[allow(clippy::cast_possible_wrap)]
        let i = s as isize;
        let (p0, p1, p2, p3) = (at(i - 1), at(i), at(i + 1), at(i + 2));
        let chord = (p2 - p1).norm();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps = (chord / tolerance).sqrt().ceil().clamp(1.0, 256.0) as usize;
        for k in 1..=steps {
            #[allow(clippy::cast_precision_loss)]
            let t = k as f64 / steps as f64;
            let (t2, t3) = (t * t, t * t * t);
            let coords = (p1.coords * 2.0
                + (p2.coords - p0.coords) * t
                + (p0.coords * 2.0 - p1.coords * 5.0 + p2.coords * 4.0 - p3.coords) * t2
                + (p1.coords * 3.0 - p0.coords - p2.coords * 3.0 + p3.coords) * t3)
                * 0.5;
            out.push(Point2::from(coords));
        }
    }
    if closed {
        out.pop();
    }
    out
}

fn flatten_arc(points: &[Point2], tolerance: f64) -> Vec<Point2> {
    let n = points.len();
    let (a, m, b) = (points[0], points[n / 2], points[n - 1]);
    let Some(center) = circumcenter(&a, &m, &b) else {
        return vec![a, b];
    };
    let radius = (a - center).norm();
    let angle_of = |p: &Point2| (p.y - center.y).atan2(p.x - center.x);
    let start = angle_of(&a);
    let ccw = cross(&(m - a), &(b - m)) > 0.0;
    let sweep_to = |p: &Point2| {
        let mut d = angle_of(p) - start;
        if ccw {
            while d < 0.0 {
                d += std::f64::consts::TAU;
            }
        } else {
            while d > 0.0 {
                d -= std::f64::consts::TAU;
            }
        }
        d
    };
    let sweep = sweep_to(&b);
    let segments = arc_subdivision_count(radius, sweep.abs(), tolerance);
    (0..=segments)
        .map(|k| {
            #[allow(clippy::cast_precision_loss)]
            let angle = start + sweep * (k as f64 / segments as f64);
            Point2::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

fn circumcenter(a: &Point2, b: &Point2, c: &Point2) -> Option<Point2> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < EPSILON {
        return None;
    }
    let (a2, b2, c2) = (a.coords.norm_squared(), b.coords.norm_squared(), c.coords.norm_squared());
    Some(Point2::new(
        (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
        (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
    ))
}
