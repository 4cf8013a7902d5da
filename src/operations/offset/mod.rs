//! Offset engine: parallel boundary curves at ± half thickness.

mod side;
mod trim;

use std::time::{Duration, Instant};

use crate::config::OffsetConfig;
use crate::error::{GeometricError, Result};
use crate::geometry::{
    CreationMethod, Curve, EndpointRole, JoinType, Polygon, WallSolid, WallType,
};
use crate::math::intersect_2d::{polyline_self_intersects, ring_self_intersections};
use crate::math::polygon_2d::{polyline_length, ring_perimeter, signed_area_2d};
use crate::math::{cross, Point2};

use side::{offset_side, SideOffset, SideParams};
use trim::{trim_closed_loops, trim_open_loops};

/// Outcome of [`OffsetEngine::offset_curve`].
///
/// On failure both offsets are `None` and `errors` holds the reason.
#[derive(Debug, Clone)]
pub struct OffsetResult {
    pub success: bool,
    pub left_offset: Option<Curve>,
    pub right_offset: Option<Curve>,
    /// Join strategy the offsets were finally built with.
    pub join_type: JoinType,
    pub warnings: Vec<String>,
    pub errors: Vec<GeometricError>,
    pub processing_time: Duration,
}

impl OffsetResult {
    fn failed(join_type: JoinType, warnings: Vec<String>, error: GeometricError, started: Instant) -> Self {
        Self {
            success: false,
            left_offset: None,
            right_offset: None,
            join_type,
            warnings,
            errors: vec![error.in_operation("offset_curve")],
            processing_time: started.elapsed(),
        }
    }
}

/// Builds offset curves and the wall solids enclosed by them.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetEngine {
    config: OffsetConfig,
}

impl OffsetEngine {
    #[must_use]
    pub fn new(config: OffsetConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &OffsetConfig {
        &self.config
    }

    /// Offsets `baseline` by `distance` to both sides.
    ///
    /// The left offset lies to the left of the walking direction, the right
    /// offset to the right; both run in the baseline's direction. Near-collinear
    /// vertices produce a `collinear` warning and zero-length segments are
    /// dropped with a `micro` warning. When the requested join self-intersects
    /// and fallback is enabled, bevel joins are tried, then local loops are
    /// trimmed. Mitred offsets whose mean length strays from the baseline
    /// length by more than `tolerance` get a `length_deviation` warning.
    #[must_use]
    pub fn offset_curve(&self, baseline: &Curve, distance: f64, join_type: JoinType, tolerance: f64) -> OffsetResult {
        let started = Instant::now();
        let _span = tracing::debug_span!("offset_curve", points = baseline.points().len(), distance).entered();

        if !(distance.is_finite() && distance > 0.0) {
            return OffsetResult::failed(
                join_type,
                Vec::new(),
                GeometricError::invalid_parameter(format!("offset distance must be positive, got {distance}")),
                started,
            );
        }
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return OffsetResult::failed(
                join_type,
                Vec::new(),
                GeometricError::invalid_parameter(format!("offset tolerance must be positive, got {tolerance}")),
                started,
            );
        }

        let flat = match baseline.flatten(tolerance) {
            Ok(c) => c,
            Err(e) => return OffsetResult::failed(join_type, Vec::new(), e, started),
        };
        let closed = flat.is_closed();
        let mut warnings = Vec::new();
        let points = prepare_points(&flat.coords(), closed, tolerance, &mut warnings);

        let min_points = if closed { 3 } else { 2 };
        if points.len() < min_points {
            return OffsetResult::failed(
                join_type,
                warnings,
                GeometricError::offset_failure(format!(
                    "baseline collapses to {} distinct points",
                    points.len()
                )),
                started,
            );
        }

        let mut attempts = vec![join_type];
        if self.config.enable_fallback && join_type != JoinType::Bevel {
            attempts.push(JoinType::Bevel);
        }

        let mut last_pair = None;
        for &join in &attempts {
            let (left, right) = self.build_pair(&points, closed, distance, join, tolerance);
            if is_simple(&left.points, closed) && is_simple(&right.points, closed) {
                if join != join_type {
                    tracing::warn!(requested = %join_type, used = %join, "offset fell back to another join");
                    warnings.push(format!("fallback: {join_type} join self-intersected, used {join}"));
                }
                report_corners(&left, &right, join, &mut warnings);
                return finish(&flat, left.points, right.points, join, join_type, tolerance, warnings, started);
            }
            last_pair = Some((left, right, join));
        }

        if self.config.enable_fallback {
            if let Some((left, right, join)) = last_pair {
                let (left_pts, lt) = trim_side(&left.points, closed, tolerance);
                let (right_pts, rt) = trim_side(&right.points, closed, tolerance);
                if is_simple(&left_pts, closed) && is_simple(&right_pts, closed) && left_pts.len() >= min_points
                    && right_pts.len() >= min_points
                {
                    tracing::warn!(loops = lt + rt, "trimmed local offset loops");
                    warnings.push(format!("loops_trimmed: removed {} self-intersection loops", lt + rt));
                    report_corners(&left, &right, join, &mut warnings);
                    return finish(&flat, left_pts, right_pts, join, join_type, tolerance, warnings, started);
                }
            }
        }

        OffsetResult::failed(
            join_type,
            warnings,
            GeometricError::offset_failure("no join strategy produced non-self-intersecting offsets"),
            started,
        )
    }

    /// Offsets the baseline by half the thickness and builds the wall solid.
    ///
    /// # Errors
    ///
    /// Returns `invalid_parameter` for a non-positive thickness and
    /// `offset_failure` when no valid offsets exist.
    pub fn offset_wall(
        &self,
        baseline: &Curve,
        thickness: f64,
        wall_type: WallType,
        join_type: JoinType,
        tolerance: f64,
    ) -> Result<WallSolid> {
        let wall = WallSolid::new(baseline.clone(), thickness, wall_type)?;
        let result = self.offset_curve(baseline, thickness * 0.5, join_type, tolerance);
        assemble_wall(wall, &result, tolerance)
    }

    fn build_pair(
        &self,
        points: &[Point2],
        closed: bool,
        distance: f64,
        join: JoinType,
        tolerance: f64,
    ) -> (SideOffset, SideOffset) {
        let params = SideParams {
            distance,
            join,
            miter_limit: self.config.miter_limit,
            tolerance,
        };
        let left = offset_side(points, closed, params);
        let right = offset_side(points, closed, SideParams { distance: -distance, ..params });
        (left, right)
    }
}

/// Builds the offset curves and the final result.
///
/// The `length_deviation` warning only applies to miter joins: a mitred
/// corner lengthens one side exactly as much as it shortens the other, so
/// the mean offset length matches the baseline. Bevel and round corners
/// shorten the outer side, so their deviation is expected and not reported.
#[allow(clippy::too_many_arguments)]
fn finish(
    baseline: &Curve,
    left: Vec<Point2>,
    right: Vec<Point2>,
    used: JoinType,
    requested: JoinType,
    tolerance: f64,
    mut warnings: Vec<String>,
    started: Instant,
) -> OffsetResult {
    let closed = baseline.is_closed();
    let length_of = |pts: &[Point2]| if closed { ring_perimeter(pts) } else { polyline_length(pts) };
    let mean = 0.5 * (length_of(&left) + length_of(&right));
    let deviation = (mean - baseline.length()).abs();
    if used == JoinType::Miter && deviation > tolerance {
        warnings.push(format!(
            "length_deviation: mean offset length differs from baseline by {deviation:.4}"
        ));
    }

    let build = |pts: &[Point2]| Curve::from_coords(pts, CreationMethod::Offset, tolerance, closed);
    match (build(&left), build(&right)) {
        (Ok(l), Ok(r)) => {
            for w in &warnings {
                tracing::warn!(warning = %w, "offset warning");
            }
            tracing::debug!(
                left = l.points().len(),
                right = r.points().len(),
                join = %used,
                "offset complete"
            );
            OffsetResult {
                success: true,
                left_offset: Some(l),
                right_offset: Some(r),
                join_type: used,
                warnings,
                errors: Vec::new(),
                processing_time: started.elapsed(),
            }
        }
        (Err(e), _) | (_, Err(e)) => OffsetResult::failed(requested, warnings, e, started),
    }
}

/// Builds the solid polygon from a successful offset and attaches it to `wall`.
///
/// # Errors
///
/// Returns the offset's first error when it failed, or `offset_failure`
/// when the offsets do not enclose a face.
pub fn assemble_wall(wall: WallSolid, result: &OffsetResult, tolerance: f64) -> Result<WallSolid> {
    let (Some(left), Some(right)) = (&result.left_offset, &result.right_offset) else {
        return Err(result
            .errors
            .first()
            .cloned()
            .unwrap_or_else(|| GeometricError::offset_failure("offset produced no curves")));
    };

    let polygon = solid_from_offsets(left, right, tolerance)?;
    Ok(wall
        .with_offsets(left.clone(), right.clone())
        .with_geometry(vec![polygon])
        .with_join(EndpointRole::Start, result.join_type)
        .with_join(EndpointRole::End, result.join_type)
        .with_join(EndpointRole::Interior, result.join_type))
}

/// Face enclosed by a wall's two offset curves.
///
/// Open offsets give one face bounded by the left offset and the reversed
/// right offset. Closed offsets give an annular face: the larger ring is the
/// outer boundary, the smaller one the hole.
///
/// # Errors
///
/// Returns `offset_failure` when the offsets do not enclose any area.
pub fn solid_from_offsets(left: &Curve, right: &Curve, tolerance: f64) -> Result<Polygon> {
    let (l, r) = (left.coords(), right.coords());
    let polygon = if left.is_closed() {
        let (outer, inner) = if signed_area_2d(&l).abs() >= signed_area_2d(&r).abs() { (l, r) } else { (r, l) };
        Polygon::from_coords(&outer, &[inner], CreationMethod::Offset, tolerance)?
    } else {
        let mut ring = l;
        ring.extend(r.iter().rev());
        Polygon::from_coords(&ring, &[], CreationMethod::Offset, tolerance)?
    };
    if polygon.area() <= tolerance * tolerance {
        return Err(GeometricError::offset_failure("offsets enclose no area").in_operation("offset_wall"));
    }
    Ok(polygon)
}

/// Drops zero-length segments and reports near-collinear vertices.
fn prepare_points(coords: &[Point2], closed: bool, tolerance: f64, warnings: &mut Vec<String>) -> Vec<Point2> {
    let mut points: Vec<Point2> = Vec::with_capacity(coords.len());
    let mut dropped = 0;
    for &c in coords {
        if points.last().is_some_and(|last| (c - *last).norm() < tolerance) {
            dropped += 1;
            continue;
        }
        points.push(c);
    }
    if closed {
        while points.len() > 1 && (points[0] - points[points.len() - 1]).norm() < tolerance {
            points.pop();
            dropped += 1;
        }
    }
    if dropped > 0 {
        warnings.push(format!("micro: dropped {dropped} zero-length segments"));
    }

    let n = points.len();
    if n >= 3 {
        let interior = if closed { 0..n } else { 1..n - 1 };
        let collinear = interior
            .filter(|&i| {
                let prev = points[(i + n - 1) % n];
                let next = points[(i + 1) % n];
                let chord = next - prev;
                let len = chord.norm();
                len > 0.0
                    && cross(&chord, &(points[i] - prev)).abs() / len <= tolerance
                    && (points[i] - prev).dot(&(next - points[i])) > 0.0
            })
            .count();
        if collinear > 0 {
            warnings.push(format!("collinear: {collinear} near-collinear points within tolerance"));
        }
    }
    points
}

fn is_simple(points: &[Point2], closed: bool) -> bool {
    if closed {
        ring_self_intersections(points, 0.0) == 0
    } else {
        !polyline_self_intersects(points, 0.0)
    }
}

fn trim_side(points: &[Point2], closed: bool, tolerance: f64) -> (Vec<Point2>, usize) {
    if closed {
        let sign = signed_area_2d(points).signum();
        let sign = if sign == 0.0 { 1.0 } else { sign };
        let trimmed = trim_closed_loops(points, sign, tolerance);
        let removed = usize::from(trimmed.len() != points.len());
        (trimmed, removed)
    } else {
        trim_open_loops(points)
    }
}

fn report_corners(left: &SideOffset, right: &SideOffset, join: JoinType, warnings: &mut Vec<String>) {
    let clipped = left.miters_clipped + right.miters_clipped;
    if join == JoinType::Miter && clipped > 0 {
        warnings.push(format!("miter_limit: {clipped} corners bevelled"));
    }
    let caps = left.flat_caps.max(right.flat_caps);
    if caps > 0 {
        warnings.push(format!("reversal: {caps} flat caps at near-180° turns"));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::GeometricErrorType;
    use crate::geometry::CurveType;
    use crate::geometry::point::points_from_coords;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn engine() -> OffsetEngine {
        OffsetEngine::new(OffsetConfig::default())
    }

    #[test]
    fn l_baseline_miter_offsets() {
        let baseline = Curve::polyline(&[p(0.0, 0.0), p(3000.0, 0.0), p(3000.0, 2000.0)]).unwrap();
        let result = engine().offset_curve(&baseline, 75.0, JoinType::Miter, 0.01);
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.join_type, JoinType::Miter);
        let left = result.left_offset.unwrap();
        let right = result.right_offset.unwrap();
        let mean = 0.5 * (left.length() + right.length());
        assert!((mean - baseline.length()).abs() < 0.01, "mean={mean}");
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert!(left.points().iter().all(|q| q.creation_method() == CreationMethod::Offset));
    }

    #[test]
    fn bevel_corner_is_shorter_without_length_warning() {
        let baseline = Curve::polyline(&[p(0.0, 0.0), p(3000.0, 0.0), p(3000.0, 2000.0)]).unwrap();
        let result = engine().offset_curve(&baseline, 75.0, JoinType::Bevel, 0.01);
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.join_type, JoinType::Bevel);
        let mean = 0.5 * (result.left_offset.unwrap().length() + result.right_offset.unwrap().length());
        assert!(mean < baseline.length() - 0.01, "mean={mean}");
        assert!(!result.warnings.iter().any(|w| w.starts_with("length_deviation")), "{:?}", result.warnings);
    }

    #[test]
    fn zero_length_segment_is_dropped_with_micro_warning() {
        let baseline = Curve::polyline(&[p(0.0, 0.0), p(1000.0, 0.0), p(1000.0, 0.0), p(1000.0, 500.0)]).unwrap();
        let result = engine().offset_curve(&baseline, 50.0, JoinType::Miter, 0.01);
        assert!(result.success);
        assert!(result.warnings.iter().any(|w| w.contains("micro")), "{:?}", result.warnings);
    }

    #[test]
    fn collinear_vertex_is_reported_not_rejected() {
        let baseline = Curve::polyline(&[p(0.0, 0.0), p(500.0, 0.001), p(1000.0, 0.0)]).unwrap();
        let result = engine().offset_curve(&baseline, 50.0, JoinType::Miter, 0.01);
        assert!(result.success);
        assert!(result.warnings.iter().any(|w| w.contains("collinear")), "{:?}", result.warnings);
    }

    #[test]
    fn coincident_baseline_fails_without_partial_offsets() {
        let baseline = Curve::polyline(&[p(5.0, 5.0), p(5.0, 5.0)]).unwrap();
        let result = engine().offset_curve(&baseline, 50.0, JoinType::Miter, 0.01);
        assert!(!result.success);
        assert!(result.left_offset.is_none() && result.right_offset.is_none());
        assert_eq!(result.errors[0].kind, GeometricErrorType::OffsetFailure);
    }

    #[test]
    fn non_positive_distance_is_invalid_parameter() {
        let baseline = Curve::polyline(&[p(0.0, 0.0), p(10.0, 0.0)]).unwrap();
        let result = engine().offset_curve(&baseline, 0.0, JoinType::Miter, 0.01);
        assert!(!result.success);
        assert_eq!(result.errors[0].kind, GeometricErrorType::InvalidParameter);
    }

    #[test]
    fn offsets_are_simple_or_absent() {
        let baselines = [
            vec![p(0.0, 0.0), p(1000.0, 0.0), p(1000.0, 20.0), p(2000.0, 20.0)],
            vec![p(0.0, 0.0), p(1000.0, 0.0), p(1000.0, 50.0), p(0.0, 50.0)],
            vec![p(0.0, 0.0), p(1000.0, 0.0), p(0.0, 10.0)],
            vec![p(0.0, 0.0), p(300.0, 0.0), p(320.0, 15.0), p(340.0, 0.0), p(1000.0, 0.0)],
        ];
        for coords in baselines {
            let baseline = Curve::polyline(&coords).unwrap();
            let result = engine().offset_curve(&baseline, 100.0, JoinType::Miter, 0.01);
            if result.success {
                let left = result.left_offset.unwrap().coords();
                let right = result.right_offset.unwrap().coords();
                assert!(!polyline_self_intersects(&left, 0.0), "{coords:?}");
                assert!(!polyline_self_intersects(&right, 0.0), "{coords:?}");
            } else {
                assert!(result.left_offset.is_none() && result.right_offset.is_none());
                assert_eq!(result.errors[0].kind, GeometricErrorType::OffsetFailure);
            }
        }
    }

    #[test]
    fn round_join_without_fallback() {
        let engine = OffsetEngine::new(OffsetConfig::default().with_fallback(false));
        let baseline = Curve::polyline(&[p(0.0, 0.0), p(1000.0, 0.0), p(1000.0, 1000.0)]).unwrap();
        let result = engine.offset_curve(&baseline, 100.0, JoinType::Round, 0.01);
        assert!(result.success);
        assert_eq!(result.join_type, JoinType::Round);
        assert!(result.right_offset.unwrap().points().len() > 4);
    }

    #[test]
    fn open_wall_solid_is_a_rectangle() {
        let baseline = Curve::polyline(&[p(0.0, 0.0), p(4000.0, 0.0)]).unwrap();
        let wall = engine()
            .offset_wall(&baseline, 200.0, WallType::Exterior, JoinType::Miter, 0.01)
            .unwrap();
        assert_eq!(wall.solid_geometry().len(), 1);
        assert!((wall.area() - 800_000.0).abs() < 1e-6);
        assert_eq!(wall.join_at(EndpointRole::Start), Some(JoinType::Miter));
        assert!(wall.left_offset().is_some());
    }

    #[test]
    fn closed_baseline_gives_annulus() {
        let ring = [p(0.0, 0.0), p(5000.0, 0.0), p(5000.0, 4000.0), p(0.0, 4000.0)];
        let baseline =
            Curve::new(points_from_coords(&ring, CreationMethod::UserInput, 0.0), CurveType::Polyline, true).unwrap();
        let wall = engine()
            .offset_wall(&baseline, 200.0, WallType::Exterior, JoinType::Miter, 0.01)
            .unwrap();
        let face = &wall.solid_geometry()[0];
        assert_eq!(face.holes().len(), 1);
        let expected = 5200.0 * 4200.0 - 4800.0 * 3800.0;
        assert!((face.area() - expected).abs() < 1e-6, "area={}", face.area());
    }

    #[test]
    fn zero_thickness_wall_is_rejected() {
        let baseline = Curve::polyline(&[p(0.0, 0.0), p(10.0, 0.0)]).unwrap();
        let err = engine()
            .offset_wall(&baseline, 0.0, WallType::Interior, JoinType::Miter, 0.01)
            .unwrap_err();
        assert_eq!(err.kind, GeometricErrorType::InvalidParameter);
    }
}
