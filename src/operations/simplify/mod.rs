//! Simplification engine: Douglas-Peucker reduction of solid boundaries.

mod reduce;

use std::time::{Duration, Instant};

use crate::config::SimplificationConfig;
use crate::error::GeometricError;
use crate::geometry::{Point, Polygon, WallSolid};
use crate::math::{direction, turn_angle, Point2, EPSILON};

use reduce::reduce_ring;

/// Outcome of [`SimplificationEngine::simplify_wall_geometry`].
#[derive(Debug, Clone)]
pub struct SimplificationResult {
    pub success: bool,
    pub simplified_solid: WallSolid,
    pub points_removed: usize,
    /// False when the reduced boundary drifted too far and the original
    /// geometry was kept instead.
    pub accuracy_preserved: bool,
    pub area_deviation: f64,
    pub perimeter_deviation: f64,
    pub warnings: Vec<String>,
    pub errors: Vec<GeometricError>,
    pub processing_time: Duration,
}

impl SimplificationResult {
    fn unchanged(solid: &WallSolid, accuracy_preserved: bool, warnings: Vec<String>, started: Instant) -> Self {
        Self {
            success: true,
            simplified_solid: solid.clone(),
            points_removed: 0,
            accuracy_preserved,
            area_deviation: 0.0,
            perimeter_deviation: 0.0,
            warnings,
            errors: Vec::new(),
            processing_time: started.elapsed(),
        }
    }
}

/// A location whose nearby vertices must survive simplification.
struct Feature {
    at: Point2,
    radius: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimplificationEngine {
    config: SimplificationConfig,
}

impl SimplificationEngine {
    #[must_use]
    pub fn new(config: SimplificationConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SimplificationConfig {
        &self.config
    }

    /// Removes vertices that lie within `tolerance` of the simplified
    /// boundary, never deviating more than the configured fraction of the
    /// wall thickness.
    ///
    /// With feature preservation on, corners sharper than the corner angle
    /// threshold, vertices within one thickness of a junction point, and
    /// recorded apex or offset intersection points are kept. If the result
    /// changes area by more than `ε × perimeter`, perimeter by more than
    /// `2ε` per removed vertex, or introduces a self-intersection, the
    /// original solid is returned with `accuracy_preserved = false`.
    #[must_use]
    pub fn simplify_wall_geometry(&self, solid: &WallSolid, tolerance: f64) -> SimplificationResult {
        let started = Instant::now();
        let _span = tracing::debug_span!("simplify_wall_geometry", wall = %solid.id()).entered();

        if !(tolerance.is_finite() && tolerance > 0.0) {
            return SimplificationResult {
                success: false,
                errors: vec![GeometricError::invalid_parameter(format!(
                    "simplification tolerance must be positive, got {tolerance}"
                ))
                .in_operation("simplify_wall_geometry")],
                ..SimplificationResult::unchanged(solid, true, Vec::new(), started)
            };
        }

        let epsilon = tolerance.min(self.config.max_simplification_level * solid.thickness());
        let features = if self.config.preserve_architectural_features {
            features_of(solid, tolerance)
        } else {
            Vec::new()
        };

        let mut warnings = Vec::new();
        let mut removed = 0;
        let mut polygons = Vec::with_capacity(solid.solid_geometry().len());
        let mut introduced_crossing = false;
        for polygon in solid.solid_geometry() {
            let (outer, r_outer) = self.simplify_ring(polygon.outer_ring(), &features, epsilon);
            let mut holes = Vec::with_capacity(polygon.holes().len());
            let mut r_holes = 0;
            for hole in polygon.holes() {
                let (h, r) = self.simplify_ring(hole, &features, epsilon);
                holes.push(h);
                r_holes += r;
            }
            if r_outer + r_holes == 0 {
                polygons.push(polygon.clone());
                continue;
            }
            match Polygon::new(outer, holes) {
                Ok(p) => {
                    introduced_crossing |= p.self_intersects() && !polygon.self_intersects();
                    removed += r_outer + r_holes;
                    polygons.push(p);
                }
                Err(e) => {
                    warnings.push(format!("simplified face rejected: {e}"));
                    polygons.push(polygon.clone());
                }
            }
        }

        if removed == 0 {
            return SimplificationResult::unchanged(solid, true, warnings, started);
        }

        let (area, perimeter) = (solid.area(), solid.perimeter());
        let new_area: f64 = polygons.iter().map(Polygon::area).sum();
        let new_perimeter: f64 = polygons.iter().map(Polygon::perimeter).sum();
        let area_deviation = (new_area - area).abs();
        let perimeter_deviation = (new_perimeter - perimeter).abs();
        #[allow(clippy::cast_precision_loss)]
        let perimeter_budget = 2.0 * epsilon * removed as f64;

        if introduced_crossing || area_deviation > epsilon * perimeter || perimeter_deviation > perimeter_budget {
            tracing::warn!(
                wall = %solid.id(),
                area_deviation,
                perimeter_deviation,
                introduced_crossing,
                "simplification rejected"
            );
            warnings.push(format!(
                "simplification rejected: area deviation {area_deviation:.6}, perimeter deviation {perimeter_deviation:.6}"
            ));
            return SimplificationResult {
                area_deviation,
                perimeter_deviation,
                ..SimplificationResult::unchanged(solid, false, warnings, started)
            };
        }

        tracing::debug!(wall = %solid.id(), removed, epsilon, "simplified");
        SimplificationResult {
            success: true,
            simplified_solid: solid.clone().with_geometry(polygons),
            points_removed: removed,
            accuracy_preserved: true,
            area_deviation,
            perimeter_deviation,
            warnings,
            errors: Vec::new(),
            processing_time: started.elapsed(),
        }
    }

    /// Reduces one ring. Rings that would drop below three vertices are
    /// returned whole.
    fn simplify_ring(&self, ring: &[Point], features: &[Feature], epsilon: f64) -> (Vec<Point>, usize) {
        if ring.len() <= 3 {
            return (ring.to_vec(), 0);
        }
        let coords: Vec<Point2> = ring.iter().map(Point::position).collect();
        let anchors = if self.config.preserve_architectural_features {
            self.protected_vertices(&coords, features)
        } else {
            Vec::new()
        };
        let keep = reduce_ring(&coords, &anchors, epsilon);
        let kept: Vec<Point> = ring.iter().zip(&keep).filter(|(_, &k)| k).map(|(p, _)| *p).collect();
        if kept.len() < 3 {
            return (ring.to_vec(), 0);
        }
        let removed = ring.len() - kept.len();
        (kept, removed)
    }

    fn protected_vertices(&self, ring: &[Point2], features: &[Feature]) -> Vec<usize> {
        let n = ring.len();
        let limit = self.config.corner_angle_threshold.to_radians();
        (0..n)
            .filter(|&i| {
                let (prev, v, next) = (&ring[(i + n - 1) % n], &ring[i], &ring[(i + 1) % n]);
                let corner = match (direction(prev, v, EPSILON), direction(v, next, EPSILON)) {
                    (Some(d_in), Some(d_out)) => turn_angle(&d_in, &d_out).abs() > limit,
                    _ => true,
                };
                corner || features.iter().any(|f| (v - f.at).norm() <= f.radius)
            })
            .collect()
    }
}

/// Junction points protect a thickness-wide neighbourhood; apexes and offset
/// meeting points protect only themselves.
fn features_of(solid: &WallSolid, tolerance: f64) -> Vec<Feature> {
    let mut features = Vec::new();
    for data in solid.intersection_data() {
        features.push(Feature {
            at: data.intersection_point.position(),
            radius: solid.thickness(),
        });
        features.extend(data.miter_apex.iter().chain(&data.offset_intersections).map(|p| Feature {
            at: p.position(),
            radius: tolerance,
        }));
    }
    features
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::config::SimplificationConfig;
    use crate::geometry::{
        CreationMethod, Curve, IntersectionData, JoinType, JunctionType, ResolutionMethod, WallType,
    };
    use crate::operations::offset::OffsetEngine;

    fn poly(coords: &[(f64, f64)]) -> Polygon {
        let pts: Vec<Point2> = coords.iter().map(|&(x, y)| Point2::new(x, y)).collect();
        Polygon::from_coords(&pts, &[], CreationMethod::Boolean, 0.01).unwrap()
    }

    fn wall_with(face: Polygon) -> WallSolid {
        let baseline = Curve::polyline(&[Point2::new(0.0, 100.0), Point2::new(1000.0, 100.0)]).unwrap();
        WallSolid::new(baseline, 200.0, WallType::Interior)
            .unwrap()
            .with_geometry(vec![face])
    }

    #[test]
    fn removes_near_collinear_vertex() {
        let wall = wall_with(poly(&[(0.0, 0.0), (500.0, 0.005), (1000.0, 0.0), (1000.0, 200.0), (0.0, 200.0)]));
        let result = SimplificationEngine::default().simplify_wall_geometry(&wall, 0.01);
        assert!(result.success);
        assert!(result.accuracy_preserved);
        assert_eq!(result.points_removed, 1);
        assert_eq!(result.simplified_solid.solid_geometry()[0].outer_ring().len(), 4);
        assert_relative_eq!(result.simplified_solid.area(), wall.area(), epsilon = 10.0);
    }

    #[test]
    fn clean_offset_wall_is_unchanged() {
        let baseline = Curve::polyline(&[Point2::new(0.0, 0.0), Point2::new(3000.0, 0.0), Point2::new(3000.0, 2000.0)])
            .unwrap();
        let wall = OffsetEngine::default()
            .offset_wall(&baseline, 150.0, WallType::Exterior, JoinType::Miter, 0.01)
            .unwrap();
        let result = SimplificationEngine::default().simplify_wall_geometry(&wall, 0.01);
        assert!(result.accuracy_preserved);
        assert_eq!(result.points_removed, 0);
        assert_eq!(
            result.simplified_solid.solid_geometry()[0].vertex_count(),
            wall.solid_geometry()[0].vertex_count()
        );
    }

    #[test]
    fn junction_vertices_are_preserved() {
        let base = wall_with(poly(&[(0.0, 0.0), (500.0, 0.0), (1000.0, 0.0), (1000.0, 200.0), (0.0, 200.0)]));
        let junction = IntersectionData::new(
            JunctionType::T,
            vec![base.id()],
            Point::new(500.0, -50.0),
            ResolutionMethod::Butt,
        );
        let wall = base.with_intersection(junction);

        let kept = SimplificationEngine::default().simplify_wall_geometry(&wall, 0.01);
        assert_eq!(kept.points_removed, 0);

        let loose = SimplificationEngine::new(SimplificationConfig::default().with_preserve_features(false))
            .simplify_wall_geometry(&wall, 0.01);
        assert_eq!(loose.points_removed, 1);
    }

    #[test]
    fn inaccurate_result_returns_original() {
        let wall = wall_with(poly(&[
            (0.0, 0.0),
            (600.0, 0.0),
            (300.0, 0.0),
            (1000.0, 0.0),
            (1000.0, 200.0),
            (0.0, 200.0),
        ]));
        let engine = SimplificationEngine::new(SimplificationConfig::default().with_preserve_features(false));
        let result = engine.simplify_wall_geometry(&wall, 0.01);
        assert!(result.success);
        assert!(!result.accuracy_preserved);
        assert_eq!(result.points_removed, 0);
        assert_relative_eq!(result.perimeter_deviation, 600.0, epsilon = 1e-6);
        assert_eq!(result.simplified_solid.solid_geometry()[0].outer_ring().len(), 6);
        assert!(result.warnings.iter().any(|w| w.contains("rejected")));
    }

    #[test]
    fn deviation_is_bounded_by_thickness() {
        let wall = wall_with(poly(&[(0.0, 0.0), (500.0, 5.0), (1000.0, 0.0), (1000.0, 200.0), (0.0, 200.0)]));
        let engine = SimplificationEngine::new(SimplificationConfig::default().with_max_level(0.01));
        let result = engine.simplify_wall_geometry(&wall, 50.0);
        assert_eq!(result.points_removed, 0, "2 mm cap must keep a 5 mm bump");
    }

    #[test]
    fn rejects_non_positive_tolerance() {
        let wall = wall_with(poly(&[(0.0, 0.0), (1000.0, 0.0), (1000.0, 200.0), (0.0, 200.0)]));
        let result = SimplificationEngine::default().simplify_wall_geometry(&wall, -1.0);
        assert!(!result.success);
        assert_eq!(result.errors[0].kind, crate::error::GeometricErrorType::InvalidParameter);
    }
}
