use crate::error::{GeometricError, Result};
use crate::math::intersect_2d::{ring_self_intersections, segment_segment_intersect_2d};
use crate::math::polygon_2d::{
    classify_point_in_rings, ring_centroid, ring_perimeter, signed_area_2d,
    PointClassification,
};
use crate::math::Point2;

use super::bounding_box::BoundingBox;
use super::point::{coords_of, points_from_coords, CreationMethod, Point};

/// Area/perimeter ratio (model units) below which a face counts as a sliver.
pub const DEFAULT_SLIVER_RATIO: f64 = 0.05;

/// A solid face: one outer ring plus optional holes.
///
/// Rings are stored open (the closing edge is implicit). Orientation is
/// normalised on construction: outer ring counter-clockwise, holes clockwise.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Polygon {
    outer_ring: Vec<Point>,
    holes: Vec<Vec<Point>>,
    area: f64,
    perimeter: f64,
    centroid: Point2,
    bounding_box: BoundingBox,
    self_intersects: bool,
    has_sliver_faces: bool,
}

impl Polygon {
    /// Builds a polygon and computes its derived fields.
    ///
    /// # Errors
    ///
    /// Returns `invalid_parameter` when the outer ring has fewer than 3
    /// points or a hole has fewer than 3 points.
    pub fn new(outer_ring: Vec<Point>, holes: Vec<Vec<Point>>) -> Result<Self> {
        if outer_ring.len() < 3 {
            return Err(GeometricError::invalid_parameter(format!(
                "polygon outer ring needs at least 3 points, got {}",
                outer_ring.len()
            )));
        }
        if let Some(h) = holes.iter().find(|h| h.len() < 3) {
            return Err(GeometricError::invalid_parameter(format!(
                "polygon hole needs at least 3 points, got {}",
                h.len()
            )));
        }

        let outer_ring = orient_points(outer_ring, true);
        let holes: Vec<Vec<Point>> = holes.into_iter().map(|h| orient_points(h, false)).collect();

        let outer = coords_of(&outer_ring);
        let hole_coords: Vec<Vec<Point2>> = holes.iter().map(|h| coords_of(h)).collect();

        let hole_area: f64 = hole_coords.iter().map(|h| signed_area_2d(h).abs()).sum();
        let area = signed_area_2d(&outer).abs() - hole_area;
        let perimeter = ring_perimeter(&outer) + hole_coords.iter().map(|h| ring_perimeter(h)).sum::<f64>();

        let self_intersects = count_intersections(&outer, &hole_coords, 0.0) > 0;
        let has_sliver_faces = perimeter > 0.0 && area / perimeter < DEFAULT_SLIVER_RATIO;

        Ok(Self {
            centroid: ring_centroid(&outer),
            bounding_box: BoundingBox::from_points(&outer),
            outer_ring,
            holes,
            area,
            perimeter,
            self_intersects,
            has_sliver_faces,
        })
    }

    /// Builds a polygon from raw rings with shared provenance.
    ///
    /// # Errors
    ///
    /// Same as [`Polygon::new`].
    pub fn from_coords(
        outer: &[Point2],
        holes: &[Vec<Point2>],
        method: CreationMethod,
        tolerance: f64,
    ) -> Result<Self> {
        Self::new(
            points_from_coords(outer, method, tolerance),
            holes
                .iter()
                .map(|h| points_from_coords(h, method, tolerance))
                .collect(),
        )
    }

    #[must_use]
    pub fn outer_ring(&self) -> &[Point] {
        &self.outer_ring
    }

    #[must_use]
    pub fn holes(&self) -> &[Vec<Point>] {
        &self.holes
    }

    #[must_use]
    pub fn outer_coords(&self) -> Vec<Point2> {
        coords_of(&self.outer_ring)
    }

    #[must_use]
    pub fn hole_coords(&self) -> Vec<Vec<Point2>> {
        self.holes.iter().map(|h| coords_of(h)).collect()
    }

    /// All rings, outer first.
    #[must_use]
    pub fn rings(&self) -> Vec<Vec<Point2>> {
        let mut rings = vec![self.outer_coords()];
        rings.extend(self.hole_coords());
        rings
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.area
    }

    #[must_use]
    pub fn perimeter(&self) -> f64 {
        self.perimeter
    }

    #[must_use]
    pub fn centroid(&self) -> Point2 {
        self.centroid
    }

    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    #[must_use]
    pub fn self_intersects(&self) -> bool {
        self.self_intersects
    }

    #[must_use]
    pub fn has_sliver_faces(&self) -> bool {
        self.has_sliver_faces
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.outer_ring.len() + self.holes.iter().map(Vec::len).sum::<usize>()
    }

    /// Area divided by perimeter; a thickness-like measure.
    #[must_use]
    pub fn sliver_ratio(&self) -> f64 {
        if self.perimeter <= 0.0 {
            0.0
        } else {
            self.area / self.perimeter
        }
    }

    #[must_use]
    pub fn is_sliver(&self, threshold: f64) -> bool {
        self.sliver_ratio() < threshold
    }

    /// Valid when the outer ring has non-zero area and no ring crosses
    /// itself or another ring within `tolerance`.
    #[must_use]
    pub fn is_valid(&self, tolerance: f64) -> bool {
        self.area > tolerance * tolerance && self.count_self_intersections(tolerance) == 0
    }

    /// Number of crossing edge pairs, within rings and between rings.
    #[must_use]
    pub fn count_self_intersections(&self, tolerance: f64) -> usize {
        count_intersections(&self.outer_coords(), &self.hole_coords(), tolerance)
    }

    /// Classifies `p` against the polygon, with a boundary band of `tolerance`.
    #[must_use]
    pub fn classify(&self, p: &Point2, tolerance: f64) -> PointClassification {
        let rings = self.rings();
        let refs: Vec<&[Point2]> = rings.iter().map(Vec::as_slice).collect();
        classify_point_in_rings(p, &refs, tolerance)
    }

    /// True when `p` is inside or on the boundary.
    #[must_use]
    pub fn contains(&self, p: &Point2, tolerance: f64) -> bool {
        self.classify(p, tolerance) != PointClassification::Outside
    }
}

fn orient_points(points: Vec<Point>, ccw: bool) -> Vec<Point> {
    let coords = coords_of(&points);
    if (signed_area_2d(&coords) >= 0.0) == ccw {
        points
    } else {
        points.into_iter().rev().collect()
    }
}

fn count_intersections(outer: &[Point2], holes: &[Vec<Point2>], tolerance: f64) -> usize {
    let mut count = ring_self_intersections(outer, tolerance);
    for (i, hole) in holes.iter().enumerate() {
        count += ring_self_intersections(hole, tolerance);
        count += rings_crossing(outer, hole, tolerance);
        for other in &holes[i + 1..] {
            count += rings_crossing(hole, other, tolerance);
        }
    }
    count
}

fn rings_crossing(a: &[Point2], b: &[Point2], tolerance: f64) -> usize {
    let (na, nb) = (a.len(), b.len());
    let mut count = 0;
    for i in 0..na {
        for j in 0..nb {
            if segment_segment_intersect_2d(
                &a[i],
                &a[(i + 1) % na],
                &b[j],
                &b[(j + 1) % nb],
                tolerance,
            )
            .is_some()
            {
                count += 1;
            }
        }
    }
    count
}
