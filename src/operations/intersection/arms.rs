use crate::error::{GeometricError, Result};
use crate::geometry::{CreationMethod, EndpointRole, Point, WallSolid};
use crate::math::{direction, left_normal, Point2, Vector2};
use crate::operations::offset::solid_from_offsets;

/// Free end of an open wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) enum WallEnd {
    Start,
    End,
}

impl WallEnd {
    pub(super) const BOTH: [Self; 2] = [Self::Start, Self::End];

    pub(super) fn role(self) -> EndpointRole {
        match self {
            Self::Start => EndpointRole::Start,
            Self::End => EndpointRole::End,
        }
    }

    fn index(self, len: usize) -> usize {
        match self {
            Self::Start => 0,
            Self::End => len - 1,
        }
    }

    pub(super) fn point(self, path: &[Point2]) -> Point2 {
        path[self.index(path.len())]
    }
}

/// A wall end seen from the junction it belongs to.
///
/// `dir` points away from the junction along the end segment. Left and right
/// are taken looking along `dir`, so for a wall's end they are swapped
/// relative to the wall's own offsets.
#[derive(Debug, Clone, Copy)]
pub(super) struct Arm {
    pub wall: usize,
    pub end: WallEnd,
    pub origin: Point2,
    pub dir: Vector2,
    pub half_thickness: f64,
}

impl Arm {
    /// # Errors
    ///
    /// `topological_consistency` for a closed wall (no free end) and
    /// `degenerate_geometry` when the end has no segment longer than
    /// `tolerance`.
    pub(super) fn from_wall(wall: usize, solid: &WallSolid, end: WallEnd, tolerance: f64) -> Result<Self> {
        if solid.baseline().is_closed() {
            return Err(GeometricError::topology("closed wall has no free end"));
        }
        let pts = solid.baseline().flatten(tolerance)?.coords();
        let origin = end.point(&pts);
        let toward = match end {
            WallEnd::Start => pts.iter().find(|q| (**q - origin).norm() > tolerance),
            WallEnd::End => pts.iter().rev().find(|q| (**q - origin).norm() > tolerance),
        };
        let dir = toward
            .and_then(|q| direction(&origin, q, tolerance))
            .ok_or_else(|| GeometricError::degenerate("wall end has no extent beyond tolerance"))?;
        Ok(Self {
            wall,
            end,
            origin,
            dir,
            half_thickness: solid.thickness() * 0.5,
        })
    }

    /// Outgoing angle in radians, in `(-π, π]`.
    pub(super) fn angle(&self) -> f64 {
        self.dir.y.atan2(self.dir.x)
    }

    pub(super) fn left_line(&self) -> (Point2, Vector2) {
        (self.origin + left_normal(&self.dir) * self.half_thickness, self.dir)
    }

    pub(super) fn right_line(&self) -> (Point2, Vector2) {
        (self.origin - left_normal(&self.dir) * self.half_thickness, self.dir)
    }

    /// Same arm with its end moved to `origin`.
    pub(super) fn anchored_at(&self, origin: Point2) -> Self {
        Self { origin, ..*self }
    }

    /// Converts new left/right end points (arm frame) into an adjustment of
    /// the wall's own offsets.
    pub(super) fn adjust(&self, left: Point2, right: Point2) -> EndpointAdjustment {
        let (left, right) = match self.end {
            WallEnd::Start => (left, right),
            WallEnd::End => (right, left),
        };
        EndpointAdjustment {
            wall: self.wall,
            end: self.end,
            left,
            right,
        }
    }
}

/// New end points for one end of a wall's offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct EndpointAdjustment {
    pub wall: usize,
    pub end: WallEnd,
    pub left: Point2,
    pub right: Point2,
}

/// Baseline as a flattened path; closed baselines repeat their first point.
pub(super) fn baseline_path(solid: &WallSolid, tolerance: f64) -> Result<Vec<Point2>> {
    let flat = solid.baseline().flatten(tolerance)?;
    let mut pts = flat.coords();
    if flat.is_closed() {
        pts.push(pts[0]);
    }
    Ok(pts)
}

/// Moves the offset end points of `solid` and rebuilds its face.
///
/// # Errors
///
/// `offset_failure` when the wall has no offsets yet or the moved offsets
/// no longer enclose a face.
pub(super) fn apply_adjustments(
    solid: &WallSolid,
    adjustments: &[EndpointAdjustment],
    tolerance: f64,
) -> Result<WallSolid> {
    if adjustments.is_empty() {
        return Ok(solid.clone());
    }
    let (Some(left), Some(right)) = (solid.left_offset(), solid.right_offset()) else {
        return Err(GeometricError::offset_failure("wall has no offsets to adjust").in_operation("resolve_junction"));
    };

    let mut left_pts = left.points().to_vec();
    let mut right_pts = right.points().to_vec();
    for adj in adjustments {
        let i = adj.end.index(left_pts.len());
        left_pts[i] = moved(&left_pts[i], adj.left, tolerance);
        let j = adj.end.index(right_pts.len());
        right_pts[j] = moved(&right_pts[j], adj.right, tolerance);
    }

    let left = left.with_points(left_pts)?;
    let right = right.with_points(right_pts)?;
    let face = solid_from_offsets(&left, &right, tolerance)?;
    Ok(solid.clone().with_offsets(left, right).with_geometry(vec![face]))
}

fn moved(point: &Point, to: Point2, tolerance: f64) -> Point {
    if (point.position() - to).norm() <= tolerance * 1e-3 {
        *point
    } else {
        point.moved_to(to, CreationMethod::Intersection)
    }
}

/// Junction location as a kernel point.
pub(super) fn junction_point(p: Point2, tolerance: f64) -> Point {
    Point::from_position(p, CreationMethod::Intersection).with_tolerance(tolerance)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::OffsetConfig;
    use crate::geometry::{Curve, JoinType, WallType};
    use crate::operations::offset::OffsetEngine;

    fn wall(a: Point2, b: Point2, thickness: f64) -> WallSolid {
        OffsetEngine::new(OffsetConfig::default())
            .offset_wall(&Curve::polyline(&[a, b]).unwrap(), thickness, WallType::Interior, JoinType::Miter, 0.01)
            .unwrap()
    }

    #[test]
    fn end_arm_swaps_sides() {
        let w = wall(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0), 20.0);
        let start = Arm::from_wall(0, &w, WallEnd::Start, 0.01).unwrap();
        let end = Arm::from_wall(0, &w, WallEnd::End, 0.01).unwrap();
        assert!((start.left_line().0 - Point2::new(0.0, 10.0)).norm() < 1e-9);
        assert!((end.left_line().0 - Point2::new(100.0, -10.0)).norm() < 1e-9);
        assert!((end.dir.x + 1.0).abs() < 1e-12);

        let adj = end.adjust(Point2::new(110.0, -10.0), Point2::new(90.0, 10.0));
        assert_eq!(adj.left, Point2::new(90.0, 10.0));
        assert_eq!(adj.right, Point2::new(110.0, -10.0));
    }

    #[test]
    fn adjusting_an_end_rebuilds_the_face() {
        let w = wall(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0), 20.0);
        let adj = EndpointAdjustment {
            wall: 0,
            end: WallEnd::End,
            left: Point2::new(110.0, 10.0),
            right: Point2::new(110.0, -10.0),
        };
        let moved = apply_adjustments(&w, &[adj], 0.01).unwrap();
        assert!((moved.area() - 2200.0).abs() < 1e-6, "area={}", moved.area());
        assert_eq!(moved.id(), w.id());
        let end = moved.left_offset().unwrap().points()[1];
        assert_eq!(end.creation_method(), CreationMethod::Intersection);
    }
}
