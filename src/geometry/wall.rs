use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

use crate::error::{GeometricError, Result};

use super::bounding_box::BoundingBox;
use super::curve::Curve;
use super::intersection::IntersectionData;
use super::polygon::Polygon;
use super::quality::QualityMetrics;

/// Strategy for connecting two offset segments at a corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum JoinType {
    /// Extend both segments to their intersection.
    #[default]
    Miter,
    /// Connect the segment ends with a straight chord.
    Bevel,
    /// Connect the segment ends with an arc of the offset radius.
    Round,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Miter => "miter",
            Self::Bevel => "bevel",
            Self::Round => "round",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WallType {
    Exterior,
    #[default]
    Interior,
    Partition,
    Structural,
    Curtain,
}

/// Which part of a baseline a join applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EndpointRole {
    Start,
    End,
    Interior,
}

/// Kinds of fixes the healing engine applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum HealingOperation {
    DuplicateVertexMerge,
    MicroSegmentRemoval,
    SliverFaceRemoval,
    MicroGapClosure,
}

impl fmt::Display for HealingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DuplicateVertexMerge => "duplicate_vertex_merge",
            Self::MicroSegmentRemoval => "micro_segment_removal",
            Self::SliverFaceRemoval => "sliver_face_removal",
            Self::MicroGapClosure => "micro_gap_closure",
        })
    }
}

/// One entry of a solid's healing history.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HealingRecord {
    pub operation: HealingOperation,
    /// Number of elements the fix touched.
    pub count: usize,
    pub tolerance: f64,
}

/// A wall: baseline, thickness, offsets, and the solid faces derived from them.
///
/// Every pipeline stage returns a new `WallSolid` built with the consuming
/// `with_*` methods; the healing history only ever grows.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WallSolid {
    id: Uuid,
    baseline: Curve,
    thickness: f64,
    wall_type: WallType,
    left_offset: Option<Curve>,
    right_offset: Option<Curve>,
    solid_geometry: Vec<Polygon>,
    join_types: BTreeMap<EndpointRole, JoinType>,
    intersection_data: Vec<IntersectionData>,
    healing_history: Vec<HealingRecord>,
    geometric_quality: QualityMetrics,
}

impl WallSolid {
    /// Creates a wall with no offsets or solid geometry yet.
    ///
    /// # Errors
    ///
    /// Returns `invalid_parameter` for a non-positive or non-finite thickness.
    pub fn new(baseline: Curve, thickness: f64, wall_type: WallType) -> Result<Self> {
        if !(thickness.is_finite() && thickness > 0.0) {
            return Err(GeometricError::invalid_parameter(format!(
                "wall thickness must be positive, got {thickness}"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            baseline,
            thickness,
            wall_type,
            left_offset: None,
            right_offset: None,
            solid_geometry: Vec::new(),
            join_types: BTreeMap::new(),
            intersection_data: Vec::new(),
            healing_history: Vec::new(),
            geometric_quality: QualityMetrics::default(),
        })
    }

    #[must_use]
    pub fn with_offsets(mut self, left: Curve, right: Curve) -> Self {
        self.left_offset = Some(left);
        self.right_offset = Some(right);
        self
    }

    #[must_use]
    pub fn with_baseline(mut self, baseline: Curve) -> Self {
        self.baseline = baseline;
        self
    }

    #[must_use]
    pub fn with_geometry(mut self, solid_geometry: Vec<Polygon>) -> Self {
        self.solid_geometry = solid_geometry;
        self
    }

    #[must_use]
    pub fn with_join(mut self, role: EndpointRole, join: JoinType) -> Self {
        self.join_types.insert(role, join);
        self
    }

    #[must_use]
    pub fn with_intersection(mut self, data: IntersectionData) -> Self {
        self.intersection_data.push(data);
        self
    }

    #[must_use]
    pub fn with_healing_record(mut self, record: HealingRecord) -> Self {
        self.healing_history.push(record);
        self
    }

    #[must_use]
    pub fn with_quality(mut self, quality: QualityMetrics) -> Self {
        self.geometric_quality = quality;
        self
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn baseline(&self) -> &Curve {
        &self.baseline
    }

    #[must_use]
    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    #[must_use]
    pub fn wall_type(&self) -> WallType {
        self.wall_type
    }

    #[must_use]
    pub fn left_offset(&self) -> Option<&Curve> {
        self.left_offset.as_ref()
    }

    #[must_use]
    pub fn right_offset(&self) -> Option<&Curve> {
        self.right_offset.as_ref()
    }

    #[must_use]
    pub fn solid_geometry(&self) -> &[Polygon] {
        &self.solid_geometry
    }

    #[must_use]
    pub fn join_types(&self) -> &BTreeMap<EndpointRole, JoinType> {
        &self.join_types
    }

    #[must_use]
    pub fn join_at(&self, role: EndpointRole) -> Option<JoinType> {
        self.join_types.get(&role).copied()
    }

    #[must_use]
    pub fn intersection_data(&self) -> &[IntersectionData] {
        &self.intersection_data
    }

    #[must_use]
    pub fn healing_history(&self) -> &[HealingRecord] {
        &self.healing_history
    }

    #[must_use]
    pub fn geometric_quality(&self) -> &QualityMetrics {
        &self.geometric_quality
    }

    /// Cost score used for budget checks.
    #[must_use]
    pub fn complexity(&self) -> usize {
        let offsets = self.left_offset.as_ref().map_or(0, |c| c.points().len())
            + self.right_offset.as_ref().map_or(0, |c| c.points().len());
        let solid: usize = self.solid_geometry.iter().map(Polygon::vertex_count).sum();
        self.baseline.points().len() + offsets + solid + 10 * self.intersection_data.len()
    }

    /// Bounding box of the solid, falling back to the baseline grown by
    /// half the thickness when no solid has been built yet.
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        let solid = self
            .solid_geometry
            .iter()
            .fold(BoundingBox::empty(), |b, p| b.union(&p.bounding_box()));
        if solid.is_empty() {
            self.baseline.bounding_box().expanded(self.thickness * 0.5)
        } else {
            solid
        }
    }

    /// Total solid area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.solid_geometry.iter().map(Polygon::area).sum()
    }

    /// Total solid perimeter.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        self.solid_geometry.iter().map(Polygon::perimeter).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::point::CreationMethod;
    use crate::math::Point2;

    fn baseline() -> Curve {
        Curve::polyline(&[Point2::new(0.0, 0.0), Point2::new(1000.0, 0.0)]).unwrap()
    }

    #[test]
    fn zero_thickness_is_invalid_parameter() {
        let err = WallSolid::new(baseline(), 0.0, WallType::Interior).unwrap_err();
        assert!(err.is_fatal());
        assert!(WallSolid::new(baseline(), -5.0, WallType::Interior).is_err());
    }

    #[test]
    fn builders_return_new_values_and_history_grows() {
        let wall = WallSolid::new(baseline(), 150.0, WallType::Exterior).unwrap();
        let id = wall.id();
        let healed = wall
            .with_healing_record(HealingRecord {
                operation: HealingOperation::DuplicateVertexMerge,
                count: 2,
                tolerance: 0.01,
            })
            .with_join(EndpointRole::Start, JoinType::Bevel);
        assert_eq!(healed.id(), id);
        assert_eq!(healed.healing_history().len(), 1);
        assert_eq!(healed.join_at(EndpointRole::Start), Some(JoinType::Bevel));
        assert_eq!(healed.join_at(EndpointRole::End), None);
    }

    #[test]
    fn complexity_counts_vertices_and_solid() {
        let solid = Polygon::from_coords(
            &[
                Point2::new(0.0, -75.0),
                Point2::new(1000.0, -75.0),
                Point2::new(1000.0, 75.0),
                Point2::new(0.0, 75.0),
            ],
            &[],
            CreationMethod::Offset,
            0.01,
        )
        .unwrap();
        let wall = WallSolid::new(baseline(), 150.0, WallType::Interior)
            .unwrap()
            .with_geometry(vec![solid]);
        assert_eq!(wall.complexity(), 2 + 4);
        assert!((wall.area() - 150_000.0).abs() < 1e-6);
        assert!((wall.bounding_box().height() - 150.0).abs() < 1e-9);
    }
}
