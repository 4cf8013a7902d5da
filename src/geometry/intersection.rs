use std::fmt;

use uuid::Uuid;

use super::point::Point;
use super::polygon::Polygon;

/// How two or more walls meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum JunctionType {
    /// One wall ends on the interior of another.
    T,
    /// Two walls share an endpoint.
    L,
    /// Three or more walls, or two walls crossing through each other.
    Cross,
    /// Walls run parallel and overlap.
    ParallelOverlap,
}

impl fmt::Display for JunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::T => "t",
            Self::L => "l",
            Self::Cross => "cross",
            Self::ParallelOverlap => "parallel_overlap",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ResolutionMethod {
    Miter,
    Bevel,
    /// Branch wall trimmed flat against the main wall's face.
    Butt,
    OverlapMerge,
    FaceByFace,
}

/// Resolved geometry of one junction.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntersectionData {
    pub id: Uuid,
    pub junction_type: JunctionType,
    pub participating_walls: Vec<Uuid>,
    pub intersection_point: Point,
    pub miter_apex: Option<Point>,
    /// Points where the walls' offset curves meet after adjustment.
    pub offset_intersections: Vec<Point>,
    pub resolved_geometry: Option<Polygon>,
    pub resolution_method: ResolutionMethod,
    pub geometric_accuracy: f64,
    pub validated: bool,
}

impl IntersectionData {
    #[must_use]
    pub fn new(
        junction_type: JunctionType,
        participating_walls: Vec<Uuid>,
        intersection_point: Point,
        resolution_method: ResolutionMethod,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            junction_type,
            participating_walls,
            intersection_point,
            miter_apex: None,
            offset_intersections: Vec::new(),
            resolved_geometry: None,
            resolution_method,
            geometric_accuracy: 1.0,
            validated: false,
        }
    }

    #[must_use]
    pub fn involves(&self, wall: Uuid) -> bool {
        self.participating_walls.contains(&wall)
    }
}
