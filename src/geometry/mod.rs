pub mod bounding_box;
pub mod curve;
pub mod intersection;
pub mod point;
pub mod polygon;
pub mod quality;
pub mod wall;

pub use bounding_box::BoundingBox;
pub use curve::{Curve, CurveType};
pub use intersection::{IntersectionData, JunctionType, ResolutionMethod};
pub use point::{CreationMethod, Point};
pub use polygon::Polygon;
pub use quality::{QualityMetrics, QualityWeights};
pub use wall::{EndpointRole, HealingOperation, HealingRecord, JoinType, WallSolid, WallType};
