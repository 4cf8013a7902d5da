pub mod config;
pub mod error;
pub mod geometry;
pub mod math;
pub mod operations;
pub mod pipeline;
pub mod tessellation;

pub use config::KernelConfig;
pub use error::{GeometricError, GeometricErrorType, Result, Severity};
pub use geometry::{Curve, IntersectionData, JoinType, Point, Polygon, QualityMetrics, WallSolid, WallType};
pub use operations::boolean::BooleanEngine;
pub use operations::healing::HealingEngine;
pub use operations::intersection::IntersectionResolver;
pub use operations::offset::OffsetEngine;
pub use operations::recovery::ErrorHandler;
pub use operations::simplify::SimplificationEngine;
pub use operations::tolerance::{ToleranceContext, ToleranceManager};
pub use operations::validate::Validator;
pub use pipeline::{PipelineResult, PlanResult, WallInput, WallPipeline};
