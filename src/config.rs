//! Engine configuration.
//!
//! One [`KernelConfig`] is built per pipeline invocation and handed to every
//! engine constructor; nothing in the crate reads global defaults.

use crate::geometry::{JoinType, QualityWeights};

/// Tolerance manager settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ToleranceConfig {
    /// Base numeric tolerance in model units.
    pub base_tolerance: f64,
    /// Computed tolerances stay within `base / max .. base * max`.
    pub max_tolerance_adjustment: f64,
    /// Thickness at which the thickness factor reaches 2.
    pub reference_thickness: f64,
    /// Weight of the angle factor; 0 disables angle widening.
    pub angle_sensitivity: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            base_tolerance: 0.01,
            max_tolerance_adjustment: 10.0,
            reference_thickness: 200.0,
            angle_sensitivity: 1.0,
        }
    }
}

impl ToleranceConfig {
    #[must_use]
    pub fn with_base_tolerance(mut self, base_tolerance: f64) -> Self {
        self.base_tolerance = base_tolerance;
        self
    }

    #[must_use]
    pub fn with_max_adjustment(mut self, max_tolerance_adjustment: f64) -> Self {
        self.max_tolerance_adjustment = max_tolerance_adjustment;
        self
    }
}

/// Offset engine settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OffsetConfig {
    pub tolerance: f64,
    pub default_join_type: JoinType,
    /// Maximum miter length as a multiple of the offset distance.
    pub miter_limit: f64,
    /// Retry with bevel joins when the requested join self-intersects.
    pub enable_fallback: bool,
}

impl Default for OffsetConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            default_join_type: JoinType::Miter,
            miter_limit: 4.0,
            enable_fallback: true,
        }
    }
}

impl OffsetConfig {
    #[must_use]
    pub fn with_join_type(mut self, join: JoinType) -> Self {
        self.default_join_type = join;
        self
    }

    #[must_use]
    pub fn with_miter_limit(mut self, miter_limit: f64) -> Self {
        self.miter_limit = miter_limit;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, enable: bool) -> Self {
        self.enable_fallback = enable;
        self
    }
}

/// Intersection resolver settings. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntersectionConfig {
    pub extreme_angle_threshold: f64,
    pub parallel_overlap_threshold: f64,
    pub optimization_enabled: bool,
    pub spatial_indexing_enabled: bool,
    /// Upper bound on candidate wall pairs examined in one network pass.
    pub max_complexity: usize,
    pub enable_parallel_processing: bool,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            extreme_angle_threshold: 15.0,
            parallel_overlap_threshold: 1.0,
            optimization_enabled: true,
            spatial_indexing_enabled: true,
            max_complexity: 1_000_000,
            enable_parallel_processing: true,
        }
    }
}

impl IntersectionConfig {
    #[must_use]
    pub fn with_spatial_indexing(mut self, enabled: bool) -> Self {
        self.spatial_indexing_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_max_complexity(mut self, max_complexity: usize) -> Self {
        self.max_complexity = max_complexity;
        self
    }

    #[must_use]
    pub fn with_parallel_processing(mut self, enabled: bool) -> Self {
        self.enable_parallel_processing = enabled;
        self
    }
}

/// Boolean engine settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BooleanConfig {
    /// Upper bound on total input vertices of one operation.
    pub max_complexity: usize,
    pub enable_parallel_processing: bool,
    /// Result faces with area/perimeter below this are reported for healing.
    pub sliver_face_threshold: f64,
}

impl Default for BooleanConfig {
    fn default() -> Self {
        Self {
            max_complexity: 1_000_000,
            enable_parallel_processing: true,
            sliver_face_threshold: 0.05,
        }
    }
}

impl BooleanConfig {
    #[must_use]
    pub fn with_max_complexity(mut self, max_complexity: usize) -> Self {
        self.max_complexity = max_complexity;
        self
    }

    #[must_use]
    pub fn with_parallel_processing(mut self, enabled: bool) -> Self {
        self.enable_parallel_processing = enabled;
        self
    }
}

/// Healing engine settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HealingConfig {
    /// Area/perimeter ratio below which a face is removed.
    pub sliver_face_threshold: f64,
    /// Segments shorter than this are collapsed.
    pub micro_gap_threshold: f64,
    pub enable_auto_healing: bool,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            sliver_face_threshold: 0.05,
            micro_gap_threshold: 0.1,
            enable_auto_healing: true,
        }
    }
}

impl HealingConfig {
    #[must_use]
    pub fn with_sliver_face_threshold(mut self, threshold: f64) -> Self {
        self.sliver_face_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_micro_gap_threshold(mut self, threshold: f64) -> Self {
        self.micro_gap_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_auto_healing(mut self, enabled: bool) -> Self {
        self.enable_auto_healing = enabled;
        self
    }
}

/// Simplification engine settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimplificationConfig {
    /// Never remove corners, junction points or recorded intersections.
    pub preserve_architectural_features: bool,
    /// Maximum point deviation as a fraction of wall thickness.
    pub max_simplification_level: f64,
    /// Turning angle (degrees) above which a vertex is a protected corner.
    pub corner_angle_threshold: f64,
}

impl Default for SimplificationConfig {
    fn default() -> Self {
        Self {
            preserve_architectural_features: true,
            max_simplification_level: 0.1,
            corner_angle_threshold: 10.0,
        }
    }
}

impl SimplificationConfig {
    #[must_use]
    pub fn with_preserve_features(mut self, preserve: bool) -> Self {
        self.preserve_architectural_features = preserve;
        self
    }

    #[must_use]
    pub fn with_max_level(mut self, level: f64) -> Self {
        self.max_simplification_level = level;
        self
    }
}

/// Validator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationConfig {
    /// Tolerance used when the solid's points carry none.
    pub tolerance: f64,
    pub sliver_face_threshold: f64,
    pub micro_gap_threshold: f64,
    pub min_thickness: f64,
    pub max_thickness: f64,
    /// Complexity above which architectural compliance is reduced.
    pub complexity_budget: usize,
    pub weights: QualityWeights,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            sliver_face_threshold: 0.05,
            micro_gap_threshold: 0.1,
            min_thickness: 50.0,
            max_thickness: 1000.0,
            complexity_budget: 10_000,
            weights: QualityWeights::default(),
        }
    }
}

impl ValidationConfig {
    #[must_use]
    pub fn with_weights(mut self, weights: QualityWeights) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub fn with_thickness_range(mut self, min: f64, max: f64) -> Self {
        self.min_thickness = min;
        self.max_thickness = max;
        self
    }
}

/// Error handler settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecoveryConfig {
    pub enable_auto_recovery: bool,
    pub max_recovery_attempts: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enable_auto_recovery: true,
            max_recovery_attempts: 3,
        }
    }
}

impl RecoveryConfig {
    #[must_use]
    pub fn with_auto_recovery(mut self, enabled: bool) -> Self {
        self.enable_auto_recovery = enabled;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_recovery_attempts = attempts;
        self
    }
}

/// Batch processing settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchConfig {
    group_size: usize,
}

impl BatchConfig {
    pub const MIN_GROUP_SIZE: usize = 10;
    pub const MAX_GROUP_SIZE: usize = 20;

    /// Walls processed per group, clamped to 10..=20.
    #[must_use]
    pub fn group_size(&self) -> usize {
        self.group_size.clamp(Self::MIN_GROUP_SIZE, Self::MAX_GROUP_SIZE)
    }

    #[must_use]
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size.clamp(Self::MIN_GROUP_SIZE, Self::MAX_GROUP_SIZE);
        self
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { group_size: 16 }
    }
}

/// Settings for every engine in one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelConfig {
    pub tolerance: ToleranceConfig,
    pub offset: OffsetConfig,
    pub intersection: IntersectionConfig,
    pub boolean: BooleanConfig,
    pub healing: HealingConfig,
    pub simplification: SimplificationConfig,
    pub validation: ValidationConfig,
    pub recovery: RecoveryConfig,
    pub batch: BatchConfig,
}

impl KernelConfig {
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: ToleranceConfig) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: OffsetConfig) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn with_intersection(mut self, intersection: IntersectionConfig) -> Self {
        self.intersection = intersection;
        self
    }

    #[must_use]
    pub fn with_boolean(mut self, boolean: BooleanConfig) -> Self {
        self.boolean = boolean;
        self
    }

    #[must_use]
    pub fn with_healing(mut self, healing: HealingConfig) -> Self {
        self.healing = healing;
        self
    }

    #[must_use]
    pub fn with_simplification(mut self, simplification: SimplificationConfig) -> Self {
        self.simplification = simplification;
        self
    }

    #[must_use]
    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    #[must_use]
    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }

    #[must_use]
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_size_is_clamped() {
        assert_eq!(BatchConfig::default().group_size(), 16);
        assert_eq!(BatchConfig::default().with_group_size(3).group_size(), 10);
        assert_eq!(BatchConfig::default().with_group_size(500).group_size(), 20);
    }

    #[test]
    fn builders_replace_sections() {
        let cfg = KernelConfig::default()
            .with_offset(OffsetConfig::default().with_join_type(JoinType::Round))
            .with_recovery(RecoveryConfig::default().with_max_attempts(1));
        assert_eq!(cfg.offset.default_join_type, JoinType::Round);
        assert_eq!(cfg.recovery.max_recovery_attempts, 1);
        assert!((cfg.tolerance.base_tolerance - 0.01).abs() < f64::EPSILON);
    }
}
