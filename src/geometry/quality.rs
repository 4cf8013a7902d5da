/// Quality scores and defect counters for one wall solid.
///
/// Scores are in `[0, 1]`. A default value describes a solid that has not
/// been validated yet: all scores zero, no counted defects.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QualityMetrics {
    pub geometric_accuracy: f64,
    pub topological_consistency: f64,
    pub manufacturability: f64,
    pub architectural_compliance: f64,
    pub sliver_face_count: usize,
    pub micro_gap_count: usize,
    pub self_intersection_count: usize,
    pub degenerate_element_count: usize,
    pub complexity: usize,
    /// Output vertices per input vertex, capped at 1.
    pub processing_efficiency: f64,
    /// Approximate heap footprint of the solid in bytes.
    pub memory_usage: usize,
}

/// Weights combining the four sub-scores into one quality score.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QualityWeights {
    pub geometric_accuracy: f64,
    pub topological_consistency: f64,
    pub manufacturability: f64,
    pub architectural_compliance: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            geometric_accuracy: 0.3,
            topological_consistency: 0.3,
            manufacturability: 0.2,
            architectural_compliance: 0.2,
        }
    }
}

impl QualityMetrics {
    /// Weighted mean of the four sub-scores. Weights need not sum to one.
    #[must_use]
    pub fn weighted_score(&self, weights: &QualityWeights) -> f64 {
        let total = weights.geometric_accuracy
            + weights.topological_consistency
            + weights.manufacturability
            + weights.architectural_compliance;
        if total <= 0.0 {
            return 0.0;
        }
        let sum = self.geometric_accuracy * weights.geometric_accuracy
            + self.topological_consistency * weights.topological_consistency
            + self.manufacturability * weights.manufacturability
            + self.architectural_compliance * weights.architectural_compliance;
        (sum / total).clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn defect_count(&self) -> usize {
        self.sliver_face_count
            + self.micro_gap_count
            + self.self_intersection_count
            + self.degenerate_element_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_scores_weigh_to_one() {
        let m = QualityMetrics {
            geometric_accuracy: 1.0,
            topological_consistency: 1.0,
            manufacturability: 1.0,
            architectural_compliance: 1.0,
            ..QualityMetrics::default()
        };
        assert!((m.weighted_score(&QualityWeights::default()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn weights_are_normalised() {
        let m = QualityMetrics {
            geometric_accuracy: 1.0,
            ..QualityMetrics::default()
        };
        let w = QualityWeights {
            geometric_accuracy: 3.0,
            topological_consistency: 3.0,
            manufacturability: 2.0,
            architectural_compliance: 2.0,
        };
        assert!((m.weighted_score(&w) - 0.3).abs() < 1e-12);
    }
}
