use serde::{Deserialize, Serialize};

use super::super::domain::Severity;

/// Points contributed by each incident kind to the ranking score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub positive: i32,
    pub mild: i32,
    pub moderate: i32,
    pub severe: i32,
}

impl ScoringWeights {
    pub const fn severity_weight(&self, severity: Severity) -> i32 {
        match severity {
            Severity::Mild => self.mild,
            Severity::Moderate => self.moderate,
            Severity::Severe => self.severe,
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            positive: 5,
            mild: -1,
            moderate: -3,
            severe: -6,
        }
    }
}

/// Coefficients of the profile-view performance index. Kept apart from
/// [`ScoringWeights`]; the two formulas serve different screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceWeights {
    pub base: i32,
    pub per_positive: i32,
    pub per_negative: i32,
    pub per_severe: i32,
}

impl Default for PerformanceWeights {
    fn default() -> Self {
        Self {
            base: 50,
            per_positive: 20,
            per_negative: 10,
            per_severe: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub standout_limit: usize,
    pub at_risk_severe_threshold: usize,
    pub performance: PerformanceWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            standout_limit: 10,
            at_risk_severe_threshold: 3,
            performance: PerformanceWeights::default(),
        }
    }
}
