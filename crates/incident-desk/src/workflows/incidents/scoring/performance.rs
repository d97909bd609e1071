use serde::Serialize;

use super::config::PerformanceWeights;
use super::rules::ScoreCard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceBand {
    Excellent,
    Good,
    Fair,
    NeedsAttention,
}

impl PerformanceBand {
    pub const fn for_score(score: u8) -> Self {
        match score {
            70..=u8::MAX => Self::Excellent,
            50..=69 => Self::Good,
            30..=49 => Self::Fair,
            _ => Self::NeedsAttention,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::NeedsAttention => "Needs attention",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PerformanceIndex {
    pub score: u8,
    pub band: PerformanceBand,
    pub band_label: &'static str,
}

/// Display heuristic for the profile view, bounded to 0..=100.
pub(crate) fn performance_index(card: &ScoreCard, weights: &PerformanceWeights) -> PerformanceIndex {
    let raw = card.positives as i64 * weights.per_positive as i64
        - card.negatives as i64 * weights.per_negative as i64
        - card.by_severity.severe as i64 * weights.per_severe as i64
        + weights.base as i64;
    let score = raw.clamp(0, 100) as u8;
    let band = PerformanceBand::for_score(score);

    PerformanceIndex {
        score,
        band,
        band_label: band.label(),
    }
}
