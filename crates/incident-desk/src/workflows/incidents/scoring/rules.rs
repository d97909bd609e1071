use serde::Serialize;

use super::super::aggregate::SeverityCounts;
use super::super::domain::Incident;
use super::config::ScoringWeights;

/// Weighted tally for one student. No floor or ceiling is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreCard {
    pub points: i32,
    pub positives: usize,
    pub negatives: usize,
    pub by_severity: SeverityCounts,
}

pub(crate) fn score_incidents<'a>(
    incidents: impl IntoIterator<Item = &'a Incident>,
    weights: &ScoringWeights,
) -> ScoreCard {
    let mut card = ScoreCard::default();

    for incident in incidents {
        match incident.effective_severity() {
            None => {
                card.positives += 1;
                card.points += weights.positive;
            }
            Some(severity) => {
                card.negatives += 1;
                card.by_severity.bump(severity);
                card.points += weights.severity_weight(severity);
            }
        }
    }

    card
}
