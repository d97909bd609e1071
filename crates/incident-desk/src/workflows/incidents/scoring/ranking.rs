use std::cmp::Ordering;

use serde::Serialize;

use super::rules::ScoreCard;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedStudent {
    pub student_key: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub card: ScoreCard,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Rankings {
    pub standouts: Vec<RankedStudent>,
    pub at_risk: Vec<RankedStudent>,
}

fn standout_order(a: &RankedStudent, b: &RankedStudent) -> Ordering {
    b.card
        .points
        .cmp(&a.card.points)
        .then(b.card.positives.cmp(&a.card.positives))
        .then(a.card.by_severity.severe.cmp(&b.card.by_severity.severe))
        .then(a.card.by_severity.moderate.cmp(&b.card.by_severity.moderate))
        .then_with(|| a.label.cmp(&b.label))
}

/// Positive score and at least one positive incident, best first, capped at `limit`.
pub(crate) fn standouts(cards: &[RankedStudent], limit: usize) -> Vec<RankedStudent> {
    let mut eligible: Vec<RankedStudent> = cards
        .iter()
        .filter(|entry| entry.card.points > 0 && entry.card.positives > 0)
        .cloned()
        .collect();
    eligible.sort_by(standout_order);
    eligible.truncate(limit);
    eligible
}

/// Every student at or above the severe threshold, most severe first.
pub(crate) fn at_risk(cards: &[RankedStudent], severe_threshold: usize) -> Vec<RankedStudent> {
    let mut flagged: Vec<RankedStudent> = cards
        .iter()
        .filter(|entry| entry.card.by_severity.severe >= severe_threshold)
        .cloned()
        .collect();
    flagged.sort_by(|a, b| {
        b.card
            .by_severity
            .severe
            .cmp(&a.card.by_severity.severe)
            .then_with(|| a.label.cmp(&b.label))
    });
    flagged
}
