//! Reputation scoring and the standout / at-risk rankings.
//!
//! Two independent formulas live here: the weighted ranking score
//! ([`ScoreCard::points`]) and the bounded profile performance index
//! ([`PerformanceIndex`]). Neither feeds the other.

mod config;
mod performance;
mod ranking;
mod rules;

pub use config::{PerformanceWeights, ScoringConfig, ScoringWeights};
pub use performance::{PerformanceBand, PerformanceIndex};
pub use ranking::{RankedStudent, Rankings};
pub use rules::ScoreCard;

use serde::Serialize;

use super::aggregate::{group_by_student, in_window, DateRange};
use super::domain::{Incident, Student, StudentRef};
use super::identity::{resolve_student, IdentityError};

/// Stateless engine applying a [`ScoringConfig`] to incident snapshots.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one student's incidents.
    pub fn score(&self, incidents: &[Incident]) -> ScoreCard {
        rules::score_incidents(incidents, &self.config.weights)
    }

    /// One scorecard per canonical student appearing in the window.
    pub fn scorecards(
        &self,
        incidents: &[Incident],
        roster: &[Student],
        filter: Option<&DateRange>,
    ) -> Vec<RankedStudent> {
        let (selected, _) = in_window(incidents, filter);
        group_by_student(selected, roster)
            .into_iter()
            .map(|(student_key, group)| RankedStudent {
                card: rules::score_incidents(group.incidents.iter().copied(), &self.config.weights),
                student_key,
                label: group.label,
                grade: group.student.map(|student| student.grade.clone()),
                section: group.student.map(|student| student.section.clone()),
            })
            .collect()
    }

    pub fn rank(
        &self,
        incidents: &[Incident],
        roster: &[Student],
        filter: Option<&DateRange>,
    ) -> Rankings {
        let cards = self.scorecards(incidents, roster, filter);
        Rankings {
            standouts: ranking::standouts(&cards, self.config.standout_limit),
            at_risk: ranking::at_risk(&cards, self.config.at_risk_severe_threshold),
        }
    }

    pub fn performance(&self, card: &ScoreCard) -> PerformanceIndex {
        performance::performance_index(card, &self.config.performance)
    }

    /// Scorecard and performance index for the student `reference` resolves to.
    pub fn profile(
        &self,
        reference: &StudentRef,
        incidents: &[Incident],
        roster: &[Student],
        filter: Option<&DateRange>,
    ) -> Result<StudentProfile, IdentityError> {
        let student = resolve_student(reference, roster)?;
        let (selected, _) = in_window(incidents, filter);
        let own: Vec<&Incident> = selected
            .into_iter()
            .filter(|incident| {
                resolve_student(&incident.student, roster)
                    .map(|resolved| resolved.key() == student.key())
                    .unwrap_or(false)
            })
            .collect();

        let card = rules::score_incidents(own.iter().copied(), &self.config.weights);
        Ok(StudentProfile {
            student: student.clone(),
            performance: self.performance(&card),
            card,
            incident_count: own.len(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentProfile {
    pub student: Student,
    pub card: ScoreCard,
    pub performance: PerformanceIndex,
    pub incident_count: usize,
}
