use chrono::NaiveDateTime;
use serde::Serialize;

use crate::workflows::incidents::{
    ClassStats, DateRange, Incident, Rankings, Stats, StudentStats,
};
use crate::workflows::summaries::SummaryDigest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPhase {
    Idle,
    Fetching,
    Aggregating,
    RequestingAi,
    Rendering,
    Error,
}

impl ReportPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Fetching => "Fetching",
            Self::Aggregating => "Aggregating",
            Self::RequestingAi => "Requesting AI summary",
            Self::Rendering => "Rendering",
            Self::Error => "Error",
        }
    }
}

/// Aggregated snapshot for one date window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<DateRange>,
    pub generated_at: NaiveDateTime,
    pub stats: Stats,
    pub students: Vec<StudentStats>,
    pub classes: Vec<ClassStats>,
    pub rankings: Rankings,
    /// In-window incidents the narrative is requested for.
    #[serde(skip)]
    pub incidents: Vec<Incident>,
}

impl DashboardReport {
    pub fn scope_label(&self) -> String {
        match &self.range {
            Some(range) => format!("All students, {} to {}", range.from, range.to),
            None => "All students".to_string(),
        }
    }
}

/// What subscribers render. `report` is the last good snapshot and survives
/// failed refreshes and failed summary calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportView {
    pub phase: ReportPhase,
    pub phase_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<DashboardReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<SummaryDigest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub refreshes: u64,
}

impl Default for ReportView {
    fn default() -> Self {
        Self {
            phase: ReportPhase::Idle,
            phase_label: ReportPhase::Idle.label(),
            report: None,
            digest: None,
            error: None,
            refreshes: 0,
        }
    }
}

impl ReportView {
    pub(crate) fn enter(&mut self, phase: ReportPhase) {
        self.phase = phase;
        self.phase_label = phase.label();
        if phase != ReportPhase::Error {
            self.error = None;
        }
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.enter(ReportPhase::Error);
        self.error = Some(message);
    }
}
