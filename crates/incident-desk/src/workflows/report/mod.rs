mod orchestrator;
pub mod views;

pub use orchestrator::{OrchestratorError, PollingHandle, ReportOrchestrator, SummaryTrigger};
pub use views::{DashboardReport, ReportPhase, ReportView};
