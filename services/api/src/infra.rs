use chrono::NaiveDate;
use incident_desk::config::AppConfig;
use incident_desk::error::AppError;
use incident_desk::workflows::incidents::{IncidentService, InMemoryIncidentStore, ScoringEngine};
use incident_desk::workflows::report::ReportOrchestrator;
use incident_desk::workflows::summaries::SummaryBackend;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type DashboardOrchestrator = ReportOrchestrator<InMemoryIncidentStore, SummaryBackend>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) orchestrator: DashboardOrchestrator,
}

pub(crate) fn build_service(
    config: &AppConfig,
    store: Arc<InMemoryIncidentStore>,
) -> IncidentService<InMemoryIncidentStore> {
    IncidentService::new(store)
        .with_scoring(config.scoring)
        .with_validation(config.validation)
        .with_retry(config.persistence)
}

pub(crate) fn build_orchestrator(
    config: &AppConfig,
    store: Arc<InMemoryIncidentStore>,
) -> Result<DashboardOrchestrator, AppError> {
    let backend = SummaryBackend::from_config(&config.ai)?;
    if !backend.is_enabled() {
        tracing::info!("APP_AI_ENDPOINT not set, narratives disabled");
    }
    Ok(ReportOrchestrator::new(
        store,
        Arc::new(backend),
        ScoringEngine::new(config.scoring),
        config.report,
    ))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let file = std::fs::File::open(path)?;
    let value = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(std::io::Error::from)?;
    Ok(value)
}
