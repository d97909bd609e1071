use crate::infra::AppState;
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Extension;
use axum::Json;
use incident_desk::error::AppError;
use incident_desk::workflows::incidents::{
    incident_router, IncidentId, IncidentService, IncidentStore, RangeQuery, StudentRef,
};
use incident_desk::workflows::report::ReportView;
use incident_desk::workflows::summaries::{split_into_items, ItemHeader, SummaryDigest};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum HeaderKind {
    #[default]
    Report,
    Incident,
}

impl From<HeaderKind> for ItemHeader {
    fn from(kind: HeaderKind) -> Self {
        match kind {
            HeaderKind::Report => ItemHeader::Report,
            HeaderKind::Incident => ItemHeader::Incident,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextItemsRequest {
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) header: HeaderKind,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentSummaryRequest {
    pub(crate) student: StudentRef,
    #[serde(flatten)]
    pub(crate) range: RangeQuery,
}

pub(crate) fn with_dashboard_routes<S>(service: Arc<IncidentService<S>>) -> axum::Router
where
    S: IncidentStore + 'static,
{
    incident_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/dashboard", get(dashboard_endpoint))
        .route("/api/v1/dashboard/refresh", post(refresh_endpoint))
        .route("/api/v1/dashboard/summary", post(summary_endpoint))
        .route(
            "/api/v1/incidents/:incident_id/summary",
            post(incident_summary_endpoint),
        )
        .route("/api/v1/students/summary", post(student_summary_endpoint))
        .route("/api/v1/text/items", post(text_items_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Last published view, without touching the store.
pub(crate) async fn dashboard_endpoint(Extension(state): Extension<AppState>) -> Json<ReportView> {
    Json(state.orchestrator.current())
}

pub(crate) async fn refresh_endpoint(
    Extension(state): Extension<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ReportView>, AppError> {
    state.orchestrator.refresh(query.range())?;
    Ok(Json(state.orchestrator.current()))
}

pub(crate) async fn summary_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<Json<SummaryDigest>, AppError> {
    state.orchestrator.cancel_pending();
    let digest = state.orchestrator.summarize_now().await?;
    Ok(Json(digest))
}

pub(crate) async fn incident_summary_endpoint(
    Extension(state): Extension<AppState>,
    Path(incident_id): Path<String>,
) -> Result<Json<SummaryDigest>, AppError> {
    let digest = state
        .orchestrator
        .summarize_incident(&IncidentId(incident_id))
        .await?;
    Ok(Json(digest))
}

pub(crate) async fn student_summary_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<StudentSummaryRequest>,
) -> Result<Json<SummaryDigest>, AppError> {
    let digest = state
        .orchestrator
        .summarize_student(&payload.student, payload.range.range())
        .await?;
    Ok(Json(digest))
}

pub(crate) async fn text_items_endpoint(
    Json(payload): Json<TextItemsRequest>,
) -> Json<serde_json::Value> {
    let items = split_into_items(&payload.text, payload.header.into());
    Json(json!({ "items": items }))
}
