use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use super::aggregate::RangeQuery;
use super::domain::{
    AttendanceRecord, ClassAssignment, EscalationTarget, IncidentDraft, IncidentId, Student,
    StudentId, StudentRef, ViewerRole,
};
use super::identity::IdentityError;
use super::repository::{IncidentStore, RepositoryError};
use super::service::{IncidentService, ServiceError};

/// Router exposing student, incident, notification, class, and attendance endpoints.
pub fn incident_router<S>(service: Arc<IncidentService<S>>) -> Router
where
    S: IncidentStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/students",
            get(list_students_handler::<S>).post(save_student_handler::<S>),
        )
        .route("/api/v1/students/resolve", post(resolve_student_handler::<S>))
        .route("/api/v1/students/profile", get(profile_handler::<S>))
        .route(
            "/api/v1/incidents",
            get(list_incidents_handler::<S>).post(report_incident_handler::<S>),
        )
        .route("/api/v1/incidents/seen", post(bulk_seen_handler::<S>))
        .route(
            "/api/v1/incidents/:incident_id/resolve",
            post(resolve_incident_handler::<S>),
        )
        .route(
            "/api/v1/incidents/:incident_id/seen",
            post(seen_handler::<S>),
        )
        .route("/api/v1/notifications/:role", get(notifications_handler::<S>))
        .route("/api/v1/escalations/:target", get(escalations_handler::<S>))
        .route(
            "/api/v1/classes",
            get(list_classes_handler::<S>).post(register_class_handler::<S>),
        )
        .route(
            "/api/v1/attendance",
            get(list_attendance_handler::<S>).post(record_attendance_handler::<S>),
        )
        .with_state(service)
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) | ServiceError::Identity(IdentityError::EmptyReference) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::Identity(IdentityError::NotFound(_))
            | ServiceError::Repository(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServiceError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            ServiceError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "incident request failed");
        }
        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Deserialize)]
pub struct SaveStudentRequest {
    pub student: Student,
    #[serde(default)]
    pub existing: Option<StudentRef>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SeenRequest {
    pub role: ViewerRole,
}

#[derive(Debug, Deserialize)]
pub struct BulkSeenRequest {
    pub ids: Vec<IncidentId>,
    pub role: ViewerRole,
}

pub(crate) async fn list_students_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
) -> Response
where
    S: IncidentStore + 'static,
{
    match service.list_students() {
        Ok(students) => (StatusCode::OK, Json(students)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn save_student_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Json(request): Json<SaveStudentRequest>,
) -> Response
where
    S: IncidentStore + 'static,
{
    // A non-blank `existing` either resolves and updates in place or fails.
    let updating = request
        .existing
        .as_ref()
        .is_some_and(|reference| !reference.is_empty());
    match service
        .save_student(request.student, request.existing.as_ref(), today())
        .await
    {
        Ok(student) => {
            let status = if updating {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (status, Json(student)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn resolve_student_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Json(reference): Json<StudentRef>,
) -> Response
where
    S: IncidentStore + 'static,
{
    match service.resolve_student(&reference) {
        Ok(student) => (StatusCode::OK, Json(student)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn profile_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Query(query): Query<ProfileQuery>,
) -> Response
where
    S: IncidentStore + 'static,
{
    let reference = StudentRef {
        id: query.id.map(StudentId),
        name: query.name,
    };
    let range = RangeQuery {
        from: query.from,
        to: query.to,
    }
    .range();

    match service.student_profile(&reference, range.as_ref()) {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn list_incidents_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Query(query): Query<RangeQuery>,
) -> Response
where
    S: IncidentStore + 'static,
{
    match service.list_incidents(query.range().as_ref()) {
        Ok(incidents) => (StatusCode::OK, Json(incidents)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn report_incident_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Json(draft): Json<IncidentDraft>,
) -> Response
where
    S: IncidentStore + 'static,
{
    match service.report_incident(draft, Local::now().naive_local()) {
        Ok(incident) => (StatusCode::CREATED, Json(incident)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn resolve_incident_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Path(incident_id): Path<String>,
) -> Response
where
    S: IncidentStore + 'static,
{
    match service.mark_resolved(&IncidentId(incident_id)) {
        Ok(incident) => (StatusCode::OK, Json(incident)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn seen_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Path(incident_id): Path<String>,
    Json(request): Json<SeenRequest>,
) -> Response
where
    S: IncidentStore + 'static,
{
    match service.mark_seen(&IncidentId(incident_id), request.role) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn bulk_seen_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Json(request): Json<BulkSeenRequest>,
) -> Response
where
    S: IncidentStore + 'static,
{
    match service.mark_many_seen(&request.ids, request.role) {
        Ok(marked) => (StatusCode::OK, Json(json!({ "marked": marked }))).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn notifications_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Path(role): Path<ViewerRole>,
) -> Response
where
    S: IncidentStore + 'static,
{
    match service.unseen_for(role) {
        Ok(incidents) => {
            let payload = json!({
                "unseen": incidents.len(),
                "incidents": incidents,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn escalations_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Path(target): Path<EscalationTarget>,
) -> Response
where
    S: IncidentStore + 'static,
{
    match service.escalation_queue(target) {
        Ok(queue) => (StatusCode::OK, Json(queue)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn list_classes_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
) -> Response
where
    S: IncidentStore + 'static,
{
    match service.list_classes() {
        Ok(classes) => (StatusCode::OK, Json(classes)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn register_class_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Json(class): Json<ClassAssignment>,
) -> Response
where
    S: IncidentStore + 'static,
{
    match service.register_class(class) {
        Ok(class) => (StatusCode::CREATED, Json(class)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn list_attendance_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Query(query): Query<RangeQuery>,
) -> Response
where
    S: IncidentStore + 'static,
{
    let range = query.range();
    let records = match service.list_attendance(range.as_ref()) {
        Ok(records) => records,
        Err(error) => return error.into_response(),
    };
    match service.attendance_summary(range.as_ref()) {
        Ok(tally) => {
            let payload = json!({
                "records": records,
                "tally": tally,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn record_attendance_handler<S>(
    State(service): State<Arc<IncidentService<S>>>,
    Json(record): Json<AttendanceRecord>,
) -> Response
where
    S: IncidentStore + 'static,
{
    match service.record_attendance(record, today()) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(error) => error.into_response(),
    }
}
