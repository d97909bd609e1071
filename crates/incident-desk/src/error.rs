use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::incidents::{IdentityError, ServiceError};
use crate::workflows::report::OrchestratorError;
use crate::workflows::roster::RosterImportError;
use crate::workflows::summaries::SummaryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Service(ServiceError),
    Summary(SummaryError),
    Roster(RosterImportError),
    Report(OrchestratorError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Service(err) => err.status_code(),
            AppError::Roster(RosterImportError::Service(err)) => err.status_code(),
            AppError::Roster(RosterImportError::Csv(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Roster(RosterImportError::Io(_)) => StatusCode::BAD_REQUEST,
            AppError::Summary(_) => StatusCode::BAD_GATEWAY,
            AppError::Report(OrchestratorError::InFlight) => StatusCode::CONFLICT,
            AppError::Report(
                OrchestratorError::NoReport
                | OrchestratorError::UnknownIncident(_)
                | OrchestratorError::Identity(IdentityError::NotFound(_)),
            ) => StatusCode::NOT_FOUND,
            AppError::Report(OrchestratorError::Identity(IdentityError::EmptyReference)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Report(OrchestratorError::Fetch(_))
            | AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Service(err) => write!(f, "{}", err),
            AppError::Summary(err) => write!(f, "summary collaborator error: {}", err),
            AppError::Roster(err) => write!(f, "{}", err),
            AppError::Report(err) => write!(f, "report error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Service(err) => Some(err),
            AppError::Summary(err) => Some(err),
            AppError::Roster(err) => Some(err),
            AppError::Report(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ServiceError> for AppError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<SummaryError> for AppError {
    fn from(value: SummaryError) -> Self {
        Self::Summary(value)
    }
}

impl From<RosterImportError> for AppError {
    fn from(value: RosterImportError) -> Self {
        Self::Roster(value)
    }
}

impl From<OrchestratorError> for AppError {
    fn from(value: OrchestratorError) -> Self {
        Self::Report(value)
    }
}
