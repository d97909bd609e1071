use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AiConfig;
use crate::workflows::incidents::Incident;

/// Payload sent to the summary collaborator.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SummaryRequest {
    Incident {
        incident: Incident,
    },
    Incidents {
        incidents: Vec<Incident>,
        #[serde(rename = "studentLabel")]
        student_label: String,
    },
}

impl SummaryRequest {
    pub fn incident_count(&self) -> usize {
        match self {
            Self::Incident { .. } => 1,
            Self::Incidents { incidents, .. } => incidents.len(),
        }
    }
}

/// Recommendations arrive either as one block of prose or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recommendations {
    Text(String),
    List(Vec<String>),
}

/// Collaborator response. Only `resumen`, `recomendaciones`, and `raw` are
/// interpreted; everything else is carried through for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiSummary {
    #[serde(default)]
    pub resumen: Option<String>,
    #[serde(default)]
    pub recomendaciones: Option<Recommendations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alertas: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("summary collaborator is not configured")]
    Disabled,
    #[error("failed to build summary client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("summary request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("summary collaborator answered with status {0}")]
    Status(u16),
    #[error("summary collaborator returned an empty body")]
    EmptyBody,
    #[error("summary response is not valid JSON: {source}")]
    Malformed {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SummaryError {
    /// Response text worth showing when the structured fields are lost.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::Malformed { raw, .. } => Some(raw.as_str()),
            _ => None,
        }
    }
}

/// Outbound seam to the summary collaborator.
pub trait SummaryGateway: Send + Sync {
    fn request_summary(
        &self,
        request: &SummaryRequest,
    ) -> impl Future<Output = Result<AiSummary, SummaryError>> + Send;
}

/// JSON-over-HTTP client with an explicit request timeout.
#[derive(Debug, Clone)]
pub struct HttpSummaryClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpSummaryClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SummaryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(SummaryError::Client)?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SummaryGateway for HttpSummaryClient {
    async fn request_summary(&self, request: &SummaryRequest) -> Result<AiSummary, SummaryError> {
        debug!(
            endpoint = %self.endpoint,
            incidents = request.incident_count(),
            "requesting summary"
        );
        let response = self.http.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "summary collaborator rejected request");
            return Err(SummaryError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(SummaryError::EmptyBody);
        }

        serde_json::from_str(&body).map_err(|source| SummaryError::Malformed { raw: body, source })
    }
}

/// Configured collaborator: HTTP when an endpoint is set, disabled otherwise.
#[derive(Debug, Clone)]
pub enum SummaryBackend {
    Http(HttpSummaryClient),
    Disabled,
}

impl SummaryBackend {
    pub fn from_config(config: &AiConfig) -> Result<Self, SummaryError> {
        match &config.endpoint {
            Some(endpoint) => Ok(Self::Http(HttpSummaryClient::new(
                endpoint.clone(),
                config.timeout,
            )?)),
            None => Ok(Self::Disabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

impl SummaryGateway for SummaryBackend {
    async fn request_summary(&self, request: &SummaryRequest) -> Result<AiSummary, SummaryError> {
        match self {
            Self::Http(client) => client.request_summary(request).await,
            Self::Disabled => Err(SummaryError::Disabled),
        }
    }
}
