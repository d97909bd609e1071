use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::client::{AiSummary, Recommendations, SummaryError};
use super::reconstruct::{split_into_items, ItemHeader};

/// Placeholder shown when no narrative could be produced.
pub const ANALYSIS_UNAVAILABLE: &str = "Analysis unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestSource {
    Structured,
    Raw,
    Unavailable,
}

/// Display-ready narrative built from a collaborator response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryDigest {
    pub summary: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
    pub source: DigestSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl SummaryDigest {
    /// Itemise `resumen` and `recomendaciones`, falling back to `raw` and
    /// then to the unavailable placeholder.
    pub fn from_response(response: &AiSummary, header: ItemHeader) -> Self {
        let summary = response
            .resumen
            .as_deref()
            .map(|text| split_into_items(text, ItemHeader::Report))
            .unwrap_or_default();

        let recommendations = match &response.recomendaciones {
            Some(Recommendations::Text(text)) => split_into_items(text, header),
            Some(Recommendations::List(items)) => items
                .iter()
                .flat_map(|item| split_into_items(item, header))
                .collect(),
            None => Vec::new(),
        };

        if !summary.is_empty() || !recommendations.is_empty() {
            return Self {
                summary,
                recommendations,
                alerts: response.alertas.clone(),
                extra: response.extra.clone(),
                source: DigestSource::Structured,
                notice: None,
            };
        }

        let mut digest = match response.raw.as_deref() {
            Some(raw) => Self::from_raw(raw, header),
            None => Self::unavailable("the collaborator returned no narrative"),
        };
        digest.alerts = response.alertas.clone();
        digest.extra = response.extra.clone();
        digest
    }

    /// Recover from a failed call: show raw text when it survived, the
    /// placeholder otherwise.
    pub fn from_error(error: &SummaryError, header: ItemHeader) -> Self {
        match error.raw_text() {
            Some(raw) => {
                let mut digest = Self::from_raw(raw, header);
                digest.notice = Some(error.to_string());
                digest
            }
            None => Self::unavailable(&error.to_string()),
        }
    }

    pub fn from_result(result: &Result<AiSummary, SummaryError>, header: ItemHeader) -> Self {
        match result {
            Ok(response) => Self::from_response(response, header),
            Err(error) => Self::from_error(error, header),
        }
    }

    fn from_raw(raw: &str, header: ItemHeader) -> Self {
        let summary = split_into_items(raw, header);
        if summary.is_empty() {
            return Self::unavailable("the collaborator returned an empty narrative");
        }
        Self {
            summary,
            recommendations: Vec::new(),
            alerts: None,
            extra: BTreeMap::new(),
            source: DigestSource::Raw,
            notice: None,
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            summary: vec![ANALYSIS_UNAVAILABLE.to_string()],
            recommendations: Vec::new(),
            alerts: None,
            extra: BTreeMap::new(),
            source: DigestSource::Unavailable,
            notice: Some(reason.to_string()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.source != DigestSource::Unavailable
    }
}
