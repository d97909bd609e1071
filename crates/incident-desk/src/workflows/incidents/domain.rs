use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize};

/// Stable student identifier. Once assigned it never changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncidentId(pub String);

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guardian {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub alt_phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tutor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Student record as owned by the persistence collaborator.
///
/// Legacy rows imported before identifiers existed carry `id: None` and can
/// only be located by display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    #[serde(default)]
    pub id: Option<StudentId>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub guardian: Guardian,
    #[serde(default)]
    pub tutor: Tutor,
    /// Opaque reference to a stored profile photo.
    #[serde(default)]
    pub photo: Option<String>,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    pub fn reference(&self) -> StudentRef {
        StudentRef {
            id: self.id.clone(),
            name: Some(self.display_name()),
        }
    }

    /// Grouping key: the identifier when present, the display name otherwise.
    pub fn key(&self) -> String {
        match &self.id {
            Some(id) => id.0.clone(),
            None => self.display_name(),
        }
    }
}

/// Reference to a student by identifier, display name, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRef {
    #[serde(default)]
    pub id: Option<StudentId>,
    #[serde(default)]
    pub name: Option<String>,
}

impl StudentRef {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(StudentId(id.into())),
            name: None,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        let blank_id = self.id.as_ref().map_or(true, |id| id.0.trim().is_empty());
        let blank_name = self
            .name
            .as_deref()
            .map_or(true, |name| name.trim().is_empty());
        blank_id && blank_name
    }

    /// Label shown in reports: the name when known, the identifier otherwise.
    pub fn label(&self) -> String {
        match (&self.name, &self.id) {
            (Some(name), _) if !name.trim().is_empty() => name.trim().to_string(),
            (_, Some(id)) => id.0.clone(),
            _ => "unknown student".to_string(),
        }
    }

    pub fn key(&self) -> String {
        match &self.id {
            Some(id) if !id.0.trim().is_empty() => id.0.clone(),
            _ => self.label(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentCategory {
    Attendance,
    Behavior,
    Academic,
    Positive,
}

impl IncidentCategory {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Attendance,
            Self::Behavior,
            Self::Academic,
            Self::Positive,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Attendance => "Attendance",
            Self::Behavior => "Behavior",
            Self::Academic => "Academic",
            Self::Positive => "Positive",
        }
    }

    pub const fn is_positive(self) -> bool {
        matches!(self, Self::Positive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mild => "Mild",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTarget {
    Director,
    Psychology,
    Nursing,
    Coordination,
    Guidance,
}

impl EscalationTarget {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Director => "Director",
            Self::Psychology => "Psychology",
            Self::Nursing => "Nursing",
            Self::Coordination => "Coordination",
            Self::Guidance => "Guidance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Pending,
    Resolved,
    #[serde(alias = "in-review")]
    InReview,
    Closed,
    Normal,
}

impl IncidentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Resolved => "Resolved",
            Self::InReview => "In review",
            Self::Closed => "Closed",
            Self::Normal => "Normal",
        }
    }
}

/// Who is reading the notification feed; the seen side-table is keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerRole {
    Director,
    Teacher,
    Psychology,
    Nursing,
    Coordination,
    Guidance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub student: StudentRef,
    pub category: IncidentCategory,
    #[serde(default)]
    pub severity: Option<Severity>,
    pub description: String,
    /// Calendar date as captured by the teacher; parsed on demand.
    pub date: String,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
    pub teacher: String,
    #[serde(default, deserialize_with = "deserialize_escalation")]
    pub escalation: Option<EscalationTarget>,
    pub resolved: bool,
    pub status: IncidentStatus,
}

impl Incident {
    pub fn is_positive(&self) -> bool {
        self.category.is_positive()
    }

    pub fn calendar_date(&self) -> Option<NaiveDate> {
        parse_calendar_date(&self.date)
    }

    /// Severity used for tallies. Positive incidents carry none; a
    /// non-positive incident recorded without one counts as mild.
    pub fn effective_severity(&self) -> Option<Severity> {
        if self.is_positive() {
            None
        } else {
            Some(self.severity.unwrap_or(Severity::Mild))
        }
    }
}

/// Teacher input for a new incident before identifiers and lifecycle fields exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentDraft {
    pub student: StudentRef,
    pub category: IncidentCategory,
    #[serde(default)]
    pub severity: Option<Severity>,
    pub description: String,
    pub date: String,
    pub teacher: String,
    #[serde(default, deserialize_with = "deserialize_escalation")]
    pub escalation: Option<EscalationTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassAssignment {
    pub name: String,
    pub grade: String,
    pub section: String,
    pub teacher: String,
    #[serde(default)]
    pub weekdays: Vec<Weekday>,
}

impl ClassAssignment {
    pub fn key(&self) -> (String, String, String) {
        (
            self.name.trim().to_string(),
            self.grade.trim().to_string(),
            self.section.trim().to_string(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceState {
    Present,
    Late,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub class_name: String,
    pub grade: String,
    pub section: String,
    pub teacher: String,
    pub period: String,
    #[serde(default)]
    pub location: Option<String>,
    /// Keyed by student identifier, or display name for legacy rows.
    pub marks: BTreeMap<String, AttendanceState>,
}

impl AttendanceRecord {
    pub fn key(&self) -> (NaiveDate, String, String) {
        (
            self.date,
            self.class_name.trim().to_string(),
            self.period.trim().to_string(),
        )
    }
}

/// Parse a calendar date, ignoring any time-of-day component.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc().date());
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%d/%m/%Y").ok()
}

fn deserialize_escalation<'de, D>(deserializer: D) -> Result<Option<EscalationTarget>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("none") => Ok(None),
        Some(value) => {
            let normalized = value.to_ascii_lowercase();
            serde_json::from_value(serde_json::Value::String(normalized))
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}
