use std::collections::BTreeSet;

use super::aggregate::DateRange;
use super::domain::{
    AttendanceRecord, ClassAssignment, Incident, IncidentId, Student, StudentId, StudentRef,
    ViewerRole,
};

/// Persistence collaborator. Every call works on a fresh snapshot; nothing is
/// cached between calls.
pub trait IncidentStore: Send + Sync {
    /// Incidents whose calendar date falls inside `filter`, or all of them.
    fn fetch_incidents(&self, filter: Option<&DateRange>) -> Result<Vec<Incident>, RepositoryError>;
    fn fetch_students(&self) -> Result<Vec<Student>, RepositoryError>;
    fn fetch_student_by_id(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError>;
    fn fetch_student_by_name(&self, name: &str) -> Result<Option<Student>, RepositoryError>;

    /// Upsert. When `existing` resolves to a stored record that record is
    /// updated in place and keeps its identifier; otherwise a new record is
    /// inserted.
    fn save_student(
        &self,
        student: Student,
        existing: Option<&StudentRef>,
    ) -> Result<Student, RepositoryError>;

    fn insert_incident(&self, incident: Incident) -> Result<Incident, RepositoryError>;
    fn mark_incident_resolved(&self, id: &IncidentId) -> Result<Incident, RepositoryError>;
    fn mark_incident_seen(&self, id: &IncidentId, role: ViewerRole) -> Result<(), RepositoryError>;
    /// Marks the known ids and returns how many were marked.
    fn mark_incidents_seen(
        &self,
        ids: &[IncidentId],
        role: ViewerRole,
    ) -> Result<usize, RepositoryError>;
    fn seen_by(&self, role: ViewerRole) -> Result<BTreeSet<IncidentId>, RepositoryError>;

    fn fetch_classes(&self) -> Result<Vec<ClassAssignment>, RepositoryError>;
    fn insert_class(&self, class: ClassAssignment) -> Result<ClassAssignment, RepositoryError>;
    fn fetch_attendance(
        &self,
        filter: Option<&DateRange>,
    ) -> Result<Vec<AttendanceRecord>, RepositoryError>;
    fn insert_attendance(
        &self,
        record: AttendanceRecord,
    ) -> Result<AttendanceRecord, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} already exists")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
