use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde_json::Value;

use crate::workflows::incidents::aggregate::DateRange;
use crate::workflows::incidents::domain::{
    AttendanceRecord, AttendanceState, ClassAssignment, EscalationTarget, Incident, IncidentCategory,
    IncidentDraft, IncidentId, Severity, Student, StudentId, StudentRef, ViewerRole,
};
use crate::workflows::incidents::memory::InMemoryIncidentStore;
use crate::workflows::incidents::repository::{IncidentStore, RepositoryError};
use crate::workflows::incidents::service::IncidentService;

pub(super) const ANA_ID: &str = "0b6f3d2e-5a41-4c8e-9f17-2d3c4b5a6e7f";
pub(super) const SOFIA_ID: &str = "7c9e1f20-3b4a-4d5c-8e6f-708192a3b4c5";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date")
}

pub(super) fn now() -> NaiveDateTime {
    today().and_hms_opt(10, 30, 0).expect("valid time")
}

pub(super) fn student(id: Option<&str>, first: &str, last: &str, section: &str) -> Student {
    Student {
        id: id.map(|id| StudentId(id.to_string())),
        first_name: first.to_string(),
        last_name: last.to_string(),
        grade: "3".to_string(),
        section: section.to_string(),
        ..Student::default()
    }
}

pub(super) fn roster() -> Vec<Student> {
    vec![
        student(Some(ANA_ID), "Ana", "Torres", "A"),
        student(None, "Luis", "Paredes", "B"),
        student(Some(SOFIA_ID), "Sofía", "Quispe", "A"),
    ]
}

pub(super) fn build_service() -> (
    IncidentService<InMemoryIncidentStore>,
    Arc<InMemoryIncidentStore>,
) {
    let store = Arc::new(InMemoryIncidentStore::with_students(roster()));
    (IncidentService::new(store.clone()), store)
}

pub(super) fn draft(
    name: &str,
    category: IncidentCategory,
    severity: Option<Severity>,
) -> IncidentDraft {
    IncidentDraft {
        student: StudentRef::by_name(name),
        category,
        severity,
        description: "Interrumpió la clase en varias ocasiones".to_string(),
        date: "2025-03-10".to_string(),
        teacher: "Prof. Ruiz".to_string(),
        escalation: None,
    }
}

pub(super) fn escalated(name: &str, target: EscalationTarget) -> IncidentDraft {
    IncidentDraft {
        escalation: Some(target),
        ..draft(name, IncidentCategory::Behavior, Some(Severity::Severe))
    }
}

pub(super) fn math_class() -> ClassAssignment {
    ClassAssignment {
        name: "Matemática".to_string(),
        grade: "3".to_string(),
        section: "A".to_string(),
        teacher: "Prof. Ruiz".to_string(),
        weekdays: vec![Weekday::Mon, Weekday::Wed],
    }
}

pub(super) fn attendance(date: NaiveDate) -> AttendanceRecord {
    let mut marks = BTreeMap::new();
    marks.insert(ANA_ID.to_string(), AttendanceState::Present);
    marks.insert("Luis Paredes".to_string(), AttendanceState::Late);
    AttendanceRecord {
        weekday: date.weekday(),
        date,
        class_name: "Matemática".to_string(),
        grade: "3".to_string(),
        section: "A".to_string(),
        teacher: "Prof. Ruiz".to_string(),
        period: "1".to_string(),
        location: Some("Aula 12".to_string()),
        marks,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Delegates to an in-memory store but hides students from the first `lag`
/// id lookups after every save, like a lagging replica.
pub(super) struct LaggingStore {
    inner: InMemoryIncidentStore,
    lag: usize,
    hidden_reads: AtomicUsize,
    pub(super) id_reads: AtomicUsize,
}

impl LaggingStore {
    pub(super) fn new(lag: usize) -> Self {
        Self {
            inner: InMemoryIncidentStore::with_students(roster()),
            lag,
            hidden_reads: AtomicUsize::new(0),
            id_reads: AtomicUsize::new(0),
        }
    }
}

impl IncidentStore for LaggingStore {
    fn fetch_incidents(&self, filter: Option<&DateRange>) -> Result<Vec<Incident>, RepositoryError> {
        self.inner.fetch_incidents(filter)
    }

    fn fetch_students(&self) -> Result<Vec<Student>, RepositoryError> {
        self.inner.fetch_students()
    }

    fn fetch_student_by_id(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        self.id_reads.fetch_add(1, Ordering::SeqCst);
        let hidden = self
            .hidden_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if hidden {
            return Ok(None);
        }
        self.inner.fetch_student_by_id(id)
    }

    fn fetch_student_by_name(&self, name: &str) -> Result<Option<Student>, RepositoryError> {
        self.inner.fetch_student_by_name(name)
    }

    fn save_student(
        &self,
        student: Student,
        existing: Option<&StudentRef>,
    ) -> Result<Student, RepositoryError> {
        let saved = self.inner.save_student(student, existing)?;
        self.hidden_reads.store(self.lag, Ordering::SeqCst);
        Ok(saved)
    }

    fn insert_incident(&self, incident: Incident) -> Result<Incident, RepositoryError> {
        self.inner.insert_incident(incident)
    }

    fn mark_incident_resolved(&self, id: &IncidentId) -> Result<Incident, RepositoryError> {
        self.inner.mark_incident_resolved(id)
    }

    fn mark_incident_seen(&self, id: &IncidentId, role: ViewerRole) -> Result<(), RepositoryError> {
        self.inner.mark_incident_seen(id, role)
    }

    fn mark_incidents_seen(
        &self,
        ids: &[IncidentId],
        role: ViewerRole,
    ) -> Result<usize, RepositoryError> {
        self.inner.mark_incidents_seen(ids, role)
    }

    fn seen_by(&self, role: ViewerRole) -> Result<BTreeSet<IncidentId>, RepositoryError> {
        self.inner.seen_by(role)
    }

    fn fetch_classes(&self) -> Result<Vec<ClassAssignment>, RepositoryError> {
        self.inner.fetch_classes()
    }

    fn insert_class(&self, class: ClassAssignment) -> Result<ClassAssignment, RepositoryError> {
        self.inner.insert_class(class)
    }

    fn fetch_attendance(
        &self,
        filter: Option<&DateRange>,
    ) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        self.inner.fetch_attendance(filter)
    }

    fn insert_attendance(
        &self,
        record: AttendanceRecord,
    ) -> Result<AttendanceRecord, RepositoryError> {
        self.inner.insert_attendance(record)
    }
}

pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl IncidentStore for UnavailableStore {
    fn fetch_incidents(&self, _filter: Option<&DateRange>) -> Result<Vec<Incident>, RepositoryError> {
        offline()
    }

    fn fetch_students(&self) -> Result<Vec<Student>, RepositoryError> {
        offline()
    }

    fn fetch_student_by_id(&self, _id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        offline()
    }

    fn fetch_student_by_name(&self, _name: &str) -> Result<Option<Student>, RepositoryError> {
        offline()
    }

    fn save_student(
        &self,
        _student: Student,
        _existing: Option<&StudentRef>,
    ) -> Result<Student, RepositoryError> {
        offline()
    }

    fn insert_incident(&self, _incident: Incident) -> Result<Incident, RepositoryError> {
        offline()
    }

    fn mark_incident_resolved(&self, _id: &IncidentId) -> Result<Incident, RepositoryError> {
        offline()
    }

    fn mark_incident_seen(&self, _id: &IncidentId, _role: ViewerRole) -> Result<(), RepositoryError> {
        offline()
    }

    fn mark_incidents_seen(
        &self,
        _ids: &[IncidentId],
        _role: ViewerRole,
    ) -> Result<usize, RepositoryError> {
        offline()
    }

    fn seen_by(&self, _role: ViewerRole) -> Result<BTreeSet<IncidentId>, RepositoryError> {
        offline()
    }

    fn fetch_classes(&self) -> Result<Vec<ClassAssignment>, RepositoryError> {
        offline()
    }

    fn insert_class(&self, _class: ClassAssignment) -> Result<ClassAssignment, RepositoryError> {
        offline()
    }

    fn fetch_attendance(
        &self,
        _filter: Option<&DateRange>,
    ) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        offline()
    }

    fn insert_attendance(
        &self,
        _record: AttendanceRecord,
    ) -> Result<AttendanceRecord, RepositoryError> {
        offline()
    }
}
