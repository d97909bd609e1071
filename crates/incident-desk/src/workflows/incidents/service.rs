use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use super::aggregate::{attendance_tally, AttendanceTally, DateRange};
use super::domain::{
    AttendanceRecord, ClassAssignment, EscalationTarget, Incident, IncidentDraft, IncidentId,
    IncidentStatus, Severity, Student, StudentRef, ViewerRole,
};
use super::identity::{resolve_via, IdentityError};
use super::repository::{IncidentStore, RepositoryError};
use super::scoring::{ScoringConfig, ScoringEngine, StudentProfile};
use super::validation::{
    ensure_not_future, parse_past_date, require, validate_description, validate_student,
    ValidationError,
};
use crate::config::{RetryPolicy, ValidationConfig};

/// Service composing validation, identity resolution, and the store.
pub struct IncidentService<S> {
    store: Arc<S>,
    scoring: ScoringEngine,
    validation: ValidationConfig,
    retry: RetryPolicy,
}

impl<S> IncidentService<S>
where
    S: IncidentStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            scoring: ScoringEngine::default(),
            validation: ValidationConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_scoring(mut self, config: ScoringConfig) -> Self {
        self.scoring = ScoringEngine::new(config);
        self
    }

    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    fn lookup(&self, reference: &StudentRef) -> Result<Option<Student>, RepositoryError> {
        resolve_via(
            reference,
            |id| self.store.fetch_student_by_id(id),
            |name| self.store.fetch_student_by_name(name),
        )
    }

    /// Canonical record for `reference`, id first, display name second.
    pub fn resolve_student(&self, reference: &StudentRef) -> Result<Student, ServiceError> {
        if reference.is_empty() {
            return Err(IdentityError::EmptyReference.into());
        }
        self.lookup(reference)?
            .ok_or_else(|| IdentityError::NotFound(reference.label()).into())
    }

    pub fn list_students(&self) -> Result<Vec<Student>, ServiceError> {
        Ok(self.store.fetch_students()?)
    }

    /// Validate and upsert a student, then wait for the write to become visible.
    ///
    /// `existing` is resolved id first, then by name, and the match is updated
    /// in place. A reference that resolves to nothing is `NotFound`; only a
    /// missing or blank `existing` inserts a new record.
    pub async fn save_student(
        &self,
        student: Student,
        existing: Option<&StudentRef>,
        today: NaiveDate,
    ) -> Result<Student, ServiceError> {
        validate_student(&student, today)?;

        let canonical = match existing.filter(|reference| !reference.is_empty()) {
            Some(reference) => Some(self.resolve_student(reference)?.reference()),
            None => None,
        };
        let updating = canonical.is_some();

        let saved = self.store.save_student(student, canonical.as_ref())?;
        tracing::info!(
            student_id = saved.id.as_ref().map(|id| id.0.as_str()).unwrap_or_default(),
            updating,
            "student saved"
        );

        Ok(self.read_after_write(saved).await?)
    }

    async fn read_after_write(&self, saved: Student) -> Result<Student, RepositoryError> {
        let Some(id) = saved.id.clone() else {
            return Ok(saved);
        };

        for attempt in 1..=self.retry.attempts.max(1) {
            if let Some(observed) = self.store.fetch_student_by_id(&id)? {
                if observed == saved {
                    return Ok(observed);
                }
            }
            if attempt < self.retry.attempts {
                tracing::debug!(student_id = %id, attempt, "write not visible yet, retrying");
                tokio::time::sleep(self.retry.delay).await;
            }
        }

        tracing::warn!(
            student_id = %id,
            attempts = self.retry.attempts,
            "saved student not observed on re-read"
        );
        Ok(saved)
    }

    /// Record a new incident. Positive incidents are auto-resolved and never
    /// escalated.
    pub fn report_incident(
        &self,
        draft: IncidentDraft,
        now: NaiveDateTime,
    ) -> Result<Incident, ServiceError> {
        if draft.student.is_empty() {
            return Err(ValidationError::Required { field: "student" }.into());
        }
        require("teacher", &draft.teacher)?;
        validate_description(&draft.description, self.validation.min_description_len)?;
        parse_past_date("date", &draft.date, now.date())?;

        let student = self.resolve_student(&draft.student)?;
        let positive = draft.category.is_positive();

        let incident = Incident {
            id: IncidentId(Uuid::new_v4().to_string()),
            student: student.reference(),
            category: draft.category,
            severity: if positive {
                None
            } else {
                Some(draft.severity.unwrap_or(Severity::Mild))
            },
            description: draft.description.trim().to_string(),
            date: draft.date.trim().to_string(),
            timestamp: Some(now),
            teacher: draft.teacher.trim().to_string(),
            escalation: if positive { None } else { draft.escalation },
            resolved: positive,
            status: if positive {
                IncidentStatus::Normal
            } else {
                IncidentStatus::Pending
            },
        };

        let stored = self.store.insert_incident(incident)?;
        tracing::info!(
            incident_id = %stored.id,
            category = stored.category.label(),
            escalated = stored.escalation.is_some(),
            "incident recorded"
        );
        Ok(stored)
    }

    pub fn list_incidents(&self, filter: Option<&DateRange>) -> Result<Vec<Incident>, ServiceError> {
        Ok(self.store.fetch_incidents(filter)?)
    }

    pub fn mark_resolved(&self, id: &IncidentId) -> Result<Incident, ServiceError> {
        let incident = self.store.mark_incident_resolved(id)?;
        tracing::info!(incident_id = %id, "incident resolved");
        Ok(incident)
    }

    pub fn mark_seen(&self, id: &IncidentId, role: ViewerRole) -> Result<(), ServiceError> {
        Ok(self.store.mark_incident_seen(id, role)?)
    }

    pub fn mark_many_seen(
        &self,
        ids: &[IncidentId],
        role: ViewerRole,
    ) -> Result<usize, ServiceError> {
        Ok(self.store.mark_incidents_seen(ids, role)?)
    }

    /// Notification feed for `role`: incidents it has not marked seen, newest first.
    pub fn unseen_for(&self, role: ViewerRole) -> Result<Vec<Incident>, ServiceError> {
        let seen = self.store.seen_by(role)?;
        let mut unseen: Vec<Incident> = self
            .store
            .fetch_incidents(None)?
            .into_iter()
            .filter(|incident| !seen.contains(&incident.id))
            .collect();
        unseen.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(unseen)
    }

    /// Unresolved incidents escalated to `target`, oldest first.
    pub fn escalation_queue(&self, target: EscalationTarget) -> Result<Vec<Incident>, ServiceError> {
        let mut queue: Vec<Incident> = self
            .store
            .fetch_incidents(None)?
            .into_iter()
            .filter(|incident| !incident.resolved && incident.escalation == Some(target))
            .collect();
        queue.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(queue)
    }

    pub fn list_classes(&self) -> Result<Vec<ClassAssignment>, ServiceError> {
        Ok(self.store.fetch_classes()?)
    }

    pub fn register_class(&self, class: ClassAssignment) -> Result<ClassAssignment, ServiceError> {
        require("class name", &class.name)?;
        require("grade", &class.grade)?;
        require("section", &class.section)?;
        require("teacher", &class.teacher)?;
        Ok(self.store.insert_class(class)?)
    }

    pub fn record_attendance(
        &self,
        record: AttendanceRecord,
        today: NaiveDate,
    ) -> Result<AttendanceRecord, ServiceError> {
        require("class name", &record.class_name)?;
        require("period", &record.period)?;
        ensure_not_future("attendance date", record.date, today)?;
        let stored = self.store.insert_attendance(record)?;
        tracing::debug!(
            class = %stored.class_name,
            date = %stored.date,
            marks = stored.marks.len(),
            "attendance recorded"
        );
        Ok(stored)
    }

    pub fn list_attendance(
        &self,
        filter: Option<&DateRange>,
    ) -> Result<Vec<AttendanceRecord>, ServiceError> {
        Ok(self.store.fetch_attendance(filter)?)
    }

    pub fn attendance_summary(
        &self,
        filter: Option<&DateRange>,
    ) -> Result<Vec<AttendanceTally>, ServiceError> {
        let records = self.store.fetch_attendance(filter)?;
        Ok(attendance_tally(&records, filter))
    }

    pub fn student_profile(
        &self,
        reference: &StudentRef,
        filter: Option<&DateRange>,
    ) -> Result<StudentProfile, ServiceError> {
        let students = self.store.fetch_students()?;
        let incidents = self.store.fetch_incidents(None)?;
        Ok(self
            .scoring
            .profile(reference, &incidents, &students, filter)?)
    }
}

/// Error raised by the incident service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
