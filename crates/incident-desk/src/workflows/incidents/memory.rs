use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::aggregate::DateRange;
use super::domain::{
    AttendanceRecord, ClassAssignment, Incident, IncidentId, IncidentStatus, Student, StudentId,
    StudentRef, ViewerRole,
};
use super::identity::resolve_position;
use super::repository::{IncidentStore, RepositoryError};

#[derive(Debug, Default)]
struct Tables {
    students: Vec<Student>,
    incidents: Vec<Incident>,
    seen: BTreeMap<ViewerRole, BTreeSet<IncidentId>>,
    classes: Vec<ClassAssignment>,
    attendance: Vec<AttendanceRecord>,
}

/// Process-local store used by the API service, the CLI, and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIncidentStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed students verbatim, legacy id-less rows included.
    pub fn with_students(students: impl IntoIterator<Item = Student>) -> Self {
        let store = Self::default();
        store.lock().students.extend(students);
        store
    }

    pub fn with_incidents(self, incidents: impl IntoIterator<Item = Incident>) -> Self {
        self.lock().incidents.extend(incidents);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("incident store mutex poisoned")
    }
}

fn new_student_id() -> StudentId {
    StudentId(Uuid::new_v4().to_string())
}

impl IncidentStore for InMemoryIncidentStore {
    fn fetch_incidents(&self, filter: Option<&DateRange>) -> Result<Vec<Incident>, RepositoryError> {
        let guard = self.lock();
        Ok(guard
            .incidents
            .iter()
            .filter(|incident| match filter {
                Some(range) => incident
                    .calendar_date()
                    .is_some_and(|date| range.contains(date)),
                None => true,
            })
            .cloned()
            .collect())
    }

    fn fetch_students(&self) -> Result<Vec<Student>, RepositoryError> {
        Ok(self.lock().students.clone())
    }

    fn fetch_student_by_id(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        let guard = self.lock();
        Ok(guard
            .students
            .iter()
            .find(|student| student.id.as_ref().is_some_and(|own| own.0 == id.0.trim()))
            .cloned())
    }

    fn fetch_student_by_name(&self, name: &str) -> Result<Option<Student>, RepositoryError> {
        let guard = self.lock();
        let name = name.trim();
        Ok(guard
            .students
            .iter()
            .find(|student| student.display_name() == name)
            .cloned())
    }

    fn save_student(
        &self,
        mut student: Student,
        existing: Option<&StudentRef>,
    ) -> Result<Student, RepositoryError> {
        let mut guard = self.lock();

        let position = existing.and_then(|reference| resolve_position(reference, &guard.students).ok());
        if let Some(index) = position {
            let stored = &mut guard.students[index];
            student.id = stored
                .id
                .clone()
                .or(student.id.take())
                .or_else(|| Some(new_student_id()));
            *stored = student.clone();
            return Ok(student);
        }

        if let Some(id) = &student.id {
            if guard.students.iter().any(|stored| stored.id.as_ref() == Some(id)) {
                return Err(RepositoryError::Conflict(format!("student {id}")));
            }
        } else {
            student.id = Some(new_student_id());
        }

        guard.students.push(student.clone());
        Ok(student)
    }

    fn insert_incident(&self, incident: Incident) -> Result<Incident, RepositoryError> {
        let mut guard = self.lock();
        if guard.incidents.iter().any(|stored| stored.id == incident.id) {
            return Err(RepositoryError::Conflict(format!("incident {}", incident.id)));
        }
        guard.incidents.push(incident.clone());
        Ok(incident)
    }

    fn mark_incident_resolved(&self, id: &IncidentId) -> Result<Incident, RepositoryError> {
        let mut guard = self.lock();
        let incident = guard
            .incidents
            .iter_mut()
            .find(|incident| &incident.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("incident {id}")))?;
        incident.resolved = true;
        incident.status = IncidentStatus::Resolved;
        Ok(incident.clone())
    }

    fn mark_incident_seen(&self, id: &IncidentId, role: ViewerRole) -> Result<(), RepositoryError> {
        let mut guard = self.lock();
        if !guard.incidents.iter().any(|incident| &incident.id == id) {
            return Err(RepositoryError::NotFound(format!("incident {id}")));
        }
        guard.seen.entry(role).or_default().insert(id.clone());
        Ok(())
    }

    fn mark_incidents_seen(
        &self,
        ids: &[IncidentId],
        role: ViewerRole,
    ) -> Result<usize, RepositoryError> {
        let mut guard = self.lock();
        let known: Vec<IncidentId> = ids
            .iter()
            .filter(|id| guard.incidents.iter().any(|incident| &incident.id == *id))
            .cloned()
            .collect();
        let seen = guard.seen.entry(role).or_default();
        Ok(known.into_iter().filter(|id| seen.insert(id.clone())).count())
    }

    fn seen_by(&self, role: ViewerRole) -> Result<BTreeSet<IncidentId>, RepositoryError> {
        Ok(self.lock().seen.get(&role).cloned().unwrap_or_default())
    }

    fn fetch_classes(&self) -> Result<Vec<ClassAssignment>, RepositoryError> {
        Ok(self.lock().classes.clone())
    }

    fn insert_class(&self, class: ClassAssignment) -> Result<ClassAssignment, RepositoryError> {
        let mut guard = self.lock();
        let key = class.key();
        if guard.classes.iter().any(|stored| stored.key() == key) {
            return Err(RepositoryError::Conflict(format!(
                "class {} {}{}",
                key.0, key.1, key.2
            )));
        }
        guard.classes.push(class.clone());
        Ok(class)
    }

    fn fetch_attendance(
        &self,
        filter: Option<&DateRange>,
    ) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        let guard = self.lock();
        Ok(guard
            .attendance
            .iter()
            .filter(|record| filter.map_or(true, |range| range.contains(record.date)))
            .cloned()
            .collect())
    }

    fn insert_attendance(
        &self,
        record: AttendanceRecord,
    ) -> Result<AttendanceRecord, RepositoryError> {
        let mut guard = self.lock();
        let key = record.key();
        if guard.attendance.iter().any(|stored| stored.key() == key) {
            return Err(RepositoryError::Conflict(format!(
                "attendance for {} on {} period {}",
                key.1, key.0, key.2
            )));
        }
        guard.attendance.push(record.clone());
        Ok(record)
    }
}
