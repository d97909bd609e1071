use super::parser::RosterRecord;
use crate::workflows::incidents::{Student, StudentId, StudentRef};

impl RosterRecord {
    pub(crate) fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Reference the row is reconciled through: its id when given, its name
    /// as the fallback.
    pub(crate) fn reference(&self) -> StudentRef {
        let name = self.display_name();
        StudentRef {
            id: self.id.clone().map(StudentId),
            name: (!name.is_empty()).then_some(name),
        }
    }

    /// Overlay the row onto `base`. Blank optional columns leave the stored
    /// values alone.
    pub(crate) fn apply_to(&self, mut base: Student) -> Student {
        if base.id.is_none() {
            base.id = self.id.clone().map(StudentId);
        }
        base.first_name = self.first_name.clone();
        base.last_name = self.last_name.clone();
        overlay(&mut base.grade, &self.grade);
        overlay(&mut base.section, &self.section);
        overlay_optional(&mut base.contact.email, &self.email);
        overlay_optional(&mut base.contact.phone, &self.phone);
        overlay_optional(&mut base.guardian.name, &self.guardian_name);
        overlay_optional(&mut base.guardian.phone, &self.guardian_phone);
        base
    }
}

fn overlay(target: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

fn overlay_optional(target: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        *target = value.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RosterRecord {
        RosterRecord {
            id: None,
            first_name: "Ana".to_string(),
            last_name: "Torres".to_string(),
            grade: None,
            section: Some("B".to_string()),
            email: None,
            phone: Some("912345678".to_string()),
            guardian_name: None,
            guardian_phone: None,
        }
    }

    #[test]
    fn blank_columns_keep_stored_values() {
        let mut stored = Student {
            id: Some(StudentId("s-1".to_string())),
            first_name: "Ana".to_string(),
            last_name: "Torres".to_string(),
            grade: "3".to_string(),
            section: "A".to_string(),
            ..Student::default()
        };
        stored.contact.email = Some("ana@school.pe".to_string());

        let merged = record().apply_to(stored);
        assert_eq!(merged.id, Some(StudentId("s-1".to_string())));
        assert_eq!(merged.grade, "3");
        assert_eq!(merged.section, "B");
        assert_eq!(merged.contact.email.as_deref(), Some("ana@school.pe"));
        assert_eq!(merged.contact.phone.as_deref(), Some("912345678"));
    }

    #[test]
    fn reference_prefers_id_and_keeps_name() {
        let mut row = record();
        row.id = Some("7d3f0c1e-2a4b-4c5d-8e9f-0a1b2c3d4e5f".to_string());
        let reference = row.reference();
        assert_eq!(reference.key(), "7d3f0c1e-2a4b-4c5d-8e9f-0a1b2c3d4e5f");
        assert_eq!(reference.name.as_deref(), Some("Ana Torres"));
    }
}
