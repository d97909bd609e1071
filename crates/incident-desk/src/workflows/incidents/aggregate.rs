use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    AttendanceRecord, AttendanceState, Incident, IncidentCategory, Severity, Student, StudentRef,
};
use super::identity::resolve_student;

/// Inclusive calendar window. Time of day never takes part in the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        if from <= to {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Optional `from`/`to` bounds as they arrive on a query string. A missing
/// bound leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl RangeQuery {
    pub fn range(&self) -> Option<DateRange> {
        match (self.from, self.to) {
            (None, None) => None,
            (from, to) => Some(DateRange::new(
                from.unwrap_or(NaiveDate::MIN),
                to.unwrap_or(NaiveDate::MAX),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub attendance: usize,
    pub behavior: usize,
    pub academic: usize,
    pub positive: usize,
}

impl CategoryCounts {
    fn bump(&mut self, category: IncidentCategory) {
        match category {
            IncidentCategory::Attendance => self.attendance += 1,
            IncidentCategory::Behavior => self.behavior += 1,
            IncidentCategory::Academic => self.academic += 1,
            IncidentCategory::Positive => self.positive += 1,
        }
    }

    pub fn get(&self, category: IncidentCategory) -> usize {
        match category {
            IncidentCategory::Attendance => self.attendance,
            IncidentCategory::Behavior => self.behavior,
            IncidentCategory::Academic => self.academic,
            IncidentCategory::Positive => self.positive,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub mild: usize,
    pub moderate: usize,
    pub severe: usize,
}

impl SeverityCounts {
    pub(crate) fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Mild => self.mild += 1,
            Severity::Moderate => self.moderate += 1,
            Severity::Severe => self.severe += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Incidents in scope: every input when unfiltered, in-window ones otherwise.
    pub total: usize,
    /// Length of the input regardless of the filter.
    pub overall_total: usize,
    /// Incidents left out of a filtered aggregate because their date does not parse.
    pub undated: usize,
    pub counts_by_category: CategoryCounts,
    /// Non-positive incidents only.
    pub counts_by_severity: SeverityCounts,
    pub unique_student_count: usize,
}

/// Split `incidents` into those inside `filter` and a count of undated ones.
pub fn in_window<'a>(
    incidents: &'a [Incident],
    filter: Option<&DateRange>,
) -> (Vec<&'a Incident>, usize) {
    let Some(range) = filter else {
        return (incidents.iter().collect(), 0);
    };

    let mut undated = 0;
    let selected = incidents
        .iter()
        .filter(|incident| match incident.calendar_date() {
            Some(date) => range.contains(date),
            None => {
                undated += 1;
                false
            }
        })
        .collect();
    (selected, undated)
}

/// Key of the roster record `reference` resolves to, or its own key when it
/// resolves to nothing.
pub(crate) fn canonical_key(reference: &StudentRef, roster: &[Student]) -> String {
    resolve_student(reference, roster)
        .map(|student| student.key())
        .unwrap_or_else(|_| reference.key())
}

fn tally<'a>(incidents: impl IntoIterator<Item = &'a Incident>, roster: &[Student]) -> Stats {
    let mut stats = Stats::default();
    let mut students = BTreeSet::new();

    for incident in incidents {
        stats.total += 1;
        stats.counts_by_category.bump(incident.category);
        if let Some(severity) = incident.effective_severity() {
            stats.counts_by_severity.bump(severity);
        }
        students.insert(canonical_key(&incident.student, roster));
    }

    stats.unique_student_count = students.len();
    stats
}

/// Dataset-wide statistics. Students are counted once per roster record, so
/// an id reference and a name reference to the same student count as one.
pub fn aggregate(
    incidents: &[Incident],
    roster: &[Student],
    filter: Option<&DateRange>,
) -> Stats {
    let (selected, undated) = in_window(incidents, filter);
    let mut stats = tally(selected, roster);
    stats.overall_total = incidents.len();
    stats.undated = undated;
    stats
}

/// Incidents attributed to one canonical student.
#[derive(Debug, Clone)]
pub(crate) struct StudentGroup<'a> {
    pub(crate) label: String,
    pub(crate) student: Option<&'a Student>,
    pub(crate) incidents: Vec<&'a Incident>,
}

/// Group incidents by the roster record they resolve to; unresolved
/// references keep their own key so nothing is dropped.
pub(crate) fn group_by_student<'a>(
    incidents: impl IntoIterator<Item = &'a Incident>,
    roster: &'a [Student],
) -> BTreeMap<String, StudentGroup<'a>> {
    let mut groups: BTreeMap<String, StudentGroup<'a>> = BTreeMap::new();

    for incident in incidents {
        let student = resolve_student(&incident.student, roster).ok();
        let (key, label) = match student {
            Some(student) => (student.key(), student.display_name()),
            None => (incident.student.key(), incident.student.label()),
        };
        groups
            .entry(key)
            .or_insert_with(|| StudentGroup {
                label,
                student,
                incidents: Vec::new(),
            })
            .incidents
            .push(incident);
    }

    groups
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentStats {
    pub student_key: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub stats: Stats,
}

pub fn student_breakdown(
    incidents: &[Incident],
    roster: &[Student],
    filter: Option<&DateRange>,
) -> Vec<StudentStats> {
    let (selected, _) = in_window(incidents, filter);
    let mut rows: Vec<StudentStats> = group_by_student(selected, roster)
        .into_iter()
        .map(|(student_key, group)| {
            let mut stats = tally(group.incidents.iter().copied(), roster);
            stats.overall_total = stats.total;
            StudentStats {
                student_key,
                label: group.label,
                grade: group.student.map(|student| student.grade.clone()),
                section: group.student.map(|student| student.section.clone()),
                stats,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.label.cmp(&b.label).then(a.student_key.cmp(&b.student_key)));
    rows
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassStats {
    pub grade: String,
    pub section: String,
    pub student_count: usize,
    pub stats: Stats,
}

/// Per grade/section statistics. Incidents whose student is not on the
/// roster land under an empty grade and section.
pub fn class_breakdown(
    incidents: &[Incident],
    roster: &[Student],
    filter: Option<&DateRange>,
) -> Vec<ClassStats> {
    let (selected, _) = in_window(incidents, filter);
    let mut classes: BTreeMap<(String, String), (BTreeSet<String>, Vec<&Incident>)> =
        BTreeMap::new();

    for (key, group) in group_by_student(selected, roster) {
        let class_key = match group.student {
            Some(student) => (
                student.grade.trim().to_string(),
                student.section.trim().to_string(),
            ),
            None => (String::new(), String::new()),
        };
        let entry = classes.entry(class_key).or_default();
        entry.0.insert(key);
        entry.1.extend(group.incidents);
    }

    classes
        .into_iter()
        .map(|((grade, section), (students, incidents))| {
            let mut stats = tally(incidents, roster);
            stats.overall_total = stats.total;
            ClassStats {
                grade,
                section,
                student_count: students.len(),
                stats,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceTally {
    pub student_key: String,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
}

pub fn attendance_tally(
    records: &[AttendanceRecord],
    filter: Option<&DateRange>,
) -> Vec<AttendanceTally> {
    let mut tallies: BTreeMap<&str, AttendanceTally> = BTreeMap::new();

    for record in records
        .iter()
        .filter(|record| filter.map_or(true, |range| range.contains(record.date)))
    {
        for (student_key, state) in &record.marks {
            let tally = tallies
                .entry(student_key.as_str())
                .or_insert_with(|| AttendanceTally {
                    student_key: student_key.clone(),
                    ..AttendanceTally::default()
                });
            match state {
                AttendanceState::Present => tally.present += 1,
                AttendanceState::Late => tally.late += 1,
                AttendanceState::Absent => tally.absent += 1,
            }
        }
    }

    tallies.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::incidents::domain::{IncidentId, IncidentStatus, StudentId, StudentRef};
    use chrono::Weekday;

    fn incident(
        name: &str,
        category: IncidentCategory,
        severity: Option<Severity>,
        date: &str,
    ) -> Incident {
        Incident {
            id: IncidentId(format!("{name}-{date}")),
            student: StudentRef::by_name(name),
            category,
            severity,
            description: "Observación registrada en clase".to_string(),
            date: date.to_string(),
            timestamp: None,
            teacher: "Prof. Ruiz".to_string(),
            escalation: None,
            resolved: category.is_positive(),
            status: IncidentStatus::Pending,
        }
    }

    fn march(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).expect("valid date")
    }

    #[test]
    fn empty_input_yields_zeroed_stats() {
        let stats = aggregate(&[], &[], None);
        assert_eq!(stats, Stats::default());
        assert_eq!(stats.counts_by_category, CategoryCounts::default());
        assert_eq!(stats.unique_student_count, 0);
    }

    #[test]
    fn severity_counts_skip_positive_incidents() {
        let incidents = vec![
            incident("Ana Torres", IncidentCategory::Behavior, Some(Severity::Moderate), "2025-03-03"),
            incident("Ana Torres", IncidentCategory::Behavior, Some(Severity::Severe), "2025-03-04"),
            incident("Ana Torres", IncidentCategory::Behavior, Some(Severity::Severe), "2025-03-05"),
            incident("Luis Paredes", IncidentCategory::Positive, Some(Severity::Severe), "2025-03-05"),
        ];
        let stats = aggregate(&incidents, &[], None);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.counts_by_category.behavior, 3);
        assert_eq!(stats.counts_by_category.positive, 1);
        assert_eq!(
            stats.counts_by_severity,
            SeverityCounts {
                mild: 0,
                moderate: 1,
                severe: 2
            }
        );
        assert_eq!(stats.unique_student_count, 2);
    }

    #[test]
    fn range_is_inclusive_and_ignores_time_of_day() {
        let incidents = vec![
            incident("Ana Torres", IncidentCategory::Attendance, None, "2025-03-01T07:45:00Z"),
            incident("Ana Torres", IncidentCategory::Attendance, None, "2025-03-10T23:59:00Z"),
            incident("Ana Torres", IncidentCategory::Attendance, None, "2025-03-11"),
        ];
        let range = DateRange::new(march(1), march(10));
        let stats = aggregate(&incidents, &[], Some(&range));
        assert_eq!(stats.total, 2);
        assert_eq!(stats.overall_total, 3);
        assert_eq!(stats.undated, 0);
    }

    #[test]
    fn unparseable_dates_are_reported_not_dropped() {
        let incidents = vec![
            incident("Ana Torres", IncidentCategory::Academic, None, "2025-03-02"),
            incident("Ana Torres", IncidentCategory::Academic, None, "sometime"),
        ];
        let unfiltered = aggregate(&incidents, &[], None);
        assert_eq!(unfiltered.total, 2);

        let range = DateRange::new(march(1), march(31));
        let filtered = aggregate(&incidents, &[], Some(&range));
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.undated, 1);
        assert_eq!(filtered.overall_total, 2);
    }

    #[test]
    fn open_ended_query_bounds() {
        let query = RangeQuery {
            from: Some(march(5)),
            to: None,
        };
        let range = query.range().expect("bounded");
        assert!(range.contains(march(31)));
        assert!(!range.contains(march(4)));
        assert!(RangeQuery::default().range().is_none());
    }

    #[test]
    fn reversed_range_is_normalized() {
        let range = DateRange::new(march(10), march(1));
        assert_eq!(range.from, march(1));
        assert!(range.contains(march(5)));
    }

    #[test]
    fn breakdowns_group_by_resolved_student() {
        let roster = vec![
            Student {
                id: Some(StudentId("s-1".to_string())),
                first_name: "Ana".to_string(),
                last_name: "Torres".to_string(),
                grade: "3".to_string(),
                section: "A".to_string(),
                ..Student::default()
            },
            Student {
                id: Some(StudentId("s-2".to_string())),
                first_name: "Luis".to_string(),
                last_name: "Paredes".to_string(),
                grade: "3".to_string(),
                section: "B".to_string(),
                ..Student::default()
            },
        ];
        let mut by_id = incident("ignored", IncidentCategory::Behavior, None, "2025-03-03");
        by_id.student = StudentRef::by_id("s-1");
        let incidents = vec![
            by_id,
            incident("Ana Torres", IncidentCategory::Positive, None, "2025-03-04"),
            incident("Luis Paredes", IncidentCategory::Academic, None, "2025-03-04"),
            incident("Nadie Conocido", IncidentCategory::Academic, None, "2025-03-04"),
        ];

        let students = student_breakdown(&incidents, &roster, None);
        assert_eq!(students.len(), 3);
        let ana = students
            .iter()
            .find(|row| row.student_key == "s-1")
            .expect("ana grouped");
        assert_eq!(ana.stats.total, 2);
        assert_eq!(ana.grade.as_deref(), Some("3"));

        let classes = class_breakdown(&incidents, &roster, None);
        let section_a = classes
            .iter()
            .find(|row| row.grade == "3" && row.section == "A")
            .expect("section a");
        assert_eq!(section_a.student_count, 1);
        assert_eq!(section_a.stats.total, 2);
        assert!(classes.iter().any(|row| row.grade.is_empty()));
    }

    #[test]
    fn unique_students_are_counted_per_roster_record() {
        let roster = vec![Student {
            id: Some(StudentId("s-1".to_string())),
            first_name: "Ana".to_string(),
            last_name: "Torres".to_string(),
            ..Student::default()
        }];
        let mut by_id = incident("ignored", IncidentCategory::Behavior, None, "2025-03-03");
        by_id.student = StudentRef::by_id("s-1");
        let incidents = vec![
            by_id,
            incident("Ana Torres", IncidentCategory::Positive, None, "2025-03-04"),
            incident("Nadie Conocido", IncidentCategory::Academic, None, "2025-03-04"),
        ];

        let stats = aggregate(&incidents, &roster, None);
        let rows = student_breakdown(&incidents, &roster, None);

        assert_eq!(stats.unique_student_count, 2);
        assert_eq!(stats.unique_student_count, rows.len());
    }

    #[test]
    fn attendance_tally_counts_states_in_range() {
        let mut marks = BTreeMap::new();
        marks.insert("s-1".to_string(), AttendanceState::Late);
        marks.insert("s-2".to_string(), AttendanceState::Absent);
        let record = AttendanceRecord {
            date: march(3),
            weekday: Weekday::Mon,
            class_name: "Matemática".to_string(),
            grade: "3".to_string(),
            section: "A".to_string(),
            teacher: "Prof. Ruiz".to_string(),
            period: "1".to_string(),
            location: None,
            marks,
        };
        let mut later = record.clone();
        later.date = march(20);

        let tallies = attendance_tally(&[record, later], Some(&DateRange::new(march(1), march(10))));
        assert_eq!(tallies.len(), 2);
        assert_eq!(tallies[0].late, 1);
        assert_eq!(tallies[1].absent, 1);
    }
}
