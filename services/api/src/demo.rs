use crate::infra::{build_orchestrator, build_service, parse_date, read_json};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use incident_desk::config::AppConfig;
use incident_desk::error::AppError;
use incident_desk::workflows::incidents::{
    EscalationTarget, Incident, IncidentCategory, IncidentDraft, InMemoryIncidentStore,
    RangeQuery, Severity, Student, StudentRef, ViewerRole,
};
use incident_desk::workflows::report::DashboardReport;
use incident_desk::workflows::roster::{ImportSummary, RosterImporter};
use incident_desk::workflows::summaries::SummaryDigest;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// JSON array of students
    #[arg(long)]
    pub(crate) students: PathBuf,
    /// JSON array of incidents
    #[arg(long)]
    pub(crate) incidents: PathBuf,
    /// First day of the window (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) from: Option<NaiveDate>,
    /// Last day of the window (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) to: Option<NaiveDate>,
    /// Request the AI narrative after aggregating
    #[arg(long)]
    pub(crate) summarize: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ImportRosterArgs {
    /// Roster CSV export
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Existing students (JSON array) to reconcile against
    #[arg(long)]
    pub(crate) students: Option<PathBuf>,
    /// Write the reconciled roster as JSON
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Reference date for birth-date validation (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Days of history covered by the report window
    #[arg(long, default_value_t = 30)]
    pub(crate) days: i64,
    /// Request the AI narrative (requires APP_AI_ENDPOINT)
    #[arg(long)]
    pub(crate) summarize: bool,
}

pub(crate) async fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs {
        students,
        incidents,
        from,
        to,
        summarize,
    } = args;

    let config = AppConfig::load()?;
    let students: Vec<Student> = read_json(&students)?;
    let incidents: Vec<Incident> = read_json(&incidents)?;
    let store =
        Arc::new(InMemoryIncidentStore::with_students(students).with_incidents(incidents));

    let orchestrator = build_orchestrator(&config, store)?;
    let report = orchestrator.refresh(RangeQuery { from, to }.range())?;
    orchestrator.cancel_pending();
    render_report(&report);

    if summarize {
        let digest = orchestrator.summarize_now().await?;
        render_digest(&digest);
    }
    Ok(())
}

pub(crate) async fn run_import_roster(args: ImportRosterArgs) -> Result<(), AppError> {
    let ImportRosterArgs {
        csv,
        students,
        output,
        today,
    } = args;

    let config = AppConfig::load()?;
    let existing: Vec<Student> = match students {
        Some(path) => read_json(&path)?,
        None => Vec::new(),
    };
    let store = Arc::new(InMemoryIncidentStore::with_students(existing));
    let service = build_service(&config, store);
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let summary = RosterImporter::new(&service, today)
        .import_path(&csv)
        .await?;
    render_import(&summary);

    if let Some(path) = output {
        let roster = service.list_students()?;
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, &roster).map_err(std::io::Error::from)?;
        println!("Reconciled roster written to {}", path.display());
    }
    Ok(())
}

const DEMO_ROSTER: &str = "id,first_name,last_name,grade,section,email,phone,guardian_name,guardian_phone
3f6b1a2c-8d4e-4f5a-9b6c-7d8e9f0a1b2c,Ana,Torres,3,A,ana.torres@colegio.pe,,Rosa Torres,987654321
,Luis,Paredes,3,B,,,Jorge Paredes,912345678
,Sofía,Quispe,3,A,,,,
,Mateo,Huamán,4,A,,,Elena Huamán,923456789
";

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { days, summarize } = args;
    let config = AppConfig::load()?;
    let now = Local::now().naive_local();
    let today = now.date();

    println!("Incident desk demo");
    let store = Arc::new(InMemoryIncidentStore::default());
    let service = build_service(&config, store.clone());
    let summary = RosterImporter::new(&service, today)
        .import_reader(Cursor::new(DEMO_ROSTER))
        .await?;
    render_import(&summary);

    let day = |offset: i64| (today - Duration::days(offset)).format("%Y-%m-%d").to_string();
    let drafts = vec![
        demo_draft(
            "Ana Torres",
            IncidentCategory::Positive,
            None,
            day(1),
            "Ayudó a organizar la feria de ciencias",
        ),
        demo_draft(
            "Ana Torres",
            IncidentCategory::Positive,
            None,
            day(6),
            "Lideró el trabajo en equipo de matemática",
        ),
        IncidentDraft {
            escalation: Some(EscalationTarget::Psychology),
            ..demo_draft(
                "Luis Paredes",
                IncidentCategory::Behavior,
                Some(Severity::Severe),
                day(2),
                "Pelea durante el recreo",
            )
        },
        demo_draft(
            "Luis Paredes",
            IncidentCategory::Behavior,
            Some(Severity::Severe),
            day(4),
            "Insultó a un compañero en clase",
        ),
        IncidentDraft {
            escalation: Some(EscalationTarget::Director),
            ..demo_draft(
                "Luis Paredes",
                IncidentCategory::Attendance,
                Some(Severity::Severe),
                day(8),
                "Tres faltas sin justificar esta semana",
            )
        },
        demo_draft(
            "Sofía Quispe",
            IncidentCategory::Academic,
            Some(Severity::Moderate),
            day(3),
            "No entregó el proyecto de comunicación",
        ),
        demo_draft(
            "Mateo Huamán",
            IncidentCategory::Attendance,
            None,
            day(5),
            "Llegó tarde al primer bloque",
        ),
    ];
    for draft in drafts {
        service.report_incident(draft, now)?;
    }

    let unseen = service.unseen_for(ViewerRole::Director)?;
    let escalated = service.escalation_queue(EscalationTarget::Director)?;
    println!(
        "\nNotifications: {} unseen for the director | {} escalated to the director",
        unseen.len(),
        escalated.len()
    );

    let orchestrator = build_orchestrator(&config, store)?;
    let range = RangeQuery {
        from: Some(today - Duration::days(days.max(0))),
        to: Some(today),
    };
    let report = orchestrator.refresh(range.range())?;
    orchestrator.cancel_pending();
    render_report(&report);

    if summarize {
        let digest = orchestrator.summarize_now().await?;
        render_digest(&digest);
    }
    Ok(())
}

fn demo_draft(
    name: &str,
    category: IncidentCategory,
    severity: Option<Severity>,
    date: String,
    description: &str,
) -> IncidentDraft {
    IncidentDraft {
        student: StudentRef::by_name(name),
        category,
        severity,
        description: description.to_string(),
        date,
        teacher: "Prof. Carmen Ruiz".to_string(),
        escalation: None,
    }
}

fn render_import(summary: &ImportSummary) {
    println!(
        "Roster import: {} inserted | {} updated | {} rejected",
        summary.inserted,
        summary.updated,
        summary.rejected.len()
    );
    for row in &summary.rejected {
        println!("  - line {}: {}", row.line, row.message);
    }
}

fn render_report(report: &DashboardReport) {
    let stats = &report.stats;
    println!("\nDashboard report: {}", report.scope_label());
    println!(
        "- {} incidents in scope ({} overall, {} undated) across {} students",
        stats.total, stats.overall_total, stats.undated, stats.unique_student_count
    );
    println!(
        "- By category: attendance {} | behavior {} | academic {} | positive {}",
        stats.counts_by_category.attendance,
        stats.counts_by_category.behavior,
        stats.counts_by_category.academic,
        stats.counts_by_category.positive
    );
    println!(
        "- By severity: mild {} | moderate {} | severe {}",
        stats.counts_by_severity.mild,
        stats.counts_by_severity.moderate,
        stats.counts_by_severity.severe
    );

    println!("Standouts:");
    if report.rankings.standouts.is_empty() {
        println!("  (none)");
    }
    for (position, student) in report.rankings.standouts.iter().enumerate() {
        println!(
            "  {}. {} {} | {:+} points, {} positive",
            position + 1,
            student.label,
            class_label(student.grade.as_deref(), student.section.as_deref()),
            student.card.points,
            student.card.positives
        );
    }

    println!("At risk:");
    if report.rankings.at_risk.is_empty() {
        println!("  (none)");
    }
    for student in &report.rankings.at_risk {
        println!(
            "  - {} {} | {} severe",
            student.label,
            class_label(student.grade.as_deref(), student.section.as_deref()),
            student.card.by_severity.severe
        );
    }

    println!("Classes:");
    for class in &report.classes {
        let label = if class.grade.is_empty() && class.section.is_empty() {
            "unassigned".to_string()
        } else {
            format!("{}{}", class.grade, class.section)
        };
        println!(
            "  - {}: {} incidents across {} students",
            label, class.stats.total, class.student_count
        );
    }
}

fn class_label(grade: Option<&str>, section: Option<&str>) -> String {
    match (grade, section) {
        (Some(grade), Some(section)) => format!("({grade}{section})"),
        _ => String::new(),
    }
}

fn render_digest(digest: &SummaryDigest) {
    println!("\nAI narrative ({:?})", digest.source);
    for item in &digest.summary {
        println!("  - {item}");
    }
    if !digest.recommendations.is_empty() {
        println!("Recommendations:");
        for item in &digest.recommendations {
            println!("  - {item}");
        }
    }
    if let Some(notice) = &digest.notice {
        println!("Note: {notice}");
    }
}
