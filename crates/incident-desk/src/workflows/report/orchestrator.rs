//! Report state machine: fetch, aggregate, score, then a debounced request
//! for the AI narrative.
//!
//! State is published through a `watch` channel owned by the orchestrator.
//! At most one summary request is in flight; triggers that arrive while it
//! runs are ignored rather than queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::views::{DashboardReport, ReportPhase, ReportView};
use crate::config::ReportConfig;
use crate::workflows::incidents::aggregate::{canonical_key, in_window};
use crate::workflows::incidents::{
    aggregate, class_breakdown, resolve_student, student_breakdown, DateRange, IdentityError,
    IncidentId, IncidentStore, RepositoryError, ScoringEngine, StudentRef,
};
use crate::workflows::summaries::{
    ItemHeader, SummaryDigest, SummaryError, SummaryGateway, SummaryRequest,
};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("failed to fetch report data: {0}")]
    Fetch(#[from] RepositoryError),
    #[error("a summary request is already in flight")]
    InFlight,
    #[error("no report has been generated yet")]
    NoReport,
    #[error("incident {0} not found")]
    UnknownIncident(IncidentId),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Outcome of asking for a narrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryTrigger {
    Scheduled,
    IgnoredInFlight,
}

struct Inner<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
    scoring: ScoringEngine,
    config: ReportConfig,
    state: watch::Sender<ReportView>,
    range: Mutex<Option<DateRange>>,
    generation: AtomicU64,
    pending: Mutex<Option<JoinHandle<()>>>,
    in_flight: AtomicBool,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the in-flight flag however the request ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ReportOrchestrator<S, G> {
    inner: Arc<Inner<S, G>>,
}

impl<S, G> Clone for ReportOrchestrator<S, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, G> ReportOrchestrator<S, G>
where
    S: IncidentStore + 'static,
    G: SummaryGateway + 'static,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>, scoring: ScoringEngine, config: ReportConfig) -> Self {
        let (state, _) = watch::channel(ReportView::default());
        Self {
            inner: Arc::new(Inner {
                store,
                gateway,
                scoring,
                config,
                state,
                range: Mutex::new(None),
                generation: AtomicU64::new(0),
                pending: Mutex::new(None),
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ReportView> {
        self.inner.state.subscribe()
    }

    pub fn current(&self) -> ReportView {
        self.inner.state.borrow().clone()
    }

    pub fn range(&self) -> Option<DateRange> {
        *locked(&self.inner.range)
    }

    fn publish(&self, update: impl FnOnce(&mut ReportView)) {
        self.inner.state.send_modify(update);
    }

    /// Re-fetch and re-aggregate for `range`. A narrative is scheduled only
    /// when the window or its incidents changed. Must run inside a Tokio
    /// runtime.
    pub fn refresh(&self, range: Option<DateRange>) -> Result<DashboardReport, OrchestratorError> {
        *locked(&self.inner.range) = range;
        self.publish(|view| view.enter(ReportPhase::Fetching));

        let fetched = self
            .inner
            .store
            .fetch_students()
            .and_then(|students| Ok((students, self.inner.store.fetch_incidents(None)?)));
        let (students, incidents) = match fetched {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(error = %error, "report refresh failed");
                self.publish(|view| view.fail(format!("failed to fetch report data: {error}")));
                return Err(error.into());
            }
        };

        self.publish(|view| view.enter(ReportPhase::Aggregating));
        let filter = range.as_ref();
        let (window, _) = in_window(&incidents, filter);
        let report = DashboardReport {
            range,
            generated_at: Local::now().naive_local(),
            stats: aggregate(&incidents, &students, filter),
            students: student_breakdown(&incidents, &students, filter),
            classes: class_breakdown(&incidents, &students, filter),
            rankings: self.inner.scoring.rank(&incidents, &students, filter),
            incidents: window.into_iter().cloned().collect(),
        };

        let mut changed = true;
        self.publish(|view| {
            changed = view.report.as_ref().map_or(true, |previous| {
                previous.range != report.range || previous.incidents != report.incidents
            });
            view.enter(ReportPhase::Rendering);
            view.report = Some(report.clone());
            view.refreshes += 1;
        });
        self.publish(|view| view.enter(ReportPhase::Idle));

        info!(
            total = report.stats.total,
            undated = report.stats.undated,
            standouts = report.rankings.standouts.len(),
            at_risk = report.rankings.at_risk.len(),
            changed,
            "report refreshed"
        );

        if changed {
            self.schedule_summary();
        }
        Ok(report)
    }

    /// Request a narrative after the debounce quiet period. A later trigger
    /// restarts the timer; a trigger during an in-flight request is ignored.
    ///
    /// The `pending` lock is held while the flag is checked and the previous
    /// timer aborted. A timer only claims the in-flight flag under the same
    /// lock, so a running request is never aborted.
    pub fn schedule_summary(&self) -> SummaryTrigger {
        let mut pending = locked(&self.inner.pending);
        if self.inner.in_flight.load(Ordering::SeqCst) {
            debug!("summary request in flight, trigger ignored");
            return SummaryTrigger::IgnoredInFlight;
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let orchestrator = self.clone();
        let debounce = self.inner.config.debounce;
        let task = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            orchestrator.run_debounced(generation).await;
        });

        if let Some(previous) = pending.replace(task) {
            previous.abort();
        }
        SummaryTrigger::Scheduled
    }

    async fn run_debounced(&self, generation: u64) {
        let report = {
            let _pending = locked(&self.inner.pending);
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if self.inner.in_flight.swap(true, Ordering::SeqCst) {
                debug!("summary request in flight, debounced trigger dropped");
                return;
            }
            self.inner.state.borrow().report.clone()
        };
        let _guard = InFlight(&self.inner.in_flight);

        match report {
            Some(report) => {
                self.request_report_digest(report).await;
            }
            None => debug!("debounced summary skipped, no report yet"),
        }
    }

    /// Clear a pending debounce timer. An in-flight request is left to finish.
    /// Returns whether a timer was cleared.
    pub fn cancel_pending(&self) -> bool {
        let mut pending = locked(&self.inner.pending);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        match pending.take() {
            Some(task) if !self.inner.in_flight.load(Ordering::SeqCst) && !task.is_finished() => {
                task.abort();
                true
            }
            _ => false,
        }
    }

    /// Request the narrative for the current report immediately. A disabled
    /// collaborator renders the placeholder without entering the error phase.
    pub async fn summarize_now(&self) -> Result<SummaryDigest, OrchestratorError> {
        let report = self
            .inner
            .state
            .borrow()
            .report
            .clone()
            .ok_or(OrchestratorError::NoReport)?;

        if self.inner.in_flight.swap(true, Ordering::SeqCst) {
            return Err(OrchestratorError::InFlight);
        }
        let _guard = InFlight(&self.inner.in_flight);

        Ok(self.request_report_digest(report).await)
    }

    async fn request_report_digest(&self, report: DashboardReport) -> SummaryDigest {
        self.publish(|view| view.enter(ReportPhase::RequestingAi));
        let request = SummaryRequest::Incidents {
            student_label: report.scope_label(),
            incidents: report.incidents,
        };
        let result = self.inner.gateway.request_summary(&request).await;
        let digest = SummaryDigest::from_result(&result, ItemHeader::Report);

        match &result {
            Ok(_) | Err(SummaryError::Disabled) => {
                if result.is_ok() {
                    info!(items = digest.summary.len(), "summary received");
                }
                let rendered = digest.clone();
                self.publish(move |view| {
                    view.enter(ReportPhase::Rendering);
                    view.digest = Some(rendered);
                });
                self.publish(|view| view.enter(ReportPhase::Idle));
            }
            Err(error) => {
                warn!(error = %error, "summary request failed");
                let message = error.to_string();
                let rendered = digest.clone();
                self.publish(move |view| {
                    view.digest = Some(rendered);
                    view.fail(message);
                });
            }
        }

        digest
    }

    /// Narrative for a single incident. The dashboard view is left alone and
    /// a failed request yields the placeholder digest.
    pub async fn summarize_incident(
        &self,
        id: &IncidentId,
    ) -> Result<SummaryDigest, OrchestratorError> {
        let incident = self
            .inner
            .store
            .fetch_incidents(None)?
            .into_iter()
            .find(|incident| &incident.id == id)
            .ok_or_else(|| OrchestratorError::UnknownIncident(id.clone()))?;

        let request = SummaryRequest::Incident { incident };
        Ok(self.request_digest(&request, ItemHeader::Incident).await)
    }

    /// Narrative for one student's incidents inside `range`, labelled with the
    /// student's display name.
    pub async fn summarize_student(
        &self,
        reference: &StudentRef,
        range: Option<DateRange>,
    ) -> Result<SummaryDigest, OrchestratorError> {
        let students = self.inner.store.fetch_students()?;
        let incidents = self.inner.store.fetch_incidents(None)?;
        let student = resolve_student(reference, &students)?;
        let key = student.key();

        let (window, _) = in_window(&incidents, range.as_ref());
        let selected: Vec<_> = window
            .into_iter()
            .filter(|incident| canonical_key(&incident.student, &students) == key)
            .cloned()
            .collect();
        let student_label = match &range {
            Some(range) => format!("{}, {} to {}", student.display_name(), range.from, range.to),
            None => student.display_name(),
        };

        let request = SummaryRequest::Incidents {
            incidents: selected,
            student_label,
        };
        Ok(self.request_digest(&request, ItemHeader::Report).await)
    }

    async fn request_digest(&self, request: &SummaryRequest, header: ItemHeader) -> SummaryDigest {
        let result = self.inner.gateway.request_summary(request).await;
        match &result {
            Ok(_) => debug!(incidents = request.incident_count(), "summary received"),
            Err(SummaryError::Disabled) => {}
            Err(error) => warn!(error = %error, "summary request failed"),
        }
        SummaryDigest::from_result(&result, header)
    }

    /// Re-run [`refresh`](Self::refresh) for the current window every
    /// `interval` until the handle is dropped.
    pub fn spawn_polling(&self, interval: Duration) -> PollingHandle {
        let orchestrator = self.clone();
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                let range = orchestrator.range();
                if let Err(error) = orchestrator.refresh(range) {
                    warn!(error = %error, "polling refresh failed");
                }
            }
        });
        PollingHandle { task }
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.config.poll_interval
    }
}

/// Owns the polling task; dropping it stops polling.
#[derive(Debug)]
pub struct PollingHandle {
    task: JoinHandle<()>,
}

impl PollingHandle {
    pub fn stop(self) {}
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::AtomicUsize;

    use chrono::NaiveDate;

    use crate::workflows::incidents::{
        AttendanceRecord, ClassAssignment, InMemoryIncidentStore, Incident, IncidentCategory,
        IncidentId, IncidentStatus, Severity, Student, StudentId, StudentRef, ViewerRole,
    };
    use crate::workflows::summaries::{AiSummary, DigestSource};

    struct ScriptedGateway {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
        requests: Mutex<Vec<serde_json::Value>>,
    }

    impl ScriptedGateway {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                fail,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> serde_json::Value {
            self.requests
                .lock()
                .expect("requests mutex poisoned")
                .last()
                .cloned()
                .expect("a request was sent")
        }
    }

    impl SummaryGateway for ScriptedGateway {
        async fn request_summary(
            &self,
            request: &SummaryRequest,
        ) -> Result<AiSummary, SummaryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests
                .lock()
                .expect("requests mutex poisoned")
                .push(serde_json::to_value(request).expect("request serializes"));
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(SummaryError::Status(500))
            } else {
                Ok(AiSummary {
                    resumen: Some("Semana tranquila.".to_string()),
                    recomendaciones: None,
                    ..AiSummary::default()
                })
            }
        }
    }

    /// In-memory store whose reads can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryIncidentStore,
        offline: AtomicBool,
    }

    impl FlakyStore {
        fn check(&self) -> Result<(), RepositoryError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(RepositoryError::Unavailable("database offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl IncidentStore for FlakyStore {
        fn fetch_incidents(
            &self,
            filter: Option<&DateRange>,
        ) -> Result<Vec<Incident>, RepositoryError> {
            self.check()?;
            self.inner.fetch_incidents(filter)
        }

        fn fetch_students(&self) -> Result<Vec<Student>, RepositoryError> {
            self.check()?;
            self.inner.fetch_students()
        }

        fn fetch_student_by_id(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
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
            self.inner.save_student(student, existing)
        }

        fn insert_incident(&self, incident: Incident) -> Result<Incident, RepositoryError> {
            self.inner.insert_incident(incident)
        }

        fn mark_incident_resolved(&self, id: &IncidentId) -> Result<Incident, RepositoryError> {
            self.inner.mark_incident_resolved(id)
        }

        fn mark_incident_seen(
            &self,
            id: &IncidentId,
            role: ViewerRole,
        ) -> Result<(), RepositoryError> {
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

    fn incident(id: &str, student: &str, category: IncidentCategory, date: &str) -> Incident {
        Incident {
            id: IncidentId(id.to_string()),
            student: StudentRef::by_name(student),
            category,
            severity: (!category.is_positive()).then_some(Severity::Severe),
            description: "Registro de seguimiento semanal".to_string(),
            date: date.to_string(),
            timestamp: None,
            teacher: "Prof. Ruiz".to_string(),
            escalation: None,
            resolved: category.is_positive(),
            status: IncidentStatus::Pending,
        }
    }

    fn seeded_store() -> Arc<FlakyStore> {
        let store = Arc::new(FlakyStore::default());
        for (index, date) in ["2025-03-03", "2025-03-04", "2025-03-05"].iter().enumerate() {
            store
                .insert_incident(incident(
                    &format!("i-{index}"),
                    "Luis Paredes",
                    IncidentCategory::Behavior,
                    date,
                ))
                .expect("seed");
        }
        store
            .insert_incident(incident("i-9", "Ana Torres", IncidentCategory::Positive, "2025-04-01"))
            .expect("seed");
        store
    }

    fn orchestrator(
        store: Arc<FlakyStore>,
        gateway: Arc<ScriptedGateway>,
    ) -> ReportOrchestrator<FlakyStore, ScriptedGateway> {
        ReportOrchestrator::new(
            store,
            gateway,
            ScoringEngine::default(),
            ReportConfig {
                debounce: Duration::from_millis(1500),
                poll_interval: Duration::from_secs(15),
            },
        )
    }

    fn march() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date"),
            NaiveDate::from_ymd_opt(2025, 3, 31).expect("valid date"),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_publishes_aggregates_to_subscribers() {
        let gateway = ScriptedGateway::new(Duration::ZERO, false);
        let orchestrator = orchestrator(seeded_store(), gateway);
        let mut updates = orchestrator.subscribe();

        let report = orchestrator.refresh(Some(march())).expect("refresh");

        assert_eq!(report.stats.total, 3);
        assert_eq!(report.stats.overall_total, 4);
        assert_eq!(report.rankings.at_risk.len(), 1);
        assert!(report.rankings.standouts.is_empty());

        updates.changed().await.expect("sender alive");
        let view = updates.borrow_and_update().clone();
        assert_eq!(view.phase, ReportPhase::Idle);
        assert_eq!(view.refreshes, 1);
        assert_eq!(view.report.map(|report| report.stats.total), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn summary_requests_are_debounced() {
        let gateway = ScriptedGateway::new(Duration::ZERO, false);
        let orchestrator = orchestrator(seeded_store(), gateway.clone());
        orchestrator.refresh(None).expect("refresh");

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(500)).await;
            assert_eq!(orchestrator.schedule_summary(), SummaryTrigger::Scheduled);
        }
        assert_eq!(gateway.calls(), 0);

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(gateway.calls(), 1);

        let view = orchestrator.current();
        assert_eq!(view.phase, ReportPhase::Idle);
        let digest = view.digest.expect("digest rendered");
        assert_eq!(digest.summary, vec!["Semana tranquila."]);
    }

    #[tokio::test(start_paused = true)]
    async fn triggers_during_an_in_flight_request_are_ignored() {
        let gateway = ScriptedGateway::new(Duration::from_secs(5), false);
        let orchestrator = orchestrator(seeded_store(), gateway.clone());
        orchestrator.refresh(None).expect("refresh");

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(gateway.calls(), 1);
        assert_eq!(orchestrator.current().phase, ReportPhase::RequestingAi);
        assert_eq!(
            orchestrator.schedule_summary(),
            SummaryTrigger::IgnoredInFlight
        );
        assert!(matches!(
            orchestrator.summarize_now().await,
            Err(OrchestratorError::InFlight)
        ));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(gateway.calls(), 1);
        assert_eq!(orchestrator.current().phase, ReportPhase::Idle);
        assert_eq!(orchestrator.schedule_summary(), SummaryTrigger::Scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_data_does_not_request_a_new_summary() {
        let gateway = ScriptedGateway::new(Duration::ZERO, false);
        let orchestrator = orchestrator(seeded_store(), gateway.clone());

        orchestrator.refresh(Some(march())).expect("refresh");
        tokio::time::sleep(Duration::from_secs(2)).await;
        orchestrator.refresh(Some(march())).expect("refresh");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(gateway.calls(), 1);

        orchestrator.refresh(None).expect("refresh");
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_summary_keeps_the_report_and_shows_a_placeholder() {
        let gateway = ScriptedGateway::new(Duration::ZERO, true);
        let orchestrator = orchestrator(seeded_store(), gateway);
        orchestrator.refresh(None).expect("refresh");

        let digest = orchestrator.summarize_now().await.expect("recovered");
        assert_eq!(digest.source, DigestSource::Unavailable);

        let view = orchestrator.current();
        assert_eq!(view.phase, ReportPhase::Error);
        assert!(view.error.is_some());
        assert_eq!(view.report.map(|report| report.stats.total), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_keeps_the_last_good_report() {
        let store = seeded_store();
        let gateway = ScriptedGateway::new(Duration::ZERO, false);
        let orchestrator = orchestrator(store.clone(), gateway);
        orchestrator.refresh(Some(march())).expect("refresh");

        store.offline.store(true, Ordering::SeqCst);
        assert!(matches!(
            orchestrator.refresh(None),
            Err(OrchestratorError::Fetch(_))
        ));

        let view = orchestrator.current();
        assert_eq!(view.phase, ReportPhase::Error);
        assert_eq!(view.report.map(|report| report.stats.total), Some(3));

        store.offline.store(false, Ordering::SeqCst);
        orchestrator.refresh(None).expect("retry succeeds");
        assert_eq!(orchestrator.current().phase, ReportPhase::Idle);
        assert!(orchestrator.current().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_pending_clears_the_debounce_timer() {
        let gateway = ScriptedGateway::new(Duration::ZERO, false);
        let orchestrator = orchestrator(seeded_store(), gateway.clone());
        orchestrator.refresh(None).expect("refresh");

        assert!(orchestrator.cancel_pending());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(gateway.calls(), 0);
        assert!(!orchestrator.cancel_pending());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rapid_triggers_never_abort_a_running_request() {
        let gateway = ScriptedGateway::new(Duration::from_millis(3), false);
        let orchestrator = ReportOrchestrator::new(
            seeded_store(),
            gateway.clone(),
            ScoringEngine::default(),
            ReportConfig {
                debounce: Duration::from_millis(1),
                poll_interval: Duration::from_secs(15),
            },
        );
        orchestrator.refresh(None).expect("refresh");

        for _ in 0..200 {
            orchestrator.schedule_summary();
            tokio::time::sleep(Duration::from_micros(700)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;

        let view = orchestrator.current();
        assert!(gateway.calls() > 0);
        assert_eq!(view.phase, ReportPhase::Idle);
        assert!(view.digest.is_some());
        assert_eq!(orchestrator.schedule_summary(), SummaryTrigger::Scheduled);
        orchestrator.cancel_pending();
    }

    #[tokio::test]
    async fn incident_summary_sends_the_single_incident_shape() {
        let gateway = ScriptedGateway::new(Duration::ZERO, false);
        let orchestrator = orchestrator(seeded_store(), gateway.clone());

        let digest = orchestrator
            .summarize_incident(&IncidentId("i-1".to_string()))
            .await
            .expect("summarized");

        assert_eq!(digest.source, DigestSource::Structured);
        assert_eq!(digest.summary, vec!["Semana tranquila."]);
        let request = gateway.last_request();
        assert_eq!(request["incident"]["id"], "i-1");
        assert!(request.get("studentLabel").is_none());
        assert!(orchestrator.current().digest.is_none());

        assert!(matches!(
            orchestrator
                .summarize_incident(&IncidentId("missing".to_string()))
                .await,
            Err(OrchestratorError::UnknownIncident(_))
        ));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn student_summary_labels_the_request_with_the_student() {
        let store = seeded_store();
        store
            .save_student(
                Student {
                    id: Some(StudentId("s-2".to_string())),
                    first_name: "Luis".to_string(),
                    last_name: "Paredes".to_string(),
                    ..Student::default()
                },
                None,
            )
            .expect("student stored");
        let gateway = ScriptedGateway::new(Duration::ZERO, true);
        let orchestrator = orchestrator(store, gateway.clone());

        let digest = orchestrator
            .summarize_student(&StudentRef::by_id("s-2"), Some(march()))
            .await
            .expect("placeholder on failure");

        assert_eq!(digest.source, DigestSource::Unavailable);
        let request = gateway.last_request();
        assert_eq!(
            request["studentLabel"],
            "Luis Paredes, 2025-03-01 to 2025-03-31"
        );
        assert_eq!(request["incidents"].as_array().map(Vec::len), Some(3));

        assert!(matches!(
            orchestrator
                .summarize_student(&StudentRef::by_name("Nadie Conocido"), None)
                .await,
            Err(OrchestratorError::Identity(IdentityError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn summarize_requires_a_report() {
        let orchestrator = orchestrator(seeded_store(), ScriptedGateway::new(Duration::ZERO, false));
        assert!(matches!(
            orchestrator.summarize_now().await,
            Err(OrchestratorError::NoReport)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn polling_refreshes_until_the_handle_is_dropped() {
        let store = seeded_store();
        let gateway = ScriptedGateway::new(Duration::ZERO, false);
        let orchestrator = orchestrator(store.clone(), gateway);
        orchestrator.refresh(None).expect("refresh");

        let polling = orchestrator.spawn_polling(orchestrator.poll_interval());
        store
            .insert_incident(incident("i-10", "Ana Torres", IncidentCategory::Academic, "2025-04-02"))
            .expect("insert");
        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(orchestrator.current().refreshes, 2);
        assert_eq!(
            orchestrator.current().report.map(|report| report.stats.total),
            Some(5)
        );

        drop(polling);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(orchestrator.current().refreshes, 2);
    }
}
