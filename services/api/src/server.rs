use crate::cli::ServeArgs;
use crate::infra::{build_orchestrator, build_service, AppState};
use crate::routes::with_dashboard_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use incident_desk::config::AppConfig;
use incident_desk::error::AppError;
use incident_desk::telemetry;
use incident_desk::workflows::incidents::InMemoryIncidentStore;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let store = Arc::new(InMemoryIncidentStore::default());
    let service = Arc::new(build_service(&config, store.clone()));
    let orchestrator = build_orchestrator(&config, store)?;
    if let Err(err) = orchestrator.refresh(None) {
        warn!(error = %err, "initial dashboard refresh failed");
    }
    let polling = orchestrator.spawn_polling(config.report.poll_interval);

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        orchestrator: orchestrator.clone(),
    };

    let app = with_dashboard_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        poll_secs = config.report.poll_interval.as_secs(),
        "incident desk ready"
    );

    let served = axum::serve(listener, app).await;
    polling.stop();
    orchestrator.cancel_pending();
    served?;
    Ok(())
}
