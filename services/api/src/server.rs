use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryBackend, StaticFeatureFlagStore};
use crate::routes::with_eligibility_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lending_eligibility::config::AppConfig;
use lending_eligibility::error::AppError;
use lending_eligibility::telemetry;
use lending_eligibility::workflows::eligibility::{EligibilityService, SystemClock, ThreadDelay};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let features = StaticFeatureFlagStore::from_path(config.eligibility.features_path.as_deref())?;
    let backend = InMemoryBackend::new(features);
    let collaborators = backend.collaborators(Arc::new(SystemClock), Arc::new(ThreadDelay));
    let service = Arc::new(EligibilityService::new(
        collaborators,
        config.eligibility.pipeline.clone(),
    ));

    let app = with_eligibility_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        mycroft_attempts = config.eligibility.pipeline.mycroft_max_attempts,
        "eligibility service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
