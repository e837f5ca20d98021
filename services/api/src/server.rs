use crate::cli::ServeArgs;
use crate::infra::{
    AppState, FixtureDocument, InMemoryBookingRepository, InMemoryPolicyRepository,
    LoggingRefundPublisher,
};
use crate::routes::with_booking_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use booking_policy::config::AppConfig;
use booking_policy::error::AppError;
use booking_policy::telemetry;
use booking_policy::workflows::bookings::BookingLifecycleService;
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
    if let Some(path) = args.fixtures.take() {
        config.fixtures.path = Some(path);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let bookings = InMemoryBookingRepository::default();
    let policies = InMemoryPolicyRepository::default();
    match &config.fixtures.path {
        Some(path) => {
            info!(path = %path.display(), "loading booking fixtures");
            FixtureDocument::from_path(path)?.seed(&bookings, &policies)?;
        }
        None => warn!("no fixtures configured; booking and policy stores start empty"),
    }

    let service = Arc::new(BookingLifecycleService::new(
        Arc::new(bookings),
        Arc::new(policies),
        Arc::new(LoggingRefundPublisher::default()),
    ));

    let app = with_booking_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "booking policy service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
