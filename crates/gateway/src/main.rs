//! Aula API Gateway
//!
//! HTTP API for grade sheets, attendance and reports.
//! Handles:
//! - Token verification and role checks
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use aula_common::{
    auth::JwtManager,
    config::{AppConfig, ObservabilityConfig},
    db::DbPool,
    metrics,
};
use axum::{
    extract::FromRef,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub jwt: Arc<JwtManager>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = match std::env::var("APP_CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path)?,
        Err(_) => AppConfig::load()?,
    };
    let config = Arc::new(config);

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting Aula API Gateway v{}",
        aula_common::VERSION
    );

    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }
    metrics::register_metrics();

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    if config.database.run_migrations {
        db.migrate(&config.database.migrations_dir).await?;
    }

    let state = AppState {
        config: config.clone(),
        db,
        jwt: Arc::new(JwtManager::from_config(&config.auth)),
    };

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                stop_rx.await.ok();
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    stop_tx.send(()).ok();
    let drain = config.shutdown_timeout();
    match tokio::time::timeout(drain, server).await {
        Ok(result) => result??,
        Err(_) => warn!(timeout_secs = drain.as_secs(), "In-flight requests did not finish, exiting"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// JSON or plain logs filtered by `observability.log_level`
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

fn install_metrics_exporter(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", metrics::METRICS_PREFIX)),
            metrics::LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_report_render_duration_seconds", metrics::METRICS_PREFIX)),
            metrics::REPORT_BUCKETS,
        )?
        .install()?;

    info!(port, "Prometheus exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut router = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Roster & assignments
        .route("/divisions/{id}/students", get(handlers::students::list_students))
        .route("/assignments", get(handlers::assignments::list_assignments))

        // Grade sheets
        .route("/grades", get(handlers::grades::get_sheet).put(handlers::grades::save_grade))
        .route("/grades/batch", post(handlers::grades::save_batch))

        // Reports
        .route("/reports/json", get(handlers::reports::report_json))
        .route("/reports/grades", get(handlers::reports::report_pdf))
        .route("/reports/grades/csv", get(handlers::reports::report_csv))
        .route("/reports/attendance/division/{id}", get(handlers::reports::attendance_report))
        .route("/reports/citation", post(handlers::reports::citation))

        // Attendance
        .route("/attendance", post(handlers::attendance::capture))
        .route("/attendance/alerts/{division_id}", get(handlers::attendance::alerts))
        .route("/attendance/discrepancies/{division_id}", get(handlers::attendance::discrepancies))
        .route("/attendance/overview/{division_id}", get(handlers::attendance::overview))
        .route("/attendance/mass-justify", post(handlers::attendance::mass_justify));

    if config.rate_limit.enabled {
        let limiter = middleware::rate_limit::RateLimitState::new(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        );
        router = router.layer(from_fn_with_state(limiter, middleware::rate_limit::rate_limit_middleware));
    }

    router
        .layer(from_fn(middleware::metrics::track_requests))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(ConcurrencyLimitLayer::new(config.server.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
