//! RagForge API Gateway
//!
//! The HTTP entry point for question answering.
//! Handles:
//! - Request routing to the RAG pipeline
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use middleware::rate_limit::{rate_limit_middleware, RateLimit};
use ragforge_common::{
    config::{AppConfig, ObservabilityConfig},
    metrics::{self, BACKEND_BUCKETS},
    RagService,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{signal, sync::Notify};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub rag: Arc<RagService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config.observability);

    info!("Starting RagForge API Gateway v{}", ragforge_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                BACKEND_BUCKETS,
            )?
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }

    // Build the pipeline once; mode never changes at runtime
    let rag = Arc::new(RagService::from_config(&config.rag)?);

    let state = AppState {
        config: config.clone(),
        rag,
    };

    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            trigger.notify_one();
        })
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = drain_deadline(shutdown, config.shutdown_timeout()) => {
            tracing::warn!(
                grace_secs = config.server.shutdown_timeout_secs,
                "In-flight requests still running after grace period, exiting"
            );
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

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

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        .route("/query", post(handlers::query::query))
        .route("/query/context", post(handlers::query::query_with_context));

    if let Some(rate_limit) = RateLimit::from_config(&state.config.rate_limit) {
        api_routes = api_routes.layer(axum::middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ));
    }

    // Compose the app; health checks stay outside the rate limit
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Resolves `grace` after shutdown has been signalled
async fn drain_deadline(started: Arc<Notify>, grace: Duration) {
    started.notified().await;
    tokio::time::sleep(grace).await;
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
