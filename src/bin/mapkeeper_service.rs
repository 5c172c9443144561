//! Map Service Binary
//!
//! Runs the map catalog as a REST API service:
//! - Structured JSON logging
//! - Request tracing with correlation IDs
//! - Graceful shutdown handling
//! - Health check endpoints
//!
//! ## Configuration
//!
//! Environment variables (see `ServiceConfig`):
//! - `HOST`, `PORT`: bind address (default: 0.0.0.0:8001)
//! - `MAPKEEPER_DATA_FILE`: JSON snapshot path (default: in-memory only)
//! - `MAPKEEPER_CLIENT_DIR`: built client application directory
//! - `MAPKEEPER_USER_NAME`, `MAPKEEPER_SEED_DEMO`: startup provisioning
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! MAPKEEPER_DATA_FILE=./data/catalog.json LOG_FORMAT=pretty cargo run --bin mapkeeper_service
//! ```

use std::net::SocketAddr;

use axum::middleware;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use mapkeeper::service::{
    create_router, metrics_middleware, request_logging_middleware, ServiceConfig, ServiceState,
};
use mapkeeper::{EntityStore, FileEntityStore, InMemoryEntityStore};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mapkeeper_service=info,mapkeeper=info,tower_http=info".into());

    if log_format == "pretty" {
        // Pretty format for local development
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true)
            )
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

async fn serve<S: EntityStore + 'static>(
    store: S,
    config: &ServiceConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = ServiceState::bootstrap(store, config).await?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!(
        address = %addr,
        version = env!("CARGO_PKG_VERSION"),
        "Map Service listening"
    );

    let listener = TcpListener::bind(addr).await?;

    info!("Ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    let build_sha = option_env!("BUILD_SHA").unwrap_or("dev");

    info!(
        version = version,
        build_sha = build_sha,
        "Starting Map Service"
    );

    let config = ServiceConfig::from_env();

    // The store lives for the whole process and is dropped after shutdown.
    match &config.data_file {
        Some(path) => {
            info!(path = %path.display(), "Using file-backed catalog");
            let store = FileEntityStore::open(path).await.map_err(|e| {
                tracing::error!(error = %e, "Failed to load catalog snapshot");
                e
            })?;
            serve(store, &config).await?;
        }
        None => {
            info!("Using in-memory catalog; changes are lost on shutdown");
            serve(InMemoryEntityStore::new(), &config).await?;
        }
    }

    info!("Map Service shutdown complete");

    Ok(())
}
