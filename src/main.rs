use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod db;
mod error;
mod indexer;
mod models;
mod services;
mod utils;

use config::Config;
use constants::API_VERSION;
use db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outflow_monitor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting Outflow Monitor");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    // Initialize database
    let db = Database::new(&config).await?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db.run_migrations().await?;

    let engine = Arc::new(services::build_scan_engine(db.clone(), &config));

    // One-shot pass for external cron
    if std::env::args().skip(1).any(|arg| arg == "--once") {
        let report = engine.run_pass().await?;
        tracing::info!(
            "One-shot pass finished: {} new transaction(s)",
            report.transactions_detected
        );
        return Ok(());
    }

    let scheduler = Arc::new(services::Scheduler::new(engine));

    let app_state = api::AppState {
        db: db.clone(),
        config: config.clone(),
        scheduler: scheduler.clone(),
    };

    // Build router
    let app = build_router(app_state);

    // Start background services
    tokio::spawn(services::start_background_services(
        scheduler,
        config.clone(),
    ));

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Monitor control
        .route("/api/v1/monitor/start", post(api::monitor::start_monitor))
        .route("/api/v1/monitor/stop", post(api::monitor::stop_monitor))
        .route("/api/v1/monitor/refresh", post(api::monitor::refresh_monitor))
        .route("/api/v1/monitor/status", get(api::monitor::get_monitor_status))
        .route("/api/v1/monitor/data", get(api::monitor::get_monitor_data))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
