// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{http::{HeaderValue, Method}, routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::series_service::SeriesService;
use crate::application::streaming_service::StreamingDashboardService;
use crate::infrastructure::config::{load_app_config, load_panels_config};
use crate::infrastructure::influx_store::InfluxStore;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    get_series, health_check, list_panels, panel_snapshot, stream_dashboard,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let app_config = load_app_config()?;
    let panels_config = load_panels_config()?;

    // Create store (infrastructure layer)
    let store = Arc::new(InfluxStore::new(&app_config.store)?);
    tracing::info!(
        "Using telemetry store {} (database {})",
        app_config.store.base_url(),
        app_config.store.database
    );

    // Create services (application layer)
    let series_service = SeriesService::new(store);
    let streaming_service = StreamingDashboardService::new(series_service.clone(), panels_config);

    // Create application state
    let state = Arc::new(AppState {
        series_service,
        streaming_service,
    });

    let origin = HeaderValue::from_str(&app_config.server.allowed_origin)
        .context("Invalid allowed origin")?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET]);

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/panels", get(list_panels))
        .route("/panels/:id", get(panel_snapshot))
        .route("/dashboards/:date", get(stream_dashboard))
        .route("/series/:metric/:date", get(get_series))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = app_config
        .server
        .bind
        .parse()
        .context("Invalid bind address")?;
    tracing::info!("Starting detector-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
