mod auth;
mod cache;
mod config;
mod db;
mod errors;
mod flights;
mod itinerary;
mod oauth;
mod reservations;
mod routes;
mod sheets;
mod state;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::Cache;
use crate::config::Config;
use crate::db::create_pool;
use crate::flights::FlightClient;
use crate::itinerary::engine::PositioningEngine;
use crate::routes::build_router;
use crate::sheets::retry::RetryPolicy;
use crate::sheets::GoogleSheetsClient;
use crate::state::AppState;
use crate::storage::ImageStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting itinerary API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite (reservations)
    let db = create_pool(&config.database_path).await?;

    // One HTTP client shared across the Sheets, storage, and flight clients
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    // Remote row store + cache + positioning engine
    let sheets = Arc::new(GoogleSheetsClient::new(
        http.clone(),
        config.sheet_id.clone(),
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_refresh_token.clone(),
        RetryPolicy::default(),
    ));
    let cache = Arc::new(Cache::new(
        Duration::from_secs(config.cache_headers_ttl_secs),
        Duration::from_secs(config.cache_day_ttl_secs),
    ));
    let engine = PositioningEngine::new(
        sheets,
        cache,
        config.headers_sheet.clone(),
        config.insert_index_mode,
    );
    info!("Sheets client initialized (spreadsheet {})", config.sheet_id);

    // Image storage (Dropbox preferred, Cloudinary fallback)
    let storage = Arc::new(ImageStorage::from_config(&config, &http));
    info!("image storage provider: {}", storage.provider_name());

    // Flight-status passthrough
    let flights = Arc::new(FlightClient::new(
        http.clone(),
        config.aviationstack_api_key.clone(),
    ));

    // Build app state
    let state = AppState {
        db,
        engine,
        storage,
        flights,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // the frontend is served cross-origin in development
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
