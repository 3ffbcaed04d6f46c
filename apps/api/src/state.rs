use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::flights::FlightClient;
use crate::itinerary::engine::PositioningEngine;
use crate::storage::ImageStorage;

/// Shared application state injected into all route handlers via Axum
/// extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Positioning engine over the remote row store; owns the cache and the
    /// per-day locks.
    pub engine: PositioningEngine,
    pub storage: Arc<ImageStorage>,
    pub flights: Arc<FlightClient>,
    pub config: Config,
}
