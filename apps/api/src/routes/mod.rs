pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::services::{ServeDir, ServeFile};

use crate::auth;
use crate::flights;
use crate::itinerary::handlers;
use crate::reservations;
use crate::state::AppState;
use crate::storage;

pub fn build_router(state: AppState) -> Router {
    let index = std::path::Path::new(&state.config.frontend_dir).join("index.html");
    let frontend = ServeDir::new(&state.config.frontend_dir).fallback(ServeFile::new(index));

    let api = Router::new()
        // Itinerary CRUD over the sheet
        .route("/api/itinerary", get(handlers::handle_get_itinerary))
        .route("/api/itinerary/add", post(handlers::handle_add_activity))
        .route("/api/itinerary/update", put(handlers::handle_update_activity))
        .route("/api/itinerary/delete", delete(handlers::handle_delete_activity))
        .route("/api/itinerary/visibility", put(handlers::handle_set_visibility))
        .route("/api/itinerary/move", post(handlers::handle_move_activity))
        // Image storage
        .route(
            "/api/upload-image",
            post(storage::handle_upload_image)
                .layer(DefaultBodyLimit::max(storage::MAX_IMAGE_BYTES)),
        )
        .route("/api/delete-image/:id", delete(storage::handle_delete_image))
        // Flight lookup
        .route("/api/flight-status", get(flights::handle_flight_status))
        // Reservations (SQLite)
        .route(
            "/api/reservations",
            get(reservations::handle_list_by_date).post(reservations::handle_create),
        )
        .route("/api/reservations/all", get(reservations::handle_list_all))
        .route("/api/reservations/search", get(reservations::handle_search))
        .route("/api/reservations/stats", get(reservations::handle_stats))
        .route(
            "/api/reservations/:id",
            put(reservations::handle_update).delete(reservations::handle_delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::basic_auth,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .merge(api)
        .fallback_service(frontend)
        .with_state(state)
}
