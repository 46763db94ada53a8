mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use handlers::{AppState, ObjectZones, TimeoutSettings};

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Live view
        .route("/objects/active", get(handlers::active_objects))
        .route("/objects/trails", get(handlers::active_trails))
        // Object records
        .route("/objects", get(handlers::list_objects))
        .route("/objects/{id}", get(handlers::get_object))
        .route("/objects/{id}/trail", get(handlers::object_trail))
        .route("/objects/{id}/history", get(handlers::object_history))
        .route("/objects/{id}/zones", get(handlers::object_zones))
        // Events
        .route("/zone-events", get(handlers::list_zone_events))
        .route("/events", get(handlers::list_object_events))
        // Zones
        .route("/zones", get(handlers::list_zones))
        .route("/zones/reload", post(handlers::reload_zones))
        // Settings
        .route(
            "/settings/timeout",
            get(handlers::get_timeout).put(handlers::set_timeout),
        )
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
