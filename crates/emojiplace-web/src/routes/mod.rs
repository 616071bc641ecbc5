//! HTTP and WebSocket routes.

mod api;
mod ws;

pub use api::ApiError;

use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        // Canvas
        .route("/api/pixels", post(api::place_pixel))
        .route("/api/pixels/:x/:y", get(api::get_pixel))
        .route(
            "/api/pixels/region/:x/:y/:width/:height",
            get(api::get_region),
        )
        .route("/api/chunks/:cx/:cy", get(api::get_chunk))
        .route("/api/cooldown", get(api::get_cooldown))
        // Users
        .route("/api/users/me", get(api::get_me))
        .route("/api/users/username", post(api::set_username))
        // Agents
        .route("/api/agents/run", post(api::run_agents))
        .route("/api/agents/messages", get(api::get_messages))
        // Live updates
        .route("/ws", get(ws::socket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
