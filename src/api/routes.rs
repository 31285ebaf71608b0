use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{sequence, AppState};
use crate::api::middleware::request_cache_middleware;

/// Create router with application state.
///
/// Every request runs in its own memoization scope.
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/sequences/{name}", post(sequence::create_sequence))
        .route("/api/sequences/{name}/next", post(sequence::next_sequence_value))
        .layer(middleware::from_fn(request_cache_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
