//! Agentscope server library: HTTP routes, the event WebSocket and the
//! shared state around a running monitor. Kept apart from `main.rs` so the
//! router can be driven from integration tests.

pub mod config;
pub mod events_ws;
pub mod logging;
pub mod routes;
pub mod state;

use axum::{
    routing::{delete, get, post},
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(routes::health))
        .route("/agents", get(routes::agents::list).post(routes::agents::launch))
        .route("/agents/{id}", delete(routes::agents::close))
        .route("/agents/{id}/reattach", post(routes::agents::reattach))
        .route("/focus", post(routes::focus))
        .route("/scan", post(routes::scan));

    let ws_routes = Router::new().route("/events", get(events_ws::upgrade));

    Router::new()
        .nest("/api", api_routes)
        .nest("/ws", ws_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
