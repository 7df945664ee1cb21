//! Route definitions
//!
//! Maps URLs to handlers with type-safe routing.

use super::{handlers::*, websocket::websocket_handler};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check (high priority)
        .route("/health", get(health_handler))
        // Matchmaking endpoints
        .route("/match/join", post(join_handler))
        .route("/match/cancel", post(cancel_handler))
        .route("/match/result", post(result_handler))
        // Realtime channel
        .route("/ws", get(websocket_handler))
        // Attach shared state
        .with_state(state)
}
