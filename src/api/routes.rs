//! API route definitions
//!
//! Endpoints for the tracking hub:
//! - /api/v1/status   — hub uptime and connection counts
//! - /api/v1/services — service registration and stage transitions
//! - /health          — liveness probe at root level

use axum::routing::{get, patch, post};
use axum::Router;

use super::handlers::{self, HubApiState};

/// Create all API routes for the hub.
pub fn api_routes(state: HubApiState) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/services", post(handlers::create_service))
        .route("/services/:id", get(handlers::get_service))
        .route("/services/:id/stage", patch(handlers::set_stage))
        .with_state(state)
}

/// Liveness endpoint at root level, for load balancers and probes.
pub fn health_routes() -> Router {
    Router::new().route("/health", get(handlers::get_health))
}
