//! HTTP route wiring for the TKA collaborator API.

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod access;
mod health;
mod members;

/// Builds the application router: health/readiness, the memberlist
/// boundary, and the access-grant endpoint.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/api/members", get(members::list_members))
        .route("/api/access", post(access::request_access))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
