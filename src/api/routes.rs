//! API route definitions
//!
//! - `/api/v1/status`: status snapshot plus counters
//! - `/api/v1/history`, `/api/v1/history/:cycle`: completed cycles
//! - `/api/v1/frame`: latest sensor grid
//! - `/data`, `/health`, `/generate_204`: root-level endpoints

use axum::{routing::get, Router};

use super::handlers::{self, DashboardState};

pub fn api_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/history", get(handlers::get_history))
        .route("/history/:cycle", get(handlers::get_history_cycle))
        .route("/frame", get(handlers::get_frame))
        .with_state(state)
}

pub fn root_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/data", get(handlers::get_data))
        .route("/health", get(handlers::health_check))
        .route("/generate_204", get(handlers::captive_portal))
        .with_state(state)
}
