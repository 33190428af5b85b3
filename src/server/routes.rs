//! Route table.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::server::{handlers, AppState};

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Category discovery
        .route("/api/categories", get(handlers::categories))
        // Startup directory job
        .route("/api/harvest", post(handlers::start_harvest))
        .route("/api/harvest/stop", post(handlers::stop_harvest))
        .route("/api/harvest/progress", get(handlers::harvest_progress))
        .route("/api/harvest/results", get(handlers::harvest_results))
        .route("/api/harvest/export/:format", get(handlers::harvest_export))
        // School directory job
        .route("/api/schools/harvest", post(handlers::start_schools))
        .route("/api/schools/harvest/stop", post(handlers::stop_schools))
        .route("/api/schools/harvest/progress", get(handlers::schools_progress))
        .route("/api/schools/harvest/results", get(handlers::schools_results))
        .route("/api/schools/harvest/export/:format", get(handlers::schools_export))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
