use axum::{routing::get, routing::post, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub mod analyze;
pub mod error;
pub mod health;
pub mod metrics;

/// Build the API router. The `/metrics` scrape endpoint is attached
/// separately in `main` because it carries its own recorder-handle state.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/analyze", post(analyze::submit_analysis))
        .route("/api/v1/analyze/{job_id}", get(analyze::get_analysis_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)) // 10 MB limit
}
