//! API routes for the tracker server

pub mod events;
pub mod uploads;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Lifecycle signals from out-of-process producers
        .route("/events", post(events::publish_event))
        // Queue and primary view
        .route("/uploads", get(uploads::list_uploads))
        .route("/uploads/current", get(uploads::current_upload))
        .route("/uploads/dismiss", post(uploads::dismiss))
        // Document commands
        .route(
            "/documents/:id/cancel-linking",
            post(uploads::cancel_linking),
        )
        .route(
            "/documents/:id/store-without-extraction",
            post(uploads::store_without_extraction),
        )
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let config = state.config();
    axum::Json(serde_json::json!({
        "name": "upload-tracker",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Upload and pipeline-status tracking with a single primary view",
        "backend": config.backend.base_url,
        "polling": {
            "interval_ms": config.polling.interval_ms,
            "max_consecutive_failures": config.polling.max_consecutive_failures,
        },
        "dismissal": config.dismissal,
        "endpoints": {
            "POST /api/events": "Publish an upload lifecycle event",
            "GET /api/uploads": "List tracked uploads and the primary view",
            "GET /api/uploads/current": "Primary upload snapshot, or null",
            "POST /api/uploads/dismiss": "Clear all tracking state",
            "POST /api/documents/:id/cancel-linking": "Stop tracking a document and cancel linking",
            "POST /api/documents/:id/store-without-extraction": "Keep the file, skip extraction"
        }
    }))
}
