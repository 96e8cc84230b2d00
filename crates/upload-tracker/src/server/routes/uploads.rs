//! Queue, primary view and document command endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::tracking::TrackerView;
use crate::types::DisplaySnapshot;

/// Response for document commands
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub document_id: String,
    pub tracked: bool,
}

/// GET /api/uploads - Queue plus the primary snapshot
pub async fn list_uploads(State(state): State<AppState>) -> Json<TrackerView> {
    Json(state.tracker().view())
}

/// GET /api/uploads/current - Primary snapshot or null
pub async fn current_upload(State(state): State<AppState>) -> Json<Option<DisplaySnapshot>> {
    Json(state.tracker().current_snapshot())
}

/// POST /api/uploads/dismiss - Clear all tracking state
pub async fn dismiss(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    state.tracker().dismiss().await?;
    Ok(Json(serde_json::json!({ "dismissed": true })))
}

/// POST /api/documents/:id/cancel-linking
pub async fn cancel_linking(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<CommandResponse>> {
    let tracked = state.tracker().cancel_linking(document_id.clone()).await?;
    if !tracked {
        return Err(Error::DocumentNotFound(document_id));
    }
    Ok(Json(CommandResponse {
        document_id,
        tracked,
    }))
}

/// POST /api/documents/:id/store-without-extraction
pub async fn store_without_extraction(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<CommandResponse>> {
    let tracked = state
        .tracker()
        .store_without_extraction(document_id.clone())
        .await?;
    if !tracked {
        return Err(Error::DocumentNotFound(document_id));
    }
    Ok(Json(CommandResponse {
        document_id,
        tracked,
    }))
}
