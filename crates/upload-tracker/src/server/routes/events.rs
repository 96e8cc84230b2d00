//! Event intake endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::events::UploadEvent;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub accepted: bool,
    pub kind: &'static str,
    pub file_name: String,
}

/// POST /api/events - Publish a lifecycle signal on the bus
pub async fn publish_event(
    State(state): State<AppState>,
    Json(event): Json<UploadEvent>,
) -> Result<Json<PublishResponse>> {
    if event.file_name().trim().is_empty() {
        return Err(Error::InvalidRequest(
            "Event is missing file_name".to_string(),
        ));
    }

    let kind = event.kind();
    let file_name = event.file_name().to_string();
    let receivers = state.notifier().publish(event);
    tracing::debug!("Published '{}' for {} to {} subscribers", kind, file_name, receivers);

    Ok(Json(PublishResponse {
        accepted: receivers > 0,
        kind,
        file_name,
    }))
}
