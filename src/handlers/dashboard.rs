use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

use super::{AppError, ViewQuery};

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

// ─── GET /memhealth ──────────────────────────────────────────────
/// Plain-text stats for one namespace, handy from curl.
pub async fn text_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<String, AppError> {
    let track_type = query.track_type()?;
    if !state.tracker.config().enabled {
        return Ok("Memory tracking is disabled (set MEM_HEALTH_ENABLED=true).\n".into());
    }
    Ok(state.reporter.render_text(track_type).await?)
}

// ─── POST /memhealth/api/clear ───────────────────────────────────
/// Wipes both namespaces. Always 200; failures are in the message.
pub async fn clear(State(state): State<Arc<AppState>>) -> Json<ClearResponse> {
    Json(ClearResponse {
        message: state.reporter.clear().await,
    })
}
