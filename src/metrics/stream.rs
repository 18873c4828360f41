use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use crate::handlers::{AppError, ViewQuery};
use crate::reporting::Summary;
use crate::AppState;

/// How often the SSE stream pushes a fresh summary.
const STREAM_INTERVAL: Duration = Duration::from_secs(2);

// ─── GET /memhealth/api/summary ──────────────────────────────────
/// Returns a single JSON summary for `?view=web|worker`.
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<Summary>, AppError> {
    let track_type = query.track_type()?;
    Ok(Json(state.reporter.summary(track_type, query.limit).await?))
}

// ─── GET /memhealth/api/summary/stream ───────────────────────────
/// Server-Sent Events endpoint pushing a `Summary` every 2 s.
/// A store failure on one tick is sent as an `error` event and the
/// stream keeps going.
pub async fn summary_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let track_type = query.track_type()?;
    let limit = query.limit;
    let interval = tokio::time::interval(STREAM_INTERVAL);

    let stream = IntervalStream::new(interval).then(move |_| {
        let state = Arc::clone(&state);
        async move {
            let event = match state.reporter.summary(track_type, limit).await {
                Ok(summary) => {
                    let json = serde_json::to_string(&summary).unwrap_or_default();
                    Event::default().data(json)
                }
                Err(e) => Event::default().event("error").data(e.to_string()),
            };
            Ok(event)
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
