use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::metrics::stream;
use crate::middleware::request::memory_middleware;
use crate::AppState;

/// Builds the full Axum `Router`: dashboard routes plus the demo host routes,
/// with the memory middleware wrapped around the host routes only.
pub fn create_router(state: Arc<AppState>) -> Router {
    dashboard_routes()
        .merge(host_routes(Arc::clone(&state)))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Dashboard endpoints. Not instrumented, so polling the dashboard never
/// shows up in the rankings.
pub fn dashboard_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/memhealth", get(handlers::dashboard::text_report))
        .route("/memhealth/api/summary", get(stream::get_summary))
        .route("/memhealth/api/summary/stream", get(stream::summary_stream))
        .route("/memhealth/api/clear", post(handlers::dashboard::clear))
}

/// Demo application routes, instrumented by the request middleware.
pub fn host_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/ping", get(handlers::demo::ping))
        .route("/api/allocate/:mb", get(handlers::demo::allocate))
        .route("/api/jobs", post(handlers::demo::run_job))
        .route_layer(axum_mw::from_fn_with_state(
            state.requests.clone(),
            memory_middleware,
        ))
}
