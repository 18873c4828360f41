pub mod dashboard;
pub mod demo;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::error::Error;
use crate::metrics::TrackType;

// ─── Shared query parameters ─────────────────────────────────────

/// `?view=web|worker&limit=N`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewQuery {
    pub view: Option<String>,
    pub limit: Option<usize>,
}

impl ViewQuery {
    pub fn track_type(&self) -> Result<TrackType, AppError> {
        match self.view.as_deref() {
            None => Ok(TrackType::Web),
            Some(v) => v.parse().map_err(AppError::BadRequest),
        }
    }
}

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    Store(String),
    BadRequest(String),
    Internal(String),
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        match e {
            Error::Redis(_) | Error::Store(_) => Self::Store(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Store(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error":  message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
