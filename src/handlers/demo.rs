//! Demo host endpoints for exercising the tracker by hand:
//!
//! ```text
//! curl localhost:3000/api/allocate/50
//! curl -XPOST localhost:3000/api/jobs -H 'content-type: application/json' \
//!      -d '{"class":"ReportJob","jid":"j1","queue":"default","args":[80]}'
//! ```

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::middleware::job::shape_of;
use crate::AppState;

use super::AppError;

/// Largest single allocation the demo endpoints accept.
const MAX_DEMO_MB: u64 = 512;

#[derive(Debug, Serialize)]
pub struct Allocation {
    pub allocated_mb: u64,
    pub retained_chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct JobRun {
    pub job_class: String,
    pub queue: String,
    pub allocated_mb: u64,
}

// ─── GET /api/ping ───────────────────────────────────────────────

pub async fn ping() -> &'static str {
    "pong"
}

// ─── GET /api/allocate/:mb ───────────────────────────────────────
/// Allocates and retains `mb` megabytes so RSS actually grows.

pub async fn allocate(
    State(state): State<Arc<AppState>>,
    Path(mb): Path<u64>,
) -> Result<Json<Allocation>, AppError> {
    check_size(mb)?;
    let retained_chunks = state.retain_ballast(mb);
    Ok(Json(Allocation {
        allocated_mb: mb,
        retained_chunks,
    }))
}

// ─── POST /api/jobs ──────────────────────────────────────────────
/// Runs a job envelope through the job adapter. The first numeric argument
/// is the number of megabytes the job retains.

pub async fn run_job(
    State(state): State<Arc<AppState>>,
    Json(job): Json<Value>,
) -> Result<Json<JobRun>, AppError> {
    let identity = shape_of(&job).extract_job_identity(&job);
    let mb = identity
        .args
        .as_ref()
        .and_then(Value::as_array)
        .and_then(|args| args.iter().find_map(Value::as_u64))
        .unwrap_or(0);
    check_size(mb)?;

    let queue = job
        .get("queue")
        .and_then(Value::as_str)
        .unwrap_or("default")
        .to_owned();

    let job_state = Arc::clone(&state);
    state
        .jobs
        .around(&job, &queue, || async move {
            job_state.retain_ballast(mb);
        })
        .await;

    Ok(Json(JobRun {
        job_class: identity.job_class,
        queue,
        allocated_mb: mb,
    }))
}

fn check_size(mb: u64) -> Result<(), AppError> {
    if mb > MAX_DEMO_MB {
        return Err(AppError::BadRequest(format!(
            "mb must be at most {MAX_DEMO_MB}"
        )));
    }
    Ok(())
}
