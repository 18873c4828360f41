//! Background-job instrumentation.
//!
//! Jobs arrive as Sidekiq-style JSON envelopes:
//!
//! ```json
//! { "class": "ReportJob", "jid": "b4a5…", "queue": "default", "args": [42] }
//! ```
//!
//! ActiveJob wraps the real job in a generic wrapper class, with the actual
//! class in `wrapped` and the arguments under `args[0].arguments`.

use std::future::Future;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{host_metadata, Instrumentation};
use crate::metrics::{MemoryProbe, Metadata, TrackType, Tracker};

pub const ACTIVE_JOB_WRAPPER: &str = "ActiveJob::QueueAdapters::SidekiqAdapter::JobWrapper";

/// Key under which ActiveJob serializes a record reference.
pub const GLOBAL_ID_KEY: &str = "_aj_globalid";

const MAX_ARGS_CHARS: usize = 2000;
const TRUNCATED_ARGS_CHARS: usize = 1971;

/// `scheme://authority/EntityType/id`, capturing `EntityType`.
static GLOBAL_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^/]+/([^/]+)/").expect("global id pattern compiles")
});

// ─── Job identity ────────────────────────────────────────────────

/// The real job class and its arguments, whatever the envelope shape.
#[derive(Debug, Clone, PartialEq)]
pub struct JobIdentity {
    pub job_class: String,
    pub args: Option<Value>,
}

pub trait JobShape: Send + Sync {
    fn extract_job_identity(&self, raw: &Value) -> JobIdentity;
}

/// A job enqueued directly on the queue.
pub struct NativeJob;

impl JobShape for NativeJob {
    fn extract_job_identity(&self, raw: &Value) -> JobIdentity {
        JobIdentity {
            job_class: envelope_class(raw),
            args: raw.get("args").cloned(),
        }
    }
}

/// A job behind the ActiveJob wrapper.
pub struct WrappedJob;

impl JobShape for WrappedJob {
    fn extract_job_identity(&self, raw: &Value) -> JobIdentity {
        let payload = raw.get("args").and_then(|a| a.get(0));
        let job_class = raw
            .get("wrapped")
            .and_then(Value::as_str)
            .or_else(|| payload.and_then(|p| p.get("job_class")).and_then(Value::as_str))
            .map(str::to_owned)
            .unwrap_or_else(|| envelope_class(raw));
        JobIdentity {
            job_class,
            args: payload.and_then(|p| p.get("arguments")).cloned(),
        }
    }
}

/// Pick the shape that understands `raw`.
pub fn shape_of(raw: &Value) -> &'static dyn JobShape {
    let wrapped = raw.get("wrapped").map_or(false, Value::is_string)
        || raw.get("class").and_then(Value::as_str) == Some(ACTIVE_JOB_WRAPPER);
    if wrapped {
        &WrappedJob
    } else {
        &NativeJob
    }
}

fn envelope_class(raw: &Value) -> String {
    raw.get("class")
        .and_then(Value::as_str)
        .unwrap_or("UnknownJob")
        .to_owned()
}

// ─── Argument helpers ────────────────────────────────────────────

/// First distinct entity type referenced by a global id anywhere in `args`.
pub fn related_entity(args: &Value) -> Option<String> {
    let mut found = Vec::new();
    collect_global_id_types(args, &mut found);
    found.into_iter().next()
}

fn collect_global_id_types(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(gid) = map.get(GLOBAL_ID_KEY) {
                let entity = gid
                    .as_str()
                    .and_then(|s| GLOBAL_ID.captures(s))
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_owned());
                if let Some(entity) = entity {
                    if !out.contains(&entity) {
                        out.push(entity);
                    }
                }
            } else {
                map.values().for_each(|v| collect_global_id_types(v, out));
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_global_id_types(v, out)),
        _ => {}
    }
}

/// Compact JSON of `args`, cut to 1971 characters plus `...` past 2000.
pub fn truncate_args(args: &Value) -> String {
    let text = args.to_string();
    if text.chars().count() <= MAX_ARGS_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(TRUNCATED_ARGS_CHARS).collect();
    cut.push_str("...");
    cut
}

/// Metadata stored with a job sample.
pub fn job_metadata(job: &Value, queue: &str) -> Metadata {
    let identity = shape_of(job).extract_job_identity(job);
    let entity = identity.args.as_ref().and_then(related_entity);

    let worker_class = match entity {
        Some(entity) => format!("{} ({entity})", identity.job_class),
        None => identity.job_class,
    };

    let mut meta = Metadata::new();
    meta.insert("worker_class".into(), worker_class.into());
    meta.insert("queue".into(), queue.into());
    if let Some(jid) = job.get("jid").and_then(Value::as_str) {
        meta.insert("job_id".into(), jid.into());
    }
    if let Some(args) = identity.args.as_ref() {
        meta.insert("job_args".into(), truncate_args(args).into());
    }
    host_metadata(&mut meta);
    meta
}

// ─── Adapter ─────────────────────────────────────────────────────

/// Wraps job execution in the worker namespace.
#[derive(Clone)]
pub struct JobAdapter {
    instrumentation: Instrumentation,
}

impl JobAdapter {
    pub fn new(tracker: Arc<Tracker>, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            instrumentation: Instrumentation::new(tracker, TrackType::Worker, probe),
        }
    }

    /// Run `work` for `job` pulled from `queue`, returning its output as-is.
    pub async fn around<W, Fut, T>(&self, job: &Value, queue: &str, work: W) -> T
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.instrumentation
            .run(work, || job_metadata(job, queue))
            .await
    }
}
