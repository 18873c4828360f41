use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::account::{AccountId, AccountLookups};
use super::{host_metadata, Instrumentation};
use crate::metrics::{MemoryProbe, Metadata, TrackType, Tracker};

/// State for [`memory_middleware`]: the web-namespace instrumentation plus
/// the account lookup chain.
#[derive(Clone)]
pub struct RequestTracking {
    instrumentation: Instrumentation,
    accounts: Arc<AccountLookups>,
}

impl RequestTracking {
    pub fn new(tracker: Arc<Tracker>, probe: Arc<dyn MemoryProbe>) -> Self {
        Self::with_accounts(tracker, probe, AccountLookups::default())
    }

    pub fn with_accounts(
        tracker: Arc<Tracker>,
        probe: Arc<dyn MemoryProbe>,
        accounts: AccountLookups,
    ) -> Self {
        Self {
            instrumentation: Instrumentation::new(tracker, TrackType::Web, probe),
            accounts: Arc::new(accounts),
        }
    }
}

/// Axum middleware measuring resident memory around every request.
///
/// Use with `axum::middleware::from_fn_with_state`. The inner response is
/// returned as-is whatever happens to the sample.
pub async fn memory_middleware(
    State(tracking): State<RequestTracking>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let url = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let account_id = tracking.accounts.resolve(&req);

    tracking
        .instrumentation
        .run(
            || next.run(req),
            move || request_metadata(url, method, account_id),
        )
        .await
}

fn request_metadata(url: String, method: String, account_id: Option<AccountId>) -> Metadata {
    let thread = std::thread::current();
    let worker = format!("{}/{:?}", thread.name().unwrap_or("unnamed"), thread.id());

    let mut meta = Metadata::new();
    meta.insert("url".into(), url.into());
    meta.insert("request_method".into(), method.into());
    meta.insert("worker".into(), worker.into());
    if let Some(id) = account_id {
        meta.insert("account_id".into(), id.into());
    }
    host_metadata(&mut meta);
    meta
}
