//! Resident-memory growth tracking for request and job execution.
//!
//! Adapters measure RSS around each unit of work, gate the sample (warm-up
//! skip, then thresholds) and hand candidates to the [`Tracker`], which keeps
//! a running max and a bounded, ranked set of the worst offenders per
//! namespace in a shared [`Store`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod reporting;
pub mod server;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use metrics::{Metadata, Sample, Stats, TrackType, TrackedRecord, Tracker};
pub use store::Store;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::metrics::MemoryProbe;
use crate::middleware::job::JobAdapter;
use crate::middleware::request::RequestTracking;
use crate::reporting::Reporter;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Tracker over the injected store; owns both namespaces' counters.
    pub tracker: Arc<Tracker>,

    /// Read side for the dashboard endpoints.
    pub reporter: Reporter,

    /// State for the request middleware (web namespace).
    pub requests: RequestTracking,

    /// Job adapter (worker namespace).
    pub jobs: JobAdapter,

    /// Memory the demo endpoints hold on to so RSS growth is visible.
    ballast: Mutex<Vec<Vec<u8>>>,
}

impl AppState {
    pub fn new(tracker: Arc<Tracker>, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            reporter: Reporter::new(Arc::clone(&tracker)),
            requests: RequestTracking::new(Arc::clone(&tracker), Arc::clone(&probe)),
            jobs: JobAdapter::new(Arc::clone(&tracker), probe),
            tracker,
            ballast: Mutex::new(Vec::new()),
        }
    }

    /// Allocate and keep `mb` megabytes, touching every page.
    /// Returns the number of chunks now retained.
    pub fn retain_ballast(&self, mb: u64) -> usize {
        let mut ballast = self.ballast.lock();
        if mb > 0 {
            ballast.push(vec![1u8; (mb as usize) * 1024 * 1024]);
        }
        ballast.len()
    }
}
