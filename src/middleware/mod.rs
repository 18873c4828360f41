//! Instrumentation adapters.
//!
//! Both adapters share [`Instrumentation`]: measure around the wrapped work,
//! gate the sample, and hand candidates to the tracker. The work's output is
//! always returned untouched; tracking problems are logged, never raised.

pub mod account;
pub mod job;
pub mod request;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::metrics::{CallCounters, MemoryProbe, Metadata, Phase, Sample, TrackType, Tracker};

/// What happened to one instrumented call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Tracking is switched off; nothing was measured
    Disabled,
    /// The memory probe failed; nothing was evaluated
    Unmeasured,
    /// Within the warm-up window
    Warming,
    /// Measured but below a threshold
    BelowThreshold,
    /// Persisted by the tracker
    Tracked,
    /// Passed gating but the store rejected it
    Failed,
}

/// Threshold policy. Both comparisons are strict.
pub fn passes_thresholds(config: &Config, sample: &Sample) -> bool {
    sample.memory_diff_mb > config.memory_threshold_mb
        && sample.before_mb > config.ram_before_threshold_mb
}

/// Measurement and gating shared by the request and job adapters.
#[derive(Clone)]
pub struct Instrumentation {
    tracker: Arc<Tracker>,
    counters: Arc<CallCounters>,
    probe: Arc<dyn MemoryProbe>,
    track_type: TrackType,
}

impl Instrumentation {
    pub fn new(tracker: Arc<Tracker>, track_type: TrackType, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            counters: tracker.counters(track_type),
            tracker,
            probe,
            track_type,
        }
    }

    pub fn counters(&self) -> &CallCounters {
        &self.counters
    }

    /// Run `work`, measuring it, and return its output unchanged.
    ///
    /// `metadata` is only evaluated when the sample is going to be stored.
    pub async fn run<W, Fut, T, M>(&self, work: W, metadata: M) -> T
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        M: FnOnce() -> Metadata,
    {
        self.run_with_outcome(work, metadata).await.0
    }

    pub async fn run_with_outcome<W, Fut, T, M>(&self, work: W, metadata: M) -> (T, Outcome)
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        M: FnOnce() -> Metadata,
    {
        let call_no = self.counters.record_call();

        if !self.tracker.config().enabled {
            return (work().await, Outcome::Disabled);
        }

        // Early calls carry one-time class/module loading growth.
        let phase = self.counters.admit(call_no);

        let before_mb = match self.probe.resident_mb() {
            Ok(mb) => mb,
            Err(e) => {
                tracing::warn!(error = %e, track_type = %self.track_type, "memory probe failed before call");
                return (work().await, Outcome::Unmeasured);
            }
        };

        let started = Instant::now();
        let output = work().await;
        let elapsed = started.elapsed();

        let after_mb = match self.probe.resident_mb() {
            Ok(mb) => mb,
            Err(e) => {
                tracing::warn!(error = %e, track_type = %self.track_type, "memory probe failed after call");
                return (output, Outcome::Unmeasured);
            }
        };

        let sample = Sample::from_readings(before_mb, after_mb, elapsed);
        let outcome = self.evaluate(call_no, phase, &sample, metadata).await;
        (output, outcome)
    }

    async fn evaluate<M>(&self, call_no: u64, phase: Phase, sample: &Sample, metadata: M) -> Outcome
    where
        M: FnOnce() -> Metadata,
    {
        if phase == Phase::Warming {
            tracing::trace!(call_no, memory_diff = sample.memory_diff_mb, "warm-up call skipped");
            return Outcome::Warming;
        }

        if !passes_thresholds(self.tracker.config(), sample) {
            return Outcome::BelowThreshold;
        }

        let persisted = async {
            self.tracker.record_tracked(self.track_type).await?;
            self.tracker.track(sample, self.track_type, metadata()).await
        };
        match persisted.await {
            Ok(()) => Outcome::Tracked,
            Err(e) => {
                tracing::warn!(error = %e, track_type = %self.track_type, "failed to record memory sample");
                Outcome::Failed
            }
        }
    }
}

/// Process-level fields common to both adapters.
pub(crate) fn host_metadata(meta: &mut Metadata) {
    if let Ok(dyno) = std::env::var("DYNO") {
        meta.insert("dyno".into(), dyno.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn thresholds_are_strict() {
        let config = Config {
            memory_threshold_mb: 1.0,
            ram_before_threshold_mb: 100.0,
            ..Config::default()
        };
        let at = |before, after| Sample::from_readings(before, after, Duration::ZERO);

        assert!(passes_thresholds(&config, &at(150.0, 152.0)));
        assert!(!passes_thresholds(&config, &at(150.0, 151.0)), "diff equal to threshold");
        assert!(!passes_thresholds(&config, &at(100.0, 110.0)), "before equal to threshold");
        assert!(!passes_thresholds(&config, &at(150.0, 140.0)), "memory released");
    }
}
