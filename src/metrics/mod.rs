pub mod counters;
pub mod probe;
pub mod stream;
pub mod tracker;

pub use counters::{CallCounters, Phase};
pub use probe::{MemoryProbe, ProcessMemoryProbe};
pub use tracker::{Stats, TrackType, TrackedRecord, Tracker};

use std::collections::BTreeMap;
use std::time::Duration;

/// Caller-supplied fields identifying the unit of work (url, job class, ...).
/// Opaque to the tracker; flattened into the stored record.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A single memory observation around one instrumented call.
/// Adapters build these and hand them to the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Resident memory before the call (MB)
    pub before_mb: f64,
    /// Resident memory after the call (MB)
    pub after_mb: f64,
    /// `after_mb - before_mb`; negative when memory was released
    pub memory_diff_mb: f64,
    /// Wall time of the call (seconds)
    pub execution_time_s: f64,
}

impl Sample {
    /// Build a sample from raw readings, rounding every field to 2 decimals.
    pub fn from_readings(before_mb: f64, after_mb: f64, elapsed: Duration) -> Self {
        Self {
            before_mb: round2(before_mb),
            after_mb: round2(after_mb),
            memory_diff_mb: round2(after_mb - before_mb),
            execution_time_s: round2(elapsed.as_secs_f64()),
        }
    }
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_are_rounded() {
        let s = Sample::from_readings(100.004, 112.3456, Duration::from_millis(1234));
        assert_eq!(s.before_mb, 100.0);
        assert_eq!(s.after_mb, 112.35);
        assert_eq!(s.memory_diff_mb, 12.34);
        assert_eq!(s.execution_time_s, 1.23);
    }

    #[test]
    fn diff_can_be_negative() {
        let s = Sample::from_readings(250.0, 240.5, Duration::ZERO);
        assert_eq!(s.memory_diff_mb, -9.5);
        assert_eq!(s.execution_time_s, 0.0);
    }
}
