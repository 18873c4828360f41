//! Process-local call counters for one adapter domain.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Gating state of an adapter domain. `Warming` → `Active` happens once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Warming,
    Active,
}

/// Call counters shared between an adapter and the tracker that reports them.
///
/// Not synchronized across processes; with several processes on one store
/// these are per-process approximations.
#[derive(Debug)]
pub struct CallCounters {
    skip_requests: u64,
    total: AtomicU64,
    skipped: AtomicU64,
    warmed: AtomicBool,
}

impl CallCounters {
    pub fn new(skip_requests: u64) -> Self {
        Self {
            skip_requests,
            total: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            warmed: AtomicBool::new(false),
        }
    }

    /// Count one observed call and return its 1-based sequence number.
    pub fn record_call(&self) -> u64 {
        self.total.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decide the phase of call `call_no`, counting it as skipped if warming.
    pub fn admit(&self, call_no: u64) -> Phase {
        if call_no > self.skip_requests || self.warmed.load(Ordering::Acquire) {
            return Phase::Active;
        }
        self.skipped.fetch_add(1, Ordering::Relaxed);
        Phase::Warming
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Zero the counts. A domain that already left warm-up stays active.
    pub fn reset(&self) {
        let seen = self.total.swap(0, Ordering::Relaxed);
        if seen > self.skip_requests {
            self.warmed.store(true, Ordering::Release);
        }
        self.skipped.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_calls_are_warming() {
        let c = CallCounters::new(3);
        let phases: Vec<Phase> = (0..5).map(|_| c.admit(c.record_call())).collect();
        assert_eq!(
            phases,
            vec![
                Phase::Warming,
                Phase::Warming,
                Phase::Warming,
                Phase::Active,
                Phase::Active
            ]
        );
        assert_eq!(c.total(), 5);
        assert_eq!(c.skipped(), 3);
    }

    #[test]
    fn zero_skip_is_active_immediately() {
        let c = CallCounters::new(0);
        assert_eq!(c.admit(c.record_call()), Phase::Active);
        assert_eq!(c.skipped(), 0);
    }

    #[test]
    fn reset_keeps_active_domain_active() {
        let c = CallCounters::new(2);
        for _ in 0..3 {
            c.admit(c.record_call());
        }
        c.reset();
        assert_eq!(c.total(), 0);
        assert_eq!(c.skipped(), 0);
        assert_eq!(c.admit(c.record_call()), Phase::Active);
    }
}
