#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use memhealth::metrics::MemoryProbe;
use memhealth::store::MemoryStore;
use memhealth::{Config, Error, Metadata, Sample, Tracker};

/// Probe that replays a fixed list of readings, then fails.
#[derive(Default)]
pub struct ScriptedProbe {
    readings: Mutex<VecDeque<f64>>,
}

impl ScriptedProbe {
    pub fn new(readings: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            readings: Mutex::new(readings.iter().copied().collect()),
        })
    }

    /// Readings for `calls` calls that each grow memory by `diff` from `base`.
    pub fn growing(calls: usize, base: f64, diff: f64) -> Arc<Self> {
        let readings: Vec<f64> = (0..calls).flat_map(|_| [base, base + diff]).collect();
        Self::new(&readings)
    }

    pub fn remaining(&self) -> usize {
        self.readings.lock().len()
    }
}

impl MemoryProbe for ScriptedProbe {
    fn resident_mb(&self) -> memhealth::Result<f64> {
        self.readings
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Probe("no scripted reading left".into()))
    }
}

pub fn enabled_config() -> Config {
    Config {
        enabled: true,
        skip_requests: 0,
        memory_threshold_mb: 1.0,
        ram_before_threshold_mb: 0.0,
        max_stored_urls: 20,
        ..Config::default()
    }
}

pub fn tracker_with(config: Config) -> (Arc<Tracker>, MemoryStore) {
    let store = MemoryStore::new();
    let tracker = Arc::new(Tracker::new(Arc::new(store.clone()), config));
    (tracker, store)
}

pub fn sample(diff: f64) -> Sample {
    Sample::from_readings(200.0, 200.0 + diff, std::time::Duration::from_millis(120))
}

pub fn meta(url: &str) -> Metadata {
    let mut m = Metadata::new();
    m.insert("url".into(), url.into());
    m
}
