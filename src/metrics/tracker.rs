//! Bounded top-K memory tracking engine.
//!
//! Every namespace keeps three things in the store: the running max score,
//! the record that produced it, and a sorted set of records scored by memory
//! delta, trimmed to `max_stored_urls` after each insert.
//!
//! Concurrent `track` calls are not coordinated. The max check-and-set is
//! last-write-wins and converges under repeated traffic; trimming always
//! leaves the set at or below the bound once all calls finish.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::counters::CallCounters;
use super::{Metadata, Sample};
use crate::config::Config;
use crate::error::Result;
use crate::store::Store;

// ─── Namespaces ──────────────────────────────────────────────────

/// Independent tracking namespace. Keys and counters never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    /// Inbound HTTP requests
    Web,
    /// Background jobs
    Worker,
}

impl TrackType {
    pub const ALL: [TrackType; 2] = [TrackType::Web, TrackType::Worker];

    /// Plural noun for user-facing text.
    pub fn unit(self) -> &'static str {
        match self {
            TrackType::Web => "requests",
            TrackType::Worker => "jobs",
        }
    }

    /// Plural noun for stored items.
    pub fn item_label(self) -> &'static str {
        match self {
            TrackType::Web => "URLs",
            TrackType::Worker => "jobs",
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrackType::Web => "web",
            TrackType::Worker => "worker",
        })
    }
}

impl FromStr for TrackType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "web" => Ok(TrackType::Web),
            "worker" => Ok(TrackType::Worker),
            other => Err(format!("unknown view '{other}', expected 'web' or 'worker'")),
        }
    }
}

/// Store keys for one namespace.
#[derive(Debug, Clone)]
struct Keys {
    max_diff: String,
    max_item: String,
    ranked: String,
    tracked: String,
}

impl Keys {
    fn new(prefix: &str, track_type: TrackType) -> Self {
        match track_type {
            TrackType::Web => Self {
                max_diff: format!("{prefix}:max_diff"),
                max_item: format!("{prefix}:max_diff_url"),
                ranked: format!("{prefix}:high_usage_urls"),
                tracked: format!("{prefix}:tracked_requests"),
            },
            TrackType::Worker => Self {
                max_diff: format!("{prefix}:worker:max_diff"),
                max_item: format!("{prefix}:worker:max_diff_job"),
                ranked: format!("{prefix}:worker:high_usage_jobs"),
                tracked: format!("{prefix}:worker:tracked_jobs"),
            },
        }
    }

    fn all(&self) -> [&String; 4] {
        [&self.max_diff, &self.max_item, &self.ranked, &self.tracked]
    }
}

// ─── Records ─────────────────────────────────────────────────────

/// Field names owned by the record; metadata may not override them.
const RESERVED_FIELDS: &[&str] = &[
    "memory_diff",
    "ram_before",
    "ram_after",
    "execution_time",
    "timestamp",
    "recorded_at",
];

/// One persisted sample. Serialized as a flat JSON object, which is also the
/// sorted-set member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRecord {
    pub memory_diff: f64,
    pub ram_before: f64,
    pub ram_after: f64,
    pub execution_time: f64,
    /// Epoch seconds
    pub timestamp: i64,
    /// RFC 3339, UTC
    pub recorded_at: String,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl TrackedRecord {
    pub fn new(sample: &Sample, mut metadata: Metadata, now: DateTime<Utc>) -> Self {
        metadata.retain(|k, _| !RESERVED_FIELDS.contains(&k.as_str()));
        Self {
            memory_diff: sample.memory_diff_mb,
            ram_before: sample.before_mb,
            ram_after: sample.after_mb,
            execution_time: sample.execution_time_s,
            timestamp: now.timestamp(),
            recorded_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            metadata,
        }
    }

    /// The url or job class this record was captured for, if known.
    pub fn subject(&self) -> Option<&str> {
        ["url", "worker_class"]
            .iter()
            .find_map(|k| self.metadata.get(*k).and_then(|v| v.as_str()))
    }

    fn decode(member: &str, score: f64) -> Option<Self> {
        match serde_json::from_str::<TrackedRecord>(member) {
            Ok(mut record) => {
                record.memory_diff = score;
                Some(record)
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed tracked record");
                None
            }
        }
    }
}

// ─── Stats ───────────────────────────────────────────────────────

/// Aggregate view of one namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub max_memory_diff: f64,
    pub stored_count: usize,
    pub max_stored: usize,
    /// Store-backed; shared by every process on the store
    pub tracked_count: u64,
    /// Process-local
    pub total_count: u64,
    /// Process-local
    pub skipped_count: u64,
    /// e.g. "12 requests tracked (10 skipped) out of 340 total requests"
    pub tracking: String,
}

// ─── Tracker ─────────────────────────────────────────────────────

/// Decides nothing about gating; records candidates handed in by adapters
/// and answers queries over what was recorded.
pub struct Tracker {
    store: Arc<dyn Store>,
    config: Config,
    web: Arc<CallCounters>,
    worker: Arc<CallCounters>,
}

impl Tracker {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self {
            web: Arc::new(CallCounters::new(config.skip_requests)),
            worker: Arc::new(CallCounters::new(config.skip_requests)),
            store,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Counters an adapter of `track_type` should count into.
    pub fn counters(&self, track_type: TrackType) -> Arc<CallCounters> {
        match track_type {
            TrackType::Web => Arc::clone(&self.web),
            TrackType::Worker => Arc::clone(&self.worker),
        }
    }

    fn keys(&self, track_type: TrackType) -> Keys {
        Keys::new(&self.config.key_prefix, track_type)
    }

    /// Persist one candidate sample: update the max, insert, trim.
    pub async fn track(
        &self,
        sample: &Sample,
        track_type: TrackType,
        metadata: Metadata,
    ) -> Result<()> {
        let keys = self.keys(track_type);
        let record = TrackedRecord::new(sample, metadata, Utc::now());
        let member = serde_json::to_string(&record)?;
        let diff = sample.memory_diff_mb;

        // Strict `>`: on a tie the earlier record keeps the max slot.
        let current_max = self.read_max(&keys).await?;
        if diff > current_max {
            self.store.set(&keys.max_diff, &diff.to_string()).await?;
            self.store.set(&keys.max_item, &member).await?;
            tracing::debug!(%track_type, memory_diff = diff, previous = current_max, "new max memory diff");
        }

        self.store.zadd(&keys.ranked, diff, &member).await?;

        let count = self.store.zcard(&keys.ranked).await?;
        let bound = self.config.max_stored_urls;
        if count > bound {
            // Single rank-range removal of the `count - bound` lowest members.
            let stop = (count - bound - 1) as isize;
            self.store.zremrangebyrank(&keys.ranked, 0, stop).await?;
        }

        tracing::info!(
            %track_type,
            memory_diff = diff,
            ram_before = sample.before_mb,
            ram_after = sample.after_mb,
            subject = record.subject().unwrap_or("-"),
            "tracked memory growth"
        );
        Ok(())
    }

    /// Bump the store-backed tracked counter.
    pub async fn record_tracked(&self, track_type: TrackType) -> Result<i64> {
        self.store.incr(&self.keys(track_type).tracked).await
    }

    pub async fn tracked_count(&self, track_type: TrackType) -> Result<u64> {
        let raw = self.store.get(&self.keys(track_type).tracked).await?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    async fn read_max(&self, keys: &Keys) -> Result<f64> {
        let Some(raw) = self.store.get(&keys.max_diff).await? else {
            return Ok(0.0);
        };
        Ok(raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key = %keys.max_diff, value = %raw, "unparseable max diff, treating as 0");
            0.0
        }))
    }

    /// Largest diff recorded since the last clear, 0.0 if none.
    pub async fn max_memory_diff(&self, track_type: TrackType) -> Result<f64> {
        self.read_max(&self.keys(track_type)).await
    }

    pub async fn max_record(&self, track_type: TrackType) -> Result<Option<TrackedRecord>> {
        match self.store.get(&self.keys(track_type).max_item).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Up to `limit` records, highest memory diff first.
    pub async fn top(&self, track_type: TrackType, limit: usize) -> Result<Vec<TrackedRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        // Negative stops count from the end of the set.
        let stop = isize::try_from(limit - 1).unwrap_or(isize::MAX);
        let members = self
            .store
            .zrevrange_withscores(&self.keys(track_type).ranked, 0, stop)
            .await?;
        Ok(members
            .iter()
            .filter_map(|(m, s)| TrackedRecord::decode(m, *s))
            .collect())
    }

    /// Every stored record with `memory_diff >= threshold`.
    pub async fn above(&self, track_type: TrackType, threshold: f64) -> Result<Vec<TrackedRecord>> {
        let members = self
            .store
            .zrangebyscore_withscores(&self.keys(track_type).ranked, threshold)
            .await?;
        Ok(members
            .iter()
            .filter_map(|(m, s)| TrackedRecord::decode(m, *s))
            .collect())
    }

    pub async fn stats(&self, track_type: TrackType) -> Result<Stats> {
        let keys = self.keys(track_type);
        let max_memory_diff = self.read_max(&keys).await?;
        let stored_count = self.store.zcard(&keys.ranked).await?;
        let tracked_count = self.tracked_count(track_type).await?;
        let counters = self.counters(track_type);
        let (total_count, skipped_count) = (counters.total(), counters.skipped());
        let unit = track_type.unit();

        Ok(Stats {
            max_memory_diff,
            stored_count,
            max_stored: self.config.max_stored_urls,
            tracked_count,
            total_count,
            skipped_count,
            tracking: format!(
                "{tracked_count} {unit} tracked ({skipped_count} skipped) out of {total_count} total {unit}"
            ),
        })
    }

    /// Delete every key of both namespaces and zero the local counters.
    ///
    /// Not a barrier: a `track` racing with this may or may not survive.
    pub async fn clear_all(&self) -> Result<()> {
        let keys: Vec<String> = TrackType::ALL
            .iter()
            .flat_map(|t| self.keys(*t).all().map(String::clone))
            .collect();
        self.store.del(&keys).await?;
        self.web.reset();
        self.worker.reset();
        tracing::info!(keys = keys.len(), "cleared memory tracking data");
        Ok(())
    }
}
