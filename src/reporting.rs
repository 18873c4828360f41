//! Read-side views over the tracker: dashboard summaries, console text, and
//! the user-facing clear action.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::metrics::{Stats, TrackType, TrackedRecord, Tracker};

/// Items listed by the text rendering.
const TEXT_TOP_ITEMS: usize = 10;

/// Everything the dashboard shows for one namespace.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub track_type: TrackType,
    pub enabled: bool,
    pub stats: Option<Stats>,
    pub max_item: Option<TrackedRecord>,
    pub top_items: Vec<TrackedRecord>,
}

#[derive(Clone)]
pub struct Reporter {
    tracker: Arc<Tracker>,
}

impl Reporter {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        Self { tracker }
    }

    /// Structured summary. When tracking is off, stats and lists are empty.
    pub async fn summary(&self, track_type: TrackType, limit: Option<usize>) -> Result<Summary> {
        if !self.tracker.config().enabled {
            return Ok(Summary {
                track_type,
                enabled: false,
                stats: None,
                max_item: None,
                top_items: Vec::new(),
            });
        }

        let limit = limit.unwrap_or(self.tracker.config().max_stored_urls);
        Ok(Summary {
            track_type,
            enabled: true,
            stats: Some(self.tracker.stats(track_type).await?),
            max_item: self.tracker.max_record(track_type).await?,
            top_items: self.tracker.top(track_type, limit).await?,
        })
    }

    /// Console-style rendering of one namespace.
    pub async fn render_text(&self, track_type: TrackType) -> Result<String> {
        let stats = self.tracker.stats(track_type).await?;
        let label = track_type.item_label();

        let mut out = String::new();
        let _ = writeln!(out, "=== Memory Usage Stats ({track_type}) ===");
        let _ = writeln!(out, "Max memory difference: {} MB", stats.max_memory_diff);
        let _ = writeln!(out, "Stored {label}: {}/{}", stats.stored_count, stats.max_stored);
        let _ = writeln!(out, "Tracking: {}", stats.tracking);

        if stats.stored_count > 0 {
            let _ = writeln!(out, "\nTop {TEXT_TOP_ITEMS} memory usage {label}:");
            let top = self.tracker.top(track_type, TEXT_TOP_ITEMS).await?;
            for (i, item) in top.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{}. {} MB ({} → {} MB) - {} ({})",
                    i + 1,
                    item.memory_diff,
                    item.ram_before,
                    item.ram_after,
                    item.subject().unwrap_or("unknown"),
                    item.recorded_at,
                );
            }
        }

        Ok(out)
    }

    /// Wipe all tracking data and describe what was removed.
    ///
    /// Never fails: errors come back as a displayable message.
    pub async fn clear(&self) -> String {
        match self.try_clear().await {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "clearing memory statistics failed");
                format!("❌ Error clearing memory statistics: {e}")
            }
        }
    }

    async fn try_clear(&self) -> Result<String> {
        let web = self.tracker.stats(TrackType::Web).await?;
        let worker = self.tracker.stats(TrackType::Worker).await?;
        self.tracker.clear_all().await?;

        Ok(format!(
            "✅ All memory usage statistics have been reset successfully! \
             Cleared {} URLs and {} jobs and reset max memory diff from {} MB \
             (jobs: {} MB) to 0.0 MB.",
            web.stored_count, worker.stored_count, web.max_memory_diff, worker.max_memory_diff,
        ))
    }
}
