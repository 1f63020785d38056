//! Process-wide MedSync counters.
//!
//! The diff engine, the retry scheduler and the event store bump these as
//! they work. Nothing is logged per increment above `trace`; read the totals
//! with [`Metrics::snapshot`] or log them once with [`Metrics::flush`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    diffs_computed: AtomicU64,
    events_ingested: AtomicU64,
    retries_scheduled: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub diffs_computed: u64,
    pub events_ingested: u64,
    pub retries_scheduled: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            diffs_computed: AtomicU64::new(0),
            events_ingested: AtomicU64::new(0),
            retries_scheduled: AtomicU64::new(0),
        }
    }

    fn bump(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = name, "counter incremented");
    }

    pub fn inc_diffs_computed(&self) {
        Self::bump(&self.diffs_computed, "diffs_computed");
    }

    pub fn inc_events_ingested(&self) {
        Self::bump(&self.events_ingested, "events_ingested");
    }

    pub fn inc_retries_scheduled(&self) {
        Self::bump(&self.retries_scheduled, "retries_scheduled");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            diffs_computed: self.diffs_computed.load(Ordering::Relaxed),
            events_ingested: self.events_ingested.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
        }
    }

    /// Log the current totals as one `info!` record.
    pub fn flush(&self) {
        let totals = self.snapshot();
        tracing::info!(
            metric = "flush",
            diffs_computed = totals.diffs_computed,
            events_ingested = totals.events_ingested,
            retries_scheduled = totals.retries_scheduled,
        );
    }

    pub fn reset(&self) {
        for counter in [
            &self.diffs_computed,
            &self.events_ingested,
            &self.retries_scheduled,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
