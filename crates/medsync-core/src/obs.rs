//! Structured observability hooks for MedSync integration activity.
//!
//! This module provides:
//! - A sync-scoped tracing span via the `SyncSpan` RAII guard
//! - Emission functions for reconciliation, retry, ingestion and job events
//!
//! Every emitter logs with an `event = "..."` field so log pipelines can
//! filter on it. For JSON output, start binaries with `--json-logs`.

use tracing::{info, warn};

/// RAII guard that enters a span tagged with a job or correlation id.
///
/// # Example
///
/// ```ignore
/// let _span = SyncSpan::enter("job-1234");
/// // tracing calls inside now carry sync_id = "job-1234"
/// ```
pub struct SyncSpan {
    _span: tracing::span::EnteredSpan,
}

impl SyncSpan {
    pub fn enter(sync_id: &str) -> Self {
        let span = tracing::info_span!("medsync.sync", sync_id = %sync_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a medication list was reconciled against the snapshot.
pub fn emit_diff_computed(added: usize, removed: usize, changed: usize, snapshot_len: usize) {
    info!(
        event = "diff.computed",
        added = added,
        removed = removed,
        changed = changed,
        snapshot_len = snapshot_len,
    );
}

/// Emit event: a failed sync event was (re)queued.
pub fn emit_retry_scheduled(event_id: &str, attempts: u32, delay_secs: i64) {
    info!(
        event = "retry.scheduled",
        event_id = %event_id,
        attempts = attempts,
        delay_secs = delay_secs,
    );
}

/// Emit event: a retry entry was removed after a successful attempt.
pub fn emit_retry_acknowledged(event_id: &str, attempts: u32) {
    info!(event = "retry.acknowledged", event_id = %event_id, attempts = attempts);
}

/// Emit event: a sync event entered the store. Failures log at warn level.
pub fn emit_event_ingested(event_id: &str, kind: &str, direction: &str, error: Option<&str>) {
    match error {
        None => info!(
            event = "event.ingested",
            event_id = %event_id,
            kind = %kind,
            direction = %direction,
        ),
        Some(error) => warn!(
            event = "event.failed",
            event_id = %event_id,
            kind = %kind,
            direction = %direction,
            error = %error,
        ),
    }
}

/// Emit event: an integration job reached a terminal state.
pub fn emit_job_completed(job_id: &str, kind: &str, success: bool) {
    info!(event = "job.completed", job_id = %job_id, kind = %kind, success = success);
}
