//! In-memory integration event store.
//!
//! [`IntegrationService`] is the single owner of the EHR/pharmacy integration
//! state: jobs, sync events, code mappings, dashboard KPIs, the medication
//! snapshot and the retry queue. All of it sits behind one mutex, so the
//! snapshot read-modify-write in a diff and the find-or-insert in a retry are
//! each atomic with respect to other callers.
//!
//! Failed ingestions feed the retry scheduler exactly once per event. New
//! events are also fanned out on a broadcast channel for live views.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Duration;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::MedsyncConfig;
use crate::diff::MedicationDiffEngine;
use crate::domain::{
    EventDirection, EventStatus, IngestRequest, IntegrationJob, IntegrationKpis, JobMetrics,
    JobStatus, ManualSyncResult, MappingRecord, MappingStatus, MappingSuggestion, MedicationDiff,
    MedicationItem, MedsyncError, Result, SyncEvent,
};
use crate::mapping::suggest_mappings;
use crate::metrics::METRICS;
use crate::obs::{emit_event_ingested, emit_job_completed, SyncSpan};
use crate::retry::{RetryEntry, RetryScheduler};

/// Job kind used by manual and scheduled medication list pulls.
pub const MED_LIST_PULL: &str = "MED_LIST_PULL";
pub const DISPENSE_PUSH: &str = "DISPENSE_PUSH";

const EVENT_STREAM_CAPACITY: usize = 64;

/// Medication list the demo snapshot starts from.
pub fn default_snapshot() -> Vec<MedicationItem> {
    vec![
        MedicationItem::new("RXNORM:111", "10mg"),
        MedicationItem::new("RXNORM:222", "5mg"),
    ]
}

struct ServiceState {
    jobs: Vec<IntegrationJob>,
    events: Vec<SyncEvent>,
    mappings: Vec<MappingRecord>,
    kpis: IntegrationKpis,
    medications: MedicationDiffEngine,
    retries: RetryScheduler,
}

impl ServiceState {
    fn recalc_kpis(&mut self) {
        let successes = self
            .events
            .iter()
            .filter(|e| e.status == EventStatus::Success)
            .count();
        let total = self.events.len().max(1);
        self.kpis.success_rate = successes as f64 / total as f64;
        self.kpis.pending_mappings = self
            .mappings
            .iter()
            .filter(|m| m.status == MappingStatus::Pending)
            .count();
    }
}

pub struct IntegrationService {
    config: MedsyncConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<ServiceState>,
    events_tx: broadcast::Sender<SyncEvent>,
}

impl IntegrationService {
    /// Empty stores and an empty medication snapshot.
    pub fn new(config: MedsyncConfig, clock: Arc<dyn Clock>) -> Self {
        let state = ServiceState {
            jobs: Vec::new(),
            events: Vec::new(),
            mappings: Vec::new(),
            kpis: IntegrationKpis::default(),
            medications: MedicationDiffEngine::default(),
            retries: RetryScheduler::new(config.retry, clock.clone()),
        };
        Self::from_state(config, clock, state)
    }

    /// Demo fixtures: two past jobs, twelve successful events, two pending
    /// mappings and the [`default_snapshot`].
    pub fn with_seed_data(config: MedsyncConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();

        let jobs = vec![
            IntegrationJob {
                id: Uuid::new_v4(),
                kind: MED_LIST_PULL.to_string(),
                status: JobStatus::Success,
                started_at: Some(now - Duration::seconds(60)),
                finished_at: Some(now - Duration::seconds(30)),
                metrics: Some(JobMetrics {
                    meds_processed: Some(120),
                    changes: Some(5),
                    events: None,
                }),
            },
            IntegrationJob {
                id: Uuid::new_v4(),
                kind: DISPENSE_PUSH.to_string(),
                status: JobStatus::Failed,
                started_at: Some(now - Duration::seconds(180)),
                finished_at: Some(now - Duration::seconds(175)),
                metrics: Some(JobMetrics {
                    events: Some(42),
                    ..Default::default()
                }),
            },
        ];

        let events = (0..12i64)
            .map(|i| SyncEvent {
                id: Uuid::new_v4(),
                correlation_id: Uuid::new_v4(),
                direction: if i % 2 == 0 {
                    EventDirection::In
                } else {
                    EventDirection::Out
                },
                kind: if i % 3 == 0 {
                    "PRESCRIPTION_NEW".to_string()
                } else {
                    "DISPENSE".to_string()
                },
                status: EventStatus::Success,
                created_at: now - Duration::seconds(i * 15),
                payload: serde_json::json!({ "example": true }),
                error: None,
            })
            .collect();

        let mappings = [("12345", "RxNorm"), ("67890", "NDC")]
            .iter()
            .map(|(code, system)| MappingRecord {
                id: Uuid::new_v4(),
                source_code: code.to_string(),
                system: system.to_string(),
                target_id: None,
                status: MappingStatus::Pending,
                created_at: now,
                updated_at: None,
            })
            .collect();

        let state = ServiceState {
            jobs,
            events,
            mappings,
            kpis: IntegrationKpis {
                success_rate: 0.982,
                avg_latency_ms: 420,
                pending_mappings: 2,
                retry_queue: 3,
            },
            medications: MedicationDiffEngine::new(default_snapshot()),
            retries: RetryScheduler::new(config.retry, clock.clone()),
        };
        Self::from_state(config, clock, state)
    }

    fn from_state(config: MedsyncConfig, clock: Arc<dyn Clock>, state: ServiceState) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_STREAM_CAPACITY);
        Self {
            config,
            clock,
            state: Mutex::new(state),
            events_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Jobs
    // -----------------------------------------------------------------------

    /// Record a new running job of `kind`.
    pub fn persist_sync_job(&self, kind: &str) -> IntegrationJob {
        let job = IntegrationJob {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            status: JobStatus::Running,
            started_at: Some(self.clock.now()),
            finished_at: None,
            metrics: None,
        };
        let mut state = self.lock();
        state.jobs.insert(0, job.clone());
        state.jobs.truncate(self.config.job_capacity);
        debug!(job_id = %job.id, kind = %kind, "job persisted");
        job
    }

    pub fn complete_job(
        &self,
        id: Uuid,
        ok: bool,
        metrics: Option<JobMetrics>,
    ) -> Result<IntegrationJob> {
        let finished_at = self.clock.now();
        let mut state = self.lock();
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(MedsyncError::JobNotFound(id))?;
        job.status = if ok {
            JobStatus::Success
        } else {
            JobStatus::Failed
        };
        job.finished_at = Some(finished_at);
        job.metrics = metrics;
        let job = job.clone();
        state.recalc_kpis();
        drop(state);

        emit_job_completed(&job.id.to_string(), &job.kind, ok);
        Ok(job)
    }

    /// Pull the medication list from the EHR on demand.
    ///
    /// Neither the store lock nor the sync span is held across the simulated
    /// round trip, so the returned future stays `Send`.
    pub async fn trigger_manual_sync(&self) -> ManualSyncResult {
        let job = self.persist_sync_job(MED_LIST_PULL);

        tokio::time::sleep(self.config.manual_sync_latency).await;

        let _span = SyncSpan::enter(&job.id.to_string());
        self.ingest_event(
            IngestRequest::new(MED_LIST_PULL, EventDirection::In)
                .with_payload(serde_json::json!({ "source": "EHR" })),
        );
        let metrics = JobMetrics {
            meds_processed: Some(125),
            changes: Some(2),
            events: None,
        };
        // The job was inserted above; it can only be missing if more than
        // `job_capacity` jobs were persisted during the sleep.
        if let Err(err) = self.complete_job(job.id, true, Some(metrics)) {
            tracing::warn!(event = "job.evicted", job_id = %job.id, error = %err);
        }
        ManualSyncResult { job_id: job.id }
    }

    pub fn jobs(&self) -> Vec<IntegrationJob> {
        self.lock().jobs.clone()
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Store a successful event.
    pub fn ingest_event(&self, req: IngestRequest) -> SyncEvent {
        self.record_event(req, None)
    }

    /// Store a failed event and queue it for retry.
    pub fn ingest_failure_event(&self, req: IngestRequest, error: impl Into<String>) -> SyncEvent {
        self.record_event(req, Some(error.into()))
    }

    fn record_event(&self, req: IngestRequest, error: Option<String>) -> SyncEvent {
        let event = SyncEvent {
            id: Uuid::new_v4(),
            correlation_id: Uuid::new_v4(),
            direction: req.direction,
            kind: req.kind,
            status: if error.is_some() {
                EventStatus::Error
            } else {
                EventStatus::Success
            },
            created_at: self.clock.now(),
            payload: req.payload,
            error,
        };

        {
            let mut state = self.lock();
            state.events.insert(0, event.clone());
            state.events.truncate(self.config.event_capacity);
            if event.status == EventStatus::Error {
                state.retries.schedule_retry(&event.id.to_string());
                state.kpis.retry_queue = state.retries.len();
            }
            state.recalc_kpis();
        }

        METRICS.inc_events_ingested();
        emit_event_ingested(
            &event.id.to_string(),
            &event.kind,
            direction_label(event.direction),
            event.error.as_deref(),
        );
        // Sending only fails when nobody is subscribed.
        let _ = self.events_tx.send(event.clone());
        event
    }

    /// Live feed of newly ingested events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events_tx.subscribe()
    }

    /// Up to `limit` events, newest first.
    pub fn events(&self, limit: usize) -> Vec<SyncEvent> {
        self.lock().events.iter().take(limit).cloned().collect()
    }

    /// All stored events sharing `correlation_id`, newest first.
    pub fn audit_trail(&self, correlation_id: Uuid) -> Vec<SyncEvent> {
        self.lock()
            .events
            .iter()
            .filter(|e| e.correlation_id == correlation_id)
            .cloned()
            .collect()
    }

    // -----------------------------------------------------------------------
    // Mappings
    // -----------------------------------------------------------------------

    pub fn mappings(&self) -> Vec<MappingRecord> {
        self.lock().mappings.clone()
    }

    pub fn resolve_mapping(&self, id: Uuid, target_id: &str) -> Result<MappingRecord> {
        if target_id.trim().is_empty() {
            return Err(MedsyncError::invalid("mapping target must not be blank"));
        }
        let updated_at = self.clock.now();
        let mut state = self.lock();
        let mapping = state
            .mappings
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(MedsyncError::MappingNotFound(id))?;
        mapping.target_id = Some(target_id.to_string());
        mapping.status = MappingStatus::Resolved;
        mapping.updated_at = Some(updated_at);
        let mapping = mapping.clone();
        state.recalc_kpis();
        Ok(mapping)
    }

    pub fn mapping_suggestions(&self, source_code: &str) -> MappingSuggestion {
        suggest_mappings(source_code)
    }

    // -----------------------------------------------------------------------
    // Medication reconciliation
    // -----------------------------------------------------------------------

    pub fn compute_medication_diff(&self, new_list: &[MedicationItem]) -> MedicationDiff {
        self.lock().medications.compute_diff(new_list)
    }

    pub fn medication_snapshot(&self) -> Vec<MedicationItem> {
        self.lock().medications.snapshot().to_vec()
    }

    // -----------------------------------------------------------------------
    // Retries
    // -----------------------------------------------------------------------

    pub fn schedule_retry(&self, event_id: &str) -> RetryEntry {
        let mut state = self.lock();
        let entry = state.retries.schedule_retry(event_id);
        state.kpis.retry_queue = state.retries.len();
        entry
    }

    pub fn acknowledge_retry(&self, event_id: &str) -> Option<RetryEntry> {
        let mut state = self.lock();
        let entry = state.retries.acknowledge_retry(event_id);
        state.kpis.retry_queue = state.retries.len();
        entry
    }

    /// Pending retries in first-failure order.
    pub fn retry_queue(&self) -> Vec<RetryEntry> {
        self.lock().retries.entries().to_vec()
    }

    pub fn kpis(&self) -> IntegrationKpis {
        self.lock().kpis
    }
}

fn direction_label(direction: EventDirection) -> &'static str {
    match direction {
        EventDirection::In => "in",
        EventDirection::Out => "out",
    }
}
