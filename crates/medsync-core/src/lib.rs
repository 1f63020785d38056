//! MedSync Core Library
//!
//! Medication reconciliation, retry scheduling and the in-memory integration
//! event store behind the MedSync EHR/pharmacy bridge.

pub mod auth;
pub mod clock;
pub mod config;
pub mod diff;
pub mod domain;
pub mod integration;
pub mod mapping;
pub mod metrics;
pub mod obs;
pub mod prescriptions;
pub mod retry;
pub mod telemetry;

pub use domain::{
    parse_medication_list, EventDirection, EventStatus, IngestRequest, IntegrationJob,
    IntegrationKpis, JobMetrics, JobStatus, ManualSyncResult, MappingCandidate, MappingRecord,
    MappingStatus, MappingSuggestion, MedicationChange, MedicationDiff, MedicationItem,
    MedsyncError, NewPrescription, Patient, Prescription, PrescriptionListing, PrescriptionPatch,
    PrescriptionStatus, PrescriptionUpdate, Result, Role, Session, StatusChange, SyncEvent,
};

pub use auth::{Authenticator, LoginRequest, PasswordHash, SessionSigner, User};
pub use clock::{system_clock, Clock, ManualClock, SystemClock};
pub use config::MedsyncConfig;
pub use diff::MedicationDiffEngine;
pub use integration::{default_snapshot, IntegrationService, DISPENSE_PUSH, MED_LIST_PULL};
pub use mapping::suggest_mappings;
pub use prescriptions::PrescriptionStore;
pub use retry::{RetryEntry, RetryPolicy, RetryScheduler};

pub use metrics::{MetricsSnapshot, METRICS};
pub use obs::{
    emit_diff_computed, emit_event_ingested, emit_job_completed, emit_retry_acknowledged,
    emit_retry_scheduled, SyncSpan,
};
pub use telemetry::init_tracing;

/// MedSync version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
