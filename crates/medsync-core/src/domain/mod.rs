//! Domain models for MedSync.
//!
//! Canonical definitions for the core entities:
//! - `MedicationItem` / `MedicationDiff`: medication list reconciliation
//! - `IntegrationJob`, `SyncEvent`, `MappingRecord`: integration event store records
//! - `Prescription`, `Patient`, `Session`: prescribing workflow

pub mod error;
pub mod integration;
pub mod medication;
pub mod prescription;

// Re-export main types and errors
pub use error::{MedsyncError, Result};
pub use integration::{
    EventDirection, EventStatus, IngestRequest, IntegrationJob, IntegrationKpis, JobMetrics,
    JobStatus, ManualSyncResult, MappingCandidate, MappingRecord, MappingStatus,
    MappingSuggestion, SyncEvent,
};
pub use medication::{parse_medication_list, MedicationChange, MedicationDiff, MedicationItem};
pub use prescription::{
    NewPrescription, Patient, Prescription, PrescriptionListing, PrescriptionPatch,
    PrescriptionStatus, PrescriptionUpdate, Role, Session, StatusChange,
};
