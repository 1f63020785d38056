//! Integration jobs, sync events, code mappings and dashboard KPIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an integration job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
}

/// Counters reported by a finished job. Absent fields were not measured.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meds_processed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<u64>,
}

/// A unit of integration work (e.g. `MED_LIST_PULL`, `DISPENSE_PUSH`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrationJob {
    pub id: Uuid,
    pub kind: String,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub metrics: Option<JobMetrics>,
}

/// Which side of the integration an event flowed toward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Received,
    Processing,
    Success,
    Error,
}

/// A record of one inbound or outbound integration occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncEvent {
    pub id: Uuid,
    /// Groups the events belonging to one logical exchange (audit trail key).
    pub correlation_id: Uuid,
    pub direction: EventDirection,
    pub kind: String,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What a host hands the event store when ingesting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestRequest {
    pub kind: String,
    pub direction: EventDirection,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl IngestRequest {
    pub fn new(kind: impl Into<String>, direction: EventDirection) -> Self {
        Self {
            kind: kind.into(),
            direction,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    Pending,
    Resolved,
    Deprecated,
}

/// A source-system drug code awaiting (or holding) a pharmacy catalogue target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingRecord {
    pub id: Uuid,
    pub source_code: String,
    /// Coding system of `source_code` (e.g. `RxNorm`, `NDC`).
    pub system: String,
    pub target_id: Option<String>,
    pub status: MappingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingCandidate {
    pub target_id: String,
    pub confidence: f64,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingSuggestion {
    pub source_code: String,
    pub candidates: Vec<MappingCandidate>,
}

/// Dashboard aggregates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IntegrationKpis {
    /// Fraction of stored events with status `Success`, in `0.0..=1.0`.
    pub success_rate: f64,
    pub avg_latency_ms: u64,
    pub pending_mappings: usize,
    pub retry_queue: usize,
}

impl Default for IntegrationKpis {
    fn default() -> Self {
        Self {
            success_rate: 1.0,
            avg_latency_ms: 0,
            pending_mappings: 0,
            retry_queue: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManualSyncResult {
    pub job_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(
            serde_json::to_string(&EventDirection::Out).unwrap(),
            "\"out\""
        );
        assert_eq!(
            serde_json::to_string(&MappingStatus::Deprecated).unwrap(),
            "\"deprecated\""
        );
    }

    #[test]
    fn job_metrics_omit_unmeasured_fields() {
        let metrics = JobMetrics {
            meds_processed: Some(125),
            changes: Some(2),
            events: None,
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json, serde_json::json!({"meds_processed": 125, "changes": 2}));
    }

    #[test]
    fn ingest_request_defaults_payload_to_null() {
        let req: IngestRequest =
            serde_json::from_str(r#"{"kind":"DISPENSE","direction":"in"}"#).unwrap();
        assert_eq!(req.payload, serde_json::Value::Null);
        assert_eq!(req.direction, EventDirection::In);
    }
}
