//! Users, patients and prescriptions, plus the request shapes hosts validate
//! before touching the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MedsyncError, Result};

/// Who a session acts as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Doctor,
    Pharmacist,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Pharmacist => "pharmacist",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = MedsyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "doctor" => Ok(Role::Doctor),
            "pharmacist" => Ok(Role::Pharmacist),
            other => Err(MedsyncError::invalid(format!("unknown role: {}", other))),
        }
    }
}

/// A verified caller identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    /// ISO date of birth, `YYYY-MM-DD`.
    pub dob: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    New,
    Dispensed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// `Session::user_id` of the prescribing doctor.
    pub doctor_id: String,
    pub drug: String,
    pub dosage: String,
    pub quantity: u32,
    pub instructions: String,
    pub status: PrescriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const MIN_INSTRUCTIONS_LEN: usize = 3;

fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MedsyncError::invalid(format!("{} must not be blank", field)));
    }
    Ok(())
}

fn check_quantity(quantity: u32) -> Result<()> {
    if quantity < 1 {
        return Err(MedsyncError::invalid("quantity must be at least 1"));
    }
    Ok(())
}

fn check_instructions(instructions: &str) -> Result<()> {
    if instructions.chars().count() < MIN_INSTRUCTIONS_LEN {
        return Err(MedsyncError::invalid(format!(
            "instructions must be at least {} characters",
            MIN_INSTRUCTIONS_LEN
        )));
    }
    Ok(())
}

/// Body of a create request (doctor only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewPrescription {
    pub patient_id: Uuid,
    pub drug: String,
    pub dosage: String,
    pub quantity: u32,
    pub instructions: String,
}

impl NewPrescription {
    pub fn validate(&self) -> Result<()> {
        if self.patient_id.is_nil() {
            return Err(MedsyncError::invalid("patient_id must be set"));
        }
        require_non_blank("drug", &self.drug)?;
        require_non_blank("dosage", &self.dosage)?;
        check_quantity(self.quantity)?;
        check_instructions(&self.instructions)
    }
}

/// Partial edit by a doctor. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrescriptionPatch {
    #[serde(default)]
    pub drug: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl PrescriptionPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(drug) = &self.drug {
            require_non_blank("drug", drug)?;
        }
        if let Some(dosage) = &self.dosage {
            require_non_blank("dosage", dosage)?;
        }
        if let Some(quantity) = self.quantity {
            check_quantity(quantity)?;
        }
        if let Some(instructions) = &self.instructions {
            check_instructions(instructions)?;
        }
        Ok(())
    }
}

/// Terminal states a pharmacist may move a prescription into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusChange {
    Dispensed,
    Cancelled,
}

impl From<StatusChange> for PrescriptionStatus {
    fn from(change: StatusChange) -> Self {
        match change {
            StatusChange::Dispensed => PrescriptionStatus::Dispensed,
            StatusChange::Cancelled => PrescriptionStatus::Cancelled,
        }
    }
}

/// An update request; which variant is allowed depends on the caller's role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrescriptionUpdate {
    Edit(PrescriptionPatch),
    SetStatus { status: StatusChange },
}

impl PrescriptionUpdate {
    pub fn validate(&self) -> Result<()> {
        match self {
            PrescriptionUpdate::Edit(patch) => patch.validate(),
            PrescriptionUpdate::SetStatus { .. } => Ok(()),
        }
    }
}

/// What a role sees when listing prescriptions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrescriptionListing {
    pub prescriptions: Vec<Prescription>,
    pub patients: Vec<Patient>,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> NewPrescription {
        NewPrescription {
            patient_id: Uuid::new_v4(),
            drug: "Amoxicillin 500mg".to_string(),
            dosage: "500mg".to_string(),
            quantity: 30,
            instructions: "Take one capsule every 8 hours".to_string(),
        }
    }

    #[test]
    fn new_prescription_validation() {
        assert!(valid_request().validate().is_ok());

        let mut zero = valid_request();
        zero.quantity = 0;
        assert!(zero.validate().is_err());

        let mut terse = valid_request();
        terse.instructions = "qd".to_string();
        assert!(terse.validate().is_err());

        let mut blank = valid_request();
        blank.drug = "   ".to_string();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn empty_patch_is_valid() {
        assert!(PrescriptionPatch::default().validate().is_ok());
        let bad = PrescriptionPatch {
            quantity: Some(0),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Doctor".parse::<Role>().unwrap(), Role::Doctor);
        assert_eq!(" pharmacist ".parse::<Role>().unwrap(), Role::Pharmacist);
        assert!("nurse".parse::<Role>().is_err());
    }

    #[test]
    fn status_update_serializes_tagged() {
        let update = PrescriptionUpdate::SetStatus {
            status: StatusChange::Dispensed,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "set_status", "status": "dispensed"})
        );
    }
}
