//! Role-gated prescription store.
//!
//! Doctors write prescriptions and may only see their own; pharmacists see
//! every prescription and may only move it to a terminal status.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{
    MedsyncError, NewPrescription, Patient, Prescription, PrescriptionListing,
    PrescriptionStatus, PrescriptionUpdate, Result, Role, Session,
};

#[derive(Default)]
struct StoreState {
    patients: Vec<Patient>,
    prescriptions: Vec<Prescription>,
}

pub struct PrescriptionStore {
    clock: Arc<dyn Clock>,
    state: Mutex<StoreState>,
}

impl PrescriptionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Two demo patients and one prescription written by `doctor_id`.
    pub fn with_demo_data(clock: Arc<dyn Clock>, doctor_id: &str) -> Self {
        let store = Self::new(clock);
        let john = store.add_patient("John Doe", "1980-05-01");
        store.add_patient("Maria Gomez", "1975-11-20");

        let now = store.clock.now();
        store.lock().prescriptions.push(Prescription {
            id: Uuid::new_v4(),
            patient_id: john.id,
            doctor_id: doctor_id.to_string(),
            drug: "Amoxicillin 500mg".to_string(),
            dosage: "500mg".to_string(),
            quantity: 30,
            instructions: "Take one capsule every 8 hours for 10 days".to_string(),
            status: PrescriptionStatus::New,
            created_at: now,
            updated_at: now,
        });
        store
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_patient(&self, name: &str, dob: &str) -> Patient {
        let patient = Patient {
            id: Uuid::new_v4(),
            name: name.to_string(),
            dob: dob.to_string(),
        };
        self.lock().patients.push(patient.clone());
        patient
    }

    pub fn patients(&self) -> Vec<Patient> {
        self.lock().patients.clone()
    }

    pub fn list_for(&self, session: &Session) -> PrescriptionListing {
        let state = self.lock();
        let prescriptions = state
            .prescriptions
            .iter()
            .filter(|p| session.role == Role::Pharmacist || p.doctor_id == session.user_id)
            .cloned()
            .collect();
        PrescriptionListing {
            prescriptions,
            patients: state.patients.clone(),
            role: session.role,
        }
    }

    pub fn create(&self, session: &Session, req: NewPrescription) -> Result<Prescription> {
        require_role(session, Role::Doctor, "only doctors can create prescriptions")?;
        req.validate()?;

        let now = self.clock.now();
        let mut state = self.lock();
        if !state.patients.iter().any(|p| p.id == req.patient_id) {
            return Err(MedsyncError::invalid(format!(
                "unknown patient: {}",
                req.patient_id
            )));
        }
        let prescription = Prescription {
            id: Uuid::new_v4(),
            patient_id: req.patient_id,
            doctor_id: session.user_id.clone(),
            drug: req.drug,
            dosage: req.dosage,
            quantity: req.quantity,
            instructions: req.instructions,
            status: PrescriptionStatus::New,
            created_at: now,
            updated_at: now,
        };
        state.prescriptions.insert(0, prescription.clone());
        drop(state);

        info!(
            event = "prescription.created",
            prescription_id = %prescription.id,
            doctor_id = %prescription.doctor_id,
        );
        Ok(prescription)
    }

    pub fn update(
        &self,
        session: &Session,
        id: Uuid,
        update: PrescriptionUpdate,
    ) -> Result<Prescription> {
        match (&update, session.role) {
            (PrescriptionUpdate::Edit(_), Role::Doctor)
            | (PrescriptionUpdate::SetStatus { .. }, Role::Pharmacist) => {}
            (PrescriptionUpdate::Edit(_), _) => {
                return Err(MedsyncError::Forbidden(
                    "only doctors can edit prescriptions".to_string(),
                ))
            }
            (PrescriptionUpdate::SetStatus { .. }, _) => {
                return Err(MedsyncError::Forbidden(
                    "only pharmacists can change prescription status".to_string(),
                ))
            }
        }
        update.validate()?;

        let now = self.clock.now();
        let mut state = self.lock();
        let prescription = state
            .prescriptions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(MedsyncError::PrescriptionNotFound(id))?;

        match update {
            PrescriptionUpdate::Edit(patch) => {
                if let Some(drug) = patch.drug {
                    prescription.drug = drug;
                }
                if let Some(dosage) = patch.dosage {
                    prescription.dosage = dosage;
                }
                if let Some(quantity) = patch.quantity {
                    prescription.quantity = quantity;
                }
                if let Some(instructions) = patch.instructions {
                    prescription.instructions = instructions;
                }
            }
            PrescriptionUpdate::SetStatus { status } => {
                prescription.status = status.into();
            }
        }
        prescription.updated_at = now;
        let prescription = prescription.clone();
        drop(state);

        info!(
            event = "prescription.updated",
            prescription_id = %prescription.id,
            role = %session.role,
        );
        Ok(prescription)
    }

    pub fn delete(&self, session: &Session, id: Uuid) -> Result<()> {
        require_role(session, Role::Doctor, "only doctors can delete prescriptions")?;
        let mut state = self.lock();
        let before = state.prescriptions.len();
        state.prescriptions.retain(|p| p.id != id);
        if state.prescriptions.len() == before {
            return Err(MedsyncError::PrescriptionNotFound(id));
        }
        drop(state);

        info!(event = "prescription.deleted", prescription_id = %id);
        Ok(())
    }
}

fn require_role(session: &Session, role: Role, message: &str) -> Result<()> {
    if session.role != role {
        warn!(event = "prescription.forbidden", user_id = %session.user_id, role = %session.role);
        return Err(MedsyncError::Forbidden(message.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::{PrescriptionPatch, StatusChange};
    use chrono::{TimeZone, Utc};

    fn session(user_id: &str, role: Role) -> Session {
        Session {
            user_id: user_id.to_string(),
            role,
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn store() -> PrescriptionStore {
        let clock = ManualClock::shared(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
        PrescriptionStore::with_demo_data(clock, "doc-1")
    }

    #[test]
    fn demo_data_is_seeded() {
        let store = store();
        let listing = store.list_for(&session("doc-1", Role::Doctor));
        assert_eq!(listing.patients.len(), 2);
        assert_eq!(listing.prescriptions.len(), 1);
        assert_eq!(listing.prescriptions[0].drug, "Amoxicillin 500mg");
        assert_eq!(listing.role, Role::Doctor);
    }

    #[test]
    fn doctors_only_see_their_own() {
        let store = store();
        assert!(store
            .list_for(&session("doc-2", Role::Doctor))
            .prescriptions
            .is_empty());
        assert_eq!(
            store
                .list_for(&session("pharm-1", Role::Pharmacist))
                .prescriptions
                .len(),
            1
        );
    }

    #[test]
    fn pharmacist_cannot_edit() {
        let store = store();
        let id = store.list_for(&session("doc-1", Role::Doctor)).prescriptions[0].id;
        let err = store
            .update(
                &session("pharm-1", Role::Pharmacist),
                id,
                PrescriptionUpdate::Edit(PrescriptionPatch {
                    quantity: Some(10),
                    ..Default::default()
                }),
            )
            .unwrap_err();
        assert!(matches!(err, MedsyncError::Forbidden(_)));
    }

    #[test]
    fn doctor_cannot_dispense() {
        let store = store();
        let id = store.list_for(&session("doc-1", Role::Doctor)).prescriptions[0].id;
        let err = store
            .update(
                &session("doc-1", Role::Doctor),
                id,
                PrescriptionUpdate::SetStatus {
                    status: StatusChange::Dispensed,
                },
            )
            .unwrap_err();
        assert!(matches!(err, MedsyncError::Forbidden(_)));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = store();
        let err = store
            .delete(&session("doc-1", Role::Doctor), Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, MedsyncError::PrescriptionNotFound(_)));
    }
}
