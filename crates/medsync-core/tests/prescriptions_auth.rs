//! End-to-end prescribing workflow: login, then role-gated prescription edits.

use chrono::{TimeZone, Utc};
use medsync_core::{
    Authenticator, LoginRequest, ManualClock, MedsyncConfig, MedsyncError, NewPrescription,
    PrescriptionPatch, PrescriptionStatus, PrescriptionStore, PrescriptionUpdate, Role, Session,
    StatusChange,
};

struct Fixture {
    auth: Authenticator,
    store: PrescriptionStore,
    doctor: Session,
    pharmacist: Session,
}

fn fixture() -> Fixture {
    let clock = ManualClock::shared(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    let config = MedsyncConfig::default()
        .with_token_secret("workflow-secret")
        .with_pbkdf2_rounds(1_000);
    let auth = Authenticator::with_demo_users(&config, clock.clone()).unwrap();

    let (doc_token, _) = auth
        .authenticate(&LoginRequest::new("doc@gmail.com", "doctor123"))
        .unwrap();
    let (pharm_token, _) = auth
        .authenticate(&LoginRequest::new("pharm@gmail.com", "pharm123"))
        .unwrap();
    let doctor = auth.resolve(&doc_token).unwrap();
    let pharmacist = auth.resolve(&pharm_token).unwrap();

    let store = PrescriptionStore::with_demo_data(clock, &doctor.user_id);
    Fixture {
        auth,
        store,
        doctor,
        pharmacist,
    }
}

fn new_request(patient_id: uuid::Uuid) -> NewPrescription {
    NewPrescription {
        patient_id,
        drug: "Lisinopril 10mg".to_string(),
        dosage: "10mg".to_string(),
        quantity: 90,
        instructions: "Once daily".to_string(),
    }
}

#[test]
fn test_demo_users_resolve_to_roles() {
    let f = fixture();
    assert_eq!(f.doctor.role, Role::Doctor);
    assert_eq!(f.pharmacist.role, Role::Pharmacist);

    let doctor = f.auth.find_by_email("doc@gmail.com").unwrap();
    assert_eq!(doctor.name, "Dr. Alice Carter");
    assert_eq!(doctor.id, f.doctor.user_id);
}

#[test]
fn test_doctor_creates_and_pharmacist_dispenses() {
    let f = fixture();
    let patient = f.store.patients()[1].clone();

    let created = f.store.create(&f.doctor, new_request(patient.id)).unwrap();
    assert_eq!(created.status, PrescriptionStatus::New);
    assert_eq!(created.doctor_id, f.doctor.user_id);

    let listing = f.store.list_for(&f.doctor);
    assert_eq!(listing.prescriptions.len(), 2);
    assert_eq!(listing.prescriptions[0].id, created.id);

    let dispensed = f
        .store
        .update(
            &f.pharmacist,
            created.id,
            PrescriptionUpdate::SetStatus {
                status: StatusChange::Dispensed,
            },
        )
        .unwrap();
    assert_eq!(dispensed.status, PrescriptionStatus::Dispensed);
}

#[test]
fn test_pharmacist_cannot_create_or_delete() {
    let f = fixture();
    let patient = f.store.patients()[0].clone();

    let err = f
        .store
        .create(&f.pharmacist, new_request(patient.id))
        .unwrap_err();
    assert!(matches!(err, MedsyncError::Forbidden(_)));

    let id = f.store.list_for(&f.pharmacist).prescriptions[0].id;
    let err = f.store.delete(&f.pharmacist, id).unwrap_err();
    assert!(matches!(err, MedsyncError::Forbidden(_)));
}

#[test]
fn test_unknown_patient_is_rejected() {
    let f = fixture();
    let err = f
        .store
        .create(&f.doctor, new_request(uuid::Uuid::new_v4()))
        .unwrap_err();
    assert!(matches!(err, MedsyncError::InvalidArgument(_)));
}

#[test]
fn test_doctor_edits_then_deletes() {
    let f = fixture();
    let id = f.store.list_for(&f.doctor).prescriptions[0].id;

    let edited = f
        .store
        .update(
            &f.doctor,
            id,
            PrescriptionUpdate::Edit(PrescriptionPatch {
                quantity: Some(21),
                ..Default::default()
            }),
        )
        .unwrap();
    assert_eq!(edited.quantity, 21);
    assert_eq!(edited.drug, "Amoxicillin 500mg");

    let invalid = f.store.update(
        &f.doctor,
        id,
        PrescriptionUpdate::Edit(PrescriptionPatch {
            instructions: Some("x".to_string()),
            ..Default::default()
        }),
    );
    assert!(matches!(invalid, Err(MedsyncError::InvalidArgument(_))));

    f.store.delete(&f.doctor, id).unwrap();
    assert!(f.store.list_for(&f.pharmacist).prescriptions.is_empty());
}

#[test]
fn test_forged_token_cannot_escalate() {
    let f = fixture();
    let (token, _) = f
        .auth
        .authenticate(&LoginRequest::new("doc@gmail.com", "doctor123"))
        .unwrap();
    let mut forged = token.clone();
    forged.pop();
    forged.push(if token.ends_with('0') { '1' } else { '0' });

    assert!(matches!(
        f.auth.resolve(&forged),
        Err(MedsyncError::Unauthorized(_))
    ));
}
