//! End-to-end portal flows against the in-memory harness.
//!
//! Every test drives a full [`Portal`] over `MemoryGateway`, `MemoryStore`,
//! and a seeded `SimEnv`, the exact wiring production uses with the real
//! services swapped in.

use medbox_app::{Portal, PortalError, ViewState};
use medbox_client::{OnboardingError, SaltedDigestHasher, SyncError};
use medbox_core::{
    CollectionRef, ConsultationRecord, DocPath, Document, DocumentId, DocumentStore, IdentityId,
    PatientSecret, RecordCollection, RecordId, StoreError, Timestamp,
};
use medbox_harness::{FaultTarget, MemoryGateway, MemoryStore, SimEnv};

type TestPortal = Portal<MemoryGateway, MemoryStore, SimEnv, SaltedDigestHasher<SimEnv>>;

fn portal(seed: u64) -> (MemoryGateway, MemoryStore, TestPortal) {
    let gateway = MemoryGateway::new();
    let store = MemoryStore::new();
    let env = SimEnv::with_seed(seed);
    let portal = Portal::new(
        gateway.clone(),
        store.clone(),
        SaltedDigestHasher::new(env.clone()),
        env,
    );
    (gateway, store, portal)
}

fn med_scope(owner: &str) -> CollectionRef {
    CollectionRef::new(RecordCollection::Medications, IdentityId::new(owner))
}

async fn onboarded(seed: u64) -> (MemoryGateway, MemoryStore, TestPortal) {
    let (gateway, store, mut portal) = portal(seed);
    portal.sign_up("ada@example.com", "secret1").await.unwrap();
    portal.submit_profile("Ada", "1234", "1234").await.unwrap();
    (gateway, store, portal)
}

#[tokio::test]
async fn startup_with_no_identity_is_signed_out() {
    let (_gateway, _store, mut portal) = portal(1);
    portal.pump().await;
    assert_eq!(portal.view(), ViewState::SignedOut);
}

#[tokio::test]
async fn sign_up_without_profile_lands_on_onboarding() {
    let (_gateway, _store, mut portal) = portal(1);
    portal.sign_up("ada@example.com", "secret1").await.unwrap();
    match portal.view() {
        ViewState::CreateProfile { identity } => {
            assert_eq!(identity.email, "ada@example.com");
        },
        other => panic!("expected CreateProfile, got {other:?}"),
    }
}

#[tokio::test]
async fn onboarding_routes_to_an_empty_portal() {
    let (_gateway, _store, portal) = onboarded(1).await;
    match portal.view() {
        ViewState::PatientPortal(view) => {
            assert_eq!(view.profile.name, "Ada");
            assert!(view.profile.medbox_id.as_str().starts_with("MB-"));
            assert!(view.medications.is_empty());
            assert!(view.consultations.is_empty());
            assert!(view.medications_live);
            assert!(view.consultations_live);
        },
        other => panic!("expected PatientPortal, got {other:?}"),
    }
}

#[tokio::test]
async fn stored_secret_holds_a_derivative_not_the_pin() {
    let (_gateway, store, _portal) = onboarded(1).await;

    let doc = store
        .get(&DocPath::patient_secret(&IdentityId::new("uid-0")))
        .await
        .unwrap()
        .unwrap();
    let secret: PatientSecret = doc.decode().unwrap();
    let (salt, digest) = secret.pin_hash.as_str().split_once('$').unwrap();
    // Salt and digest hex only; the clear PIN is gone.
    assert_eq!(salt.len(), 32);
    assert_eq!(digest.len(), 64);
    assert!(salt.bytes().chain(digest.bytes()).all(|b| b.is_ascii_hexdigit()));
}

#[tokio::test]
async fn medications_round_trip_through_the_store() {
    let (_gateway, _store, mut portal) = onboarded(1).await;

    let first = portal.add_medication("Paracetamol", "500mg").await.unwrap();
    let second = portal.add_medication("Ibuprofen", "200mg").await.unwrap();

    match portal.view() {
        ViewState::PatientPortal(view) => {
            // Newest first.
            assert_eq!(view.medications[0].id, second);
            assert_eq!(view.medications[1].id, first);
        },
        other => panic!("expected PatientPortal, got {other:?}"),
    }

    portal.remove_medication(&first).await.unwrap();
    match portal.view() {
        ViewState::PatientPortal(view) => {
            assert_eq!(view.medications.len(), 1);
            assert_eq!(view.medications[0].name, "Ibuprofen");
        },
        other => panic!("expected PatientPortal, got {other:?}"),
    }
}

#[tokio::test]
async fn blank_medication_fields_are_rejected_before_any_write() {
    let (_gateway, store, mut portal) = onboarded(1).await;
    let writes_before = store.set_log().len();

    let err = portal.add_medication("   ", "500mg").await.unwrap_err();
    assert_eq!(err, PortalError::Sync(SyncError::EmptyField { field: "name" }));
    assert_eq!(store.set_log().len(), writes_before);
}

#[tokio::test]
async fn sign_out_releases_every_subscription() {
    let (_gateway, store, mut portal) = onboarded(1).await;
    assert_eq!(store.subscriber_count(), 2);

    portal.sign_out().await;
    assert_eq!(portal.view(), ViewState::SignedOut);
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn profile_read_failure_is_retryable() {
    let (_gateway, store, mut portal) = portal(1);
    store.set_read_fault(FaultTarget::Profiles, StoreError::Io("backend down".to_string()));

    portal.sign_up("ada@example.com", "secret1").await.unwrap();
    assert!(matches!(portal.view(), ViewState::ResolutionFailed { .. }));

    store.clear_read_fault(FaultTarget::Profiles);
    portal.retry_resolution().await;
    assert!(matches!(portal.view(), ViewState::CreateProfile { .. }));
}

#[tokio::test]
async fn failed_profile_write_leaves_onboarding_recoverable() {
    let (_gateway, store, mut portal) = portal(1);
    portal.sign_up("ada@example.com", "secret1").await.unwrap();

    store.set_write_fault(FaultTarget::Profiles, StoreError::Io("backend down".to_string()));
    let err = portal.submit_profile("Ada", "1234", "1234").await.unwrap_err();
    assert!(matches!(err, PortalError::Onboarding(OnboardingError::Store(_))));

    // Still onboarding, and the orphaned secret was cleaned up.
    assert!(matches!(portal.view(), ViewState::CreateProfile { .. }));
    assert!(
        store
            .delete_log()
            .iter()
            .any(|p| matches!(p, DocPath::PatientSecret(_)))
    );

    store.clear_write_fault(FaultTarget::Profiles);
    portal.submit_profile("Ada", "1234", "1234").await.unwrap();
    assert!(matches!(portal.view(), ViewState::PatientPortal(_)));
}

#[tokio::test]
async fn invalid_pin_makes_no_writes() {
    let (_gateway, store, mut portal) = portal(1);
    portal.sign_up("ada@example.com", "secret1").await.unwrap();
    let writes_before = store.set_log().len();

    let err = portal.submit_profile("Ada", "123", "123").await.unwrap_err();
    assert_eq!(err, PortalError::Onboarding(OnboardingError::PinTooShort));
    let err = portal.submit_profile("Ada", "1234", "4321").await.unwrap_err();
    assert_eq!(err, PortalError::Onboarding(OnboardingError::PinMismatch));
    assert_eq!(store.set_log().len(), writes_before);
}

#[tokio::test]
async fn submit_profile_outside_onboarding_is_rejected() {
    let (_gateway, _store, mut portal) = onboarded(1).await;
    let err = portal.submit_profile("Ada", "1234", "1234").await.unwrap_err();
    assert_eq!(err, PortalError::InvalidState);
}

#[tokio::test]
async fn sync_loss_flags_the_view_and_resync_recovers() {
    let (_gateway, store, mut portal) = onboarded(1).await;
    portal.add_medication("Paracetamol", "500mg").await.unwrap();

    store.drop_feeds(&med_scope("uid-0"));
    assert!(portal.next_turn().await);
    match portal.view() {
        ViewState::PatientPortal(view) => {
            assert!(!view.medications_live);
            assert!(view.consultations_live);
            // Last good list is still shown.
            assert_eq!(view.medications.len(), 1);
        },
        other => panic!("expected PatientPortal, got {other:?}"),
    }

    portal.resync().await.unwrap();
    match portal.view() {
        ViewState::PatientPortal(view) => {
            assert!(view.medications_live);
            assert_eq!(view.medications.len(), 1);
        },
        other => panic!("expected PatientPortal, got {other:?}"),
    }
}

#[tokio::test]
async fn consultations_written_by_the_clinic_appear_newest_first() {
    let (_gateway, store, mut portal) = onboarded(1).await;

    // Consultations reach the store through the clinical workflow, never
    // through portal commands; writing them directly takes the same path.
    let scope = CollectionRef::new(RecordCollection::Consultations, IdentityId::new("uid-0"));
    let visits = [("c1", 100, "Dr. Vos"), ("c2", 300, "Dr. Holt"), ("c3", 200, "Dr. Vos")];
    for (id, date, doctor) in visits {
        let record = ConsultationRecord {
            id: RecordId::new(id),
            date: Timestamp(date),
            doctor_name: doctor.to_string(),
            typed_notes: "follow-up".to_string(),
        };
        let doc = Document::encode(DocumentId::from(&record.id), record.date, &record).unwrap();
        store
            .set(&DocPath::record(scope.clone(), record.id.clone()), doc)
            .await
            .unwrap();
    }
    portal.pump().await;

    match portal.view() {
        ViewState::PatientPortal(view) => {
            let dates: Vec<u64> = view.consultations.iter().map(|c| c.date.millis()).collect();
            assert_eq!(dates, vec![300, 200, 100]);
            assert_eq!(view.consultations[0].doctor_name, "Dr. Holt");
            assert!(view.medications.is_empty());
        },
        other => panic!("expected PatientPortal, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_subscribe_at_routing_is_recoverable_by_resync() {
    let (_gateway, store, mut portal) = portal(1);
    store.set_read_fault(
        FaultTarget::Records(RecordCollection::Medications),
        StoreError::Io("backend down".to_string()),
    );
    store.set_read_fault(
        FaultTarget::Records(RecordCollection::Consultations),
        StoreError::Io("backend down".to_string()),
    );

    portal.sign_up("ada@example.com", "secret1").await.unwrap();
    portal.submit_profile("Ada", "1234", "1234").await.unwrap();
    match portal.view() {
        ViewState::PatientPortal(view) => {
            assert!(!view.medications_live);
            assert!(!view.consultations_live);
        },
        other => panic!("expected PatientPortal, got {other:?}"),
    }

    store.clear_read_fault(FaultTarget::Records(RecordCollection::Medications));
    store.clear_read_fault(FaultTarget::Records(RecordCollection::Consultations));
    portal.resync().await.unwrap();
    match portal.view() {
        ViewState::PatientPortal(view) => {
            assert!(view.medications_live);
            assert!(view.consultations_live);
        },
        other => panic!("expected PatientPortal, got {other:?}"),
    }
}

#[tokio::test]
async fn switching_accounts_never_leaks_the_prior_list() {
    let (_gateway, _store, mut portal) = onboarded(1).await;
    portal.add_medication("Paracetamol", "500mg").await.unwrap();

    portal.sign_out().await;
    portal.sign_up("bob@example.com", "secret2").await.unwrap();
    portal.submit_profile("Bob", "9876", "9876").await.unwrap();

    match portal.view() {
        ViewState::PatientPortal(view) => {
            assert_eq!(view.profile.name, "Bob");
            assert!(view.medications.is_empty());
        },
        other => panic!("expected PatientPortal, got {other:?}"),
    }
}

#[tokio::test]
async fn view_channel_publishes_renders() {
    let (_gateway, _store, mut portal) = portal(1);
    let mut rx = portal.watch_view();

    portal.sign_up("ada@example.com", "secret1").await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert!(matches!(*rx.borrow_and_update(), ViewState::CreateProfile { .. }));

    portal.submit_profile("Ada", "1234", "1234").await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert!(matches!(*rx.borrow_and_update(), ViewState::PatientPortal(_)));
}
