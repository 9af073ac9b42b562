//! Fuzz target for the session resolver state machine
//!
//! Ensure last-writer-wins identity handling across arbitrary event
//! interleavings (HIGH priority)
//!
//! # Strategy
//!
//! - Small identity pool so stale and current ids collide often
//! - Lookup results in every shape: missing, patient, unknown role,
//!   malformed body, store error
//! - Stray signals: onboarding completions and retries in every state
//!
//! # Invariants
//!
//! - The resolver never panics
//! - The held identity always matches the latest identity notification
//! - Release actions name the prior owner, attach actions the current one

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use medbox_client::{SessionAction, SessionEvent, SessionResolver, SessionState};
use medbox_core::{
    Document, DocumentId, Environment, Identity, IdentityId, MedboxId, ProfileRecord, StoreError,
    Timestamp,
};

#[derive(Debug, Clone, Arbitrary)]
enum ResolverOp {
    SignIn { who: u8 },
    SignOut,
    ProfileLoaded { who: u8, outcome: LookupOutcome },
    ProfileCreated { who: u8 },
    Retry,
}

#[derive(Debug, Clone, Arbitrary)]
enum LookupOutcome {
    Missing,
    Patient,
    UnknownRole,
    MalformedBody { raw: Vec<u8> },
    StoreError,
}

#[derive(Clone)]
struct FixedEnv;

impl Environment for FixedEnv {
    fn now(&self) -> Timestamp {
        Timestamp(0)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(7);
    }
}

fuzz_target!(|ops: Vec<ResolverOp>| {
    let mut resolver = SessionResolver::new();
    let mut latest: Option<Option<IdentityId>> = None;

    for op in ops {
        let prior = resolver.state().identity().map(|i| i.id.clone());
        let event = match op {
            ResolverOp::SignIn { who } => {
                let identity = identity(who);
                latest = Some(Some(identity.id.clone()));
                SessionEvent::IdentityChanged(Some(identity))
            }
            ResolverOp::SignOut => {
                latest = Some(None);
                SessionEvent::IdentityChanged(None)
            }
            ResolverOp::ProfileLoaded { who, outcome } => SessionEvent::ProfileLoaded {
                identity: identity(who).id,
                result: lookup_result(who, &outcome),
            },
            ResolverOp::ProfileCreated { who } => {
                SessionEvent::ProfileCreated { identity: identity(who).id }
            }
            ResolverOp::Retry => SessionEvent::Retry,
        };

        let actions = resolver.handle(event);
        let current = resolver.state().identity().map(|i| i.id.clone());

        for action in &actions {
            match action {
                SessionAction::ReleaseCollections { owner } => {
                    assert_eq!(Some(owner), prior.as_ref());
                }
                SessionAction::AttachCollections { owner } => {
                    assert_eq!(Some(owner), current.as_ref());
                }
                SessionAction::LoadProfile { identity } => {
                    assert_eq!(Some(&identity.id), current.as_ref());
                }
                SessionAction::Render => {}
            }
        }

        match &latest {
            None => assert!(matches!(resolver.state(), SessionState::Loading)),
            Some(None) => assert!(matches!(resolver.state(), SessionState::Unauthenticated)),
            Some(Some(id)) => {
                assert_eq!(resolver.state().identity().map(|i| &i.id), Some(id));
            }
        }
    }
});

fn identity(who: u8) -> Identity {
    // Keep the pool tiny so ids collide across events.
    let who = who % 3;
    Identity::new(format!("uid-{who}"), format!("user{who}@example.com"))
}

fn lookup_result(who: u8, outcome: &LookupOutcome) -> Result<Option<Document>, StoreError> {
    match outcome {
        LookupOutcome::Missing => Ok(None),
        LookupOutcome::Patient => Ok(Some(profile_doc(who, "patient"))),
        LookupOutcome::UnknownRole => Ok(Some(profile_doc(who, "clinician"))),
        LookupOutcome::MalformedBody { raw } => Ok(Some(Document {
            id: DocumentId::new(format!("uid-{who}")),
            order_key: Timestamp::ZERO,
            body: Bytes::copy_from_slice(raw),
        })),
        LookupOutcome::StoreError => Err(StoreError::Io("backend down".to_string())),
    }
}

fn profile_doc(who: u8, role: &str) -> Document {
    let record = ProfileRecord {
        role: role.to_string(),
        name: "Ada".to_string(),
        medbox_id: MedboxId::generate(&FixedEnv),
    };
    Document::encode(DocumentId::new(format!("uid-{who}")), Timestamp::ZERO, &record)
        .expect("profile records always encode")
}
