//! Property tests for the session resolver.
//!
//! Random event sequences exercise the last-writer-wins contract: whatever
//! interleaving of identity changes, lookup results, onboarding signals, and
//! retries arrives, the resolver's state always reflects the most recent
//! identity notification, and subscription actions always name the right
//! owner.

use medbox_client::{SessionAction, SessionEvent, SessionResolver, SessionState};
use medbox_core::{
    Document, DocumentId, Environment, Identity, IdentityId, MedboxId, ProfileRecord, StoreError,
    Timestamp,
};
use proptest::prelude::*;

#[derive(Clone)]
struct StubEnv;

impl Environment for StubEnv {
    fn now(&self) -> Timestamp {
        Timestamp(0)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(7);
    }
}

fn identity(n: u8) -> Identity {
    Identity::new(format!("uid-{n}"), format!("user{n}@example.com"))
}

fn profile_doc(identity: &Identity, role: &str) -> Document {
    let record = ProfileRecord {
        role: role.to_string(),
        name: "Ada".to_string(),
        medbox_id: MedboxId::generate(&StubEnv),
    };
    Document::encode(DocumentId::from(&identity.id), Timestamp::ZERO, &record)
        .unwrap_or_else(|_| unreachable!("profile records always encode"))
}

fn event_strategy() -> impl Strategy<Value = SessionEvent> {
    prop_oneof![
        (0u8..3).prop_map(|n| SessionEvent::IdentityChanged(Some(identity(n)))),
        Just(SessionEvent::IdentityChanged(None)),
        (0u8..3, 0u8..4).prop_map(|(n, kind)| SessionEvent::ProfileLoaded {
            identity: identity(n).id,
            result: match kind {
                0 => Ok(None),
                1 => Ok(Some(profile_doc(&identity(n), "patient"))),
                2 => Ok(Some(profile_doc(&identity(n), "clinician"))),
                _ => Err(StoreError::Io("backend down".to_string())),
            },
        }),
        (0u8..3).prop_map(|n| SessionEvent::ProfileCreated { identity: identity(n).id }),
        Just(SessionEvent::Retry),
    ]
}

proptest! {
    /// The held identity always matches the latest identity notification,
    /// regardless of when slow lookup results or stray signals land.
    #[test]
    fn identity_follows_the_latest_notification(
        events in proptest::collection::vec(event_strategy(), 0..40)
    ) {
        let mut resolver = SessionResolver::new();
        // None until the first notification arrives.
        let mut latest: Option<Option<IdentityId>> = None;

        for event in events {
            if let SessionEvent::IdentityChanged(identity) = &event {
                latest = Some(identity.as_ref().map(|i| i.id.clone()));
            }
            let _ = resolver.handle(event);

            match &latest {
                None => prop_assert_eq!(resolver.state(), &SessionState::Loading),
                Some(None) => {
                    prop_assert_eq!(resolver.state(), &SessionState::Unauthenticated);
                },
                Some(Some(id)) => {
                    prop_assert_eq!(resolver.state().identity().map(|i| &i.id), Some(id));
                },
            }
        }
    }

    /// Subscriptions are only ever released for the identity held before an
    /// event and only ever attached for the identity held after it.
    #[test]
    fn subscription_actions_name_the_right_owner(
        events in proptest::collection::vec(event_strategy(), 0..40)
    ) {
        let mut resolver = SessionResolver::new();

        for event in events {
            let prior = resolver.state().identity().map(|i| i.id.clone());
            let actions = resolver.handle(event);
            let current = resolver.state().identity().map(|i| i.id.clone());

            for action in &actions {
                match action {
                    SessionAction::ReleaseCollections { owner } => {
                        prop_assert_eq!(Some(owner), prior.as_ref());
                    },
                    SessionAction::AttachCollections { owner } => {
                        prop_assert_eq!(Some(owner), current.as_ref());
                    },
                    SessionAction::LoadProfile { identity } => {
                        prop_assert_eq!(Some(&identity.id), current.as_ref());
                    },
                    SessionAction::Render => {},
                }
            }
        }
    }

    /// A lookup result for any identity other than the one being resolved is
    /// discarded without effect.
    #[test]
    fn stale_lookup_results_are_inert(
        n in 0u8..3,
        stale in 0u8..3,
        kind in 0u8..4,
    ) {
        prop_assume!(n != stale);

        let current = identity(n);
        let mut resolver = SessionResolver::new();
        let _ = resolver.handle(SessionEvent::IdentityChanged(Some(current.clone())));
        let before = resolver.state().clone();

        let result = match kind {
            0 => Ok(None),
            1 => Ok(Some(profile_doc(&identity(stale), "patient"))),
            2 => Ok(Some(profile_doc(&identity(stale), "clinician"))),
            _ => Err(StoreError::Io("backend down".to_string())),
        };
        let actions = resolver.handle(SessionEvent::ProfileLoaded {
            identity: identity(stale).id,
            result,
        });

        prop_assert!(actions.is_empty());
        prop_assert_eq!(resolver.state(), &before);
    }
}
