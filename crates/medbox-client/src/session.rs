//! Session and profile resolution state machine.
//!
//! The resolver owns the top-level lifecycle: unauthenticated, resolving the
//! profile for a signed-in identity, and the per-session terminal states
//! (routed portal, onboarding needed, unrecognized role, resolution failed).
//! It is a pure state machine: no I/O, fully testable in isolation.
//!
//! # Concurrency contract
//!
//! Identity notifications must be fed in emission order. Profile reads
//! complete asynchronously; a result is applied only if it matches the
//! identity currently being resolved, so a slow, stale read can never
//! overwrite the state produced by a newer identity change.

use medbox_core::{Identity, IdentityId, Profile, ProfileRecord, StoreError};

use crate::event::{SessionAction, SessionEvent};

/// Resolver state.
///
/// `Routed`, `NeedsProfile`, `UnrecognizedRole`, and `ResolutionFailed` are
/// terminal per session; all of them transition back to `Unauthenticated` on
/// sign-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Startup, before the first identity notification.
    Loading,

    /// No identity is signed in.
    Unauthenticated,

    /// An identity is signed in and its profile read is outstanding.
    ResolvingProfile {
        /// Identity being resolved.
        identity: Identity,
    },

    /// The identity has no profile document; onboarding is required.
    NeedsProfile {
        /// Identity awaiting onboarding.
        identity: Identity,
    },

    /// The identity resolved to a recognized role.
    Routed {
        /// Resolved identity.
        identity: Identity,
        /// Resolved profile.
        profile: Profile,
    },

    /// A profile document exists but its role is not recognized by this
    /// client. Terminal for the session; the user is told to contact
    /// support.
    UnrecognizedRole {
        /// Identity the profile belongs to.
        identity: Identity,
        /// Raw role string found in the document.
        role: String,
    },

    /// The profile read failed. Retryable via [`SessionEvent::Retry`].
    ResolutionFailed {
        /// Identity whose resolution failed.
        identity: Identity,
        /// Causing error.
        error: StoreError,
    },
}

impl SessionState {
    /// Identity held by this state, if any.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Loading | SessionState::Unauthenticated => None,
            SessionState::ResolvingProfile { identity }
            | SessionState::NeedsProfile { identity }
            | SessionState::Routed { identity, .. }
            | SessionState::UnrecognizedRole { identity, .. }
            | SessionState::ResolutionFailed { identity, .. } => Some(identity),
        }
    }
}

/// Session resolution state machine.
///
/// Consumes [`SessionEvent`]s and produces [`SessionAction`]s for the caller
/// to execute. No I/O dependencies.
#[derive(Debug, Clone)]
pub struct SessionResolver {
    state: SessionState,
}

impl Default for SessionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionResolver {
    /// Create a resolver in the initial loading state.
    pub fn new() -> Self {
        Self { state: SessionState::Loading }
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        match event {
            SessionEvent::IdentityChanged(identity) => self.handle_identity_changed(identity),
            SessionEvent::ProfileLoaded { identity, result } => {
                self.handle_profile_loaded(&identity, result)
            },
            SessionEvent::ProfileCreated { identity } => self.handle_profile_created(&identity),
            SessionEvent::Retry => self.handle_retry(),
        }
    }

    fn handle_identity_changed(&mut self, identity: Option<Identity>) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        // Release the prior identity's subscriptions before anything else;
        // this must be synchronous with the notification.
        if let Some(prior) = self.state.identity() {
            actions.push(SessionAction::ReleaseCollections { owner: prior.id.clone() });
        }

        match identity {
            None => {
                self.state = SessionState::Unauthenticated;
            },
            Some(identity) => {
                actions.push(SessionAction::LoadProfile { identity: identity.clone() });
                self.state = SessionState::ResolvingProfile { identity };
            },
        }

        actions.push(SessionAction::Render);
        actions
    }

    fn handle_profile_loaded(
        &mut self,
        identity: &IdentityId,
        result: Result<Option<medbox_core::Document>, StoreError>,
    ) -> Vec<SessionAction> {
        let current = match &self.state {
            SessionState::ResolvingProfile { identity: current } if current.id == *identity => {
                current.clone()
            },
            _ => {
                tracing::debug!(%identity, "discarding stale profile lookup result");
                return vec![];
            },
        };

        match result {
            Err(error) => {
                tracing::warn!(%identity, %error, "profile lookup failed");
                self.state = SessionState::ResolutionFailed { identity: current, error };
            },
            Ok(None) => {
                self.state = SessionState::NeedsProfile { identity: current };
            },
            Ok(Some(doc)) => return self.route_profile_document(current, &doc),
        }

        vec![SessionAction::Render]
    }

    fn route_profile_document(
        &mut self,
        identity: Identity,
        doc: &medbox_core::Document,
    ) -> Vec<SessionAction> {
        let record: ProfileRecord = match doc.decode() {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(id = %identity.id, %error, "profile document is malformed");
                self.state = SessionState::ResolutionFailed { identity, error };
                return vec![SessionAction::Render];
            },
        };

        match record.validate() {
            Ok(profile) => {
                let owner = identity.id.clone();
                self.state = SessionState::Routed { identity, profile };
                vec![SessionAction::AttachCollections { owner }, SessionAction::Render]
            },
            Err(unrecognized) => {
                tracing::warn!(id = %identity.id, role = %unrecognized.0, "unrecognized role");
                self.state = SessionState::UnrecognizedRole { identity, role: unrecognized.0 };
                vec![SessionAction::Render]
            },
        }
    }

    fn handle_profile_created(&mut self, identity: &IdentityId) -> Vec<SessionAction> {
        match &self.state {
            SessionState::NeedsProfile { identity: current } if current.id == *identity => {
                let identity = current.clone();
                self.state = SessionState::ResolvingProfile { identity: identity.clone() };
                vec![SessionAction::LoadProfile { identity }, SessionAction::Render]
            },
            _ => {
                tracing::debug!(%identity, "profile created outside onboarding state; ignoring");
                vec![]
            },
        }
    }

    fn handle_retry(&mut self) -> Vec<SessionAction> {
        match &self.state {
            SessionState::ResolutionFailed { identity, .. } => {
                let identity = identity.clone();
                self.state = SessionState::ResolvingProfile { identity: identity.clone() };
                vec![SessionAction::LoadProfile { identity }, SessionAction::Render]
            },
            _ => vec![],
        }
    }
}
