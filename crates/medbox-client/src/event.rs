//! Session resolver events and actions.

use medbox_core::{Document, Identity, IdentityId, StoreError};

/// Events the caller feeds into the session resolver.
///
/// The caller is responsible for:
/// - Forwarding identity notifications from the gateway, in emission order
/// - Performing the profile reads the resolver asks for and feeding the
///   results back as [`SessionEvent::ProfileLoaded`]
/// - Signalling onboarding completion and user-initiated retries
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The gateway reported a new current identity (`None` on sign-out).
    IdentityChanged(Option<Identity>),

    /// A profile read issued for `identity` completed.
    ///
    /// The identity is carried so the resolver can discard results that
    /// arrive after a newer identity change (checked by equality, not
    /// arrival order).
    ProfileLoaded {
        /// Identity the read was issued for.
        identity: IdentityId,
        /// Read outcome; `Ok(None)` means no profile document exists.
        result: Result<Option<Document>, StoreError>,
    },

    /// Onboarding committed a profile for `identity`.
    ProfileCreated {
        /// Identity the profile was created for.
        identity: IdentityId,
    },

    /// User asked to retry a failed profile resolution.
    Retry,
}

/// Actions the resolver produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Read the profile document for `identity` and feed the result back.
    ///
    /// At most one read is outstanding per identity-change event; the
    /// resolver re-issues this action on every transition into profile
    /// resolution.
    LoadProfile {
        /// Identity to resolve.
        identity: Identity,
    },

    /// Release every live collection subscription held for `owner`.
    ///
    /// Emitted synchronously with the identity change that invalidates the
    /// owner, before any further resolution, so no stale reads are served.
    ReleaseCollections {
        /// Owner whose subscriptions must be released.
        owner: IdentityId,
    },

    /// Open collection subscriptions scoped to `owner`.
    ///
    /// Emitted when a session routes to the patient portal.
    AttachCollections {
        /// Owner to scope the subscriptions to.
        owner: IdentityId,
    },

    /// Re-render the view from current state.
    Render,
}
