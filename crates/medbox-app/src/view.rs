//! Observable view model.
//!
//! [`ViewState`] is the subset of session and collection state a frontend
//! needs to render, derived from the resolver and synchronizers and
//! published over a watch channel on every render action. It exposes no
//! store or gateway handles.

use medbox_core::{ConsultationRecord, Identity, MedicationRecord, Profile, StoreError};

/// What the frontend should currently show.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    /// Startup, before the first identity notification.
    Loading,

    /// No identity signed in; show the credential form.
    SignedOut,

    /// Identity signed in, profile read outstanding; show a spinner.
    ResolvingProfile,

    /// Identity has no profile; show the onboarding form.
    CreateProfile {
        /// Identity being onboarded.
        identity: Identity,
    },

    /// Patient session; show the portal.
    PatientPortal(PortalView),

    /// Profile exists but the role is unknown to this client; tell the user
    /// to contact support.
    UnsupportedRole {
        /// Raw role string from the profile document.
        role: String,
    },

    /// Profile resolution failed; show the cause and a retry control.
    ResolutionFailed {
        /// Causing error.
        error: StoreError,
    },
}

/// Portal screen contents.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalView {
    /// Signed-in identity.
    pub identity: Identity,
    /// Resolved profile.
    pub profile: Profile,
    /// Medication list, newest first.
    pub medications: Vec<MedicationRecord>,
    /// Consultation history, newest first.
    pub consultations: Vec<ConsultationRecord>,
    /// False while the medication feed is lost; show a sync indicator.
    pub medications_live: bool,
    /// False while the consultation feed is lost; show a sync indicator.
    pub consultations_live: bool,
}
