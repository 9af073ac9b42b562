//! Profile onboarding.
//!
//! Validates the onboarding form and commits the profile document pair for
//! an identity that resolved to `NeedsProfile`. Validation failures have no
//! side effects; store writes begin only after every check passes.
//!
//! # Partial-failure contract
//!
//! The store offers independent writes only, so the write order makes the
//! profile document the commit point: the patient secret is written first
//! and the profile last. If the profile write fails the secret is deleted
//! best-effort and the error is returned; the session observably remains in
//! the onboarding state and a re-submit overwrites any orphaned secret.

use medbox_core::{
    DocPath, Document, DocumentId, Environment, Identity, MedboxId, PatientSecret, Profile, Role,
    StoreError, Timestamp,
};
use thiserror::Error;

use crate::hasher::SecretHasher;

/// Required PIN length.
const PIN_LEN: usize = 4;

/// Errors surfaced by onboarding submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OnboardingError {
    /// Name was empty after trimming.
    #[error("name is required")]
    NameRequired,

    /// PIN shorter than four digits.
    #[error("PIN must be exactly {PIN_LEN} digits")]
    PinTooShort,

    /// PIN longer than four digits.
    #[error("PIN must be exactly {PIN_LEN} digits")]
    PinTooLong,

    /// PIN contained a non-digit character.
    #[error("PIN must contain digits only")]
    PinNotNumeric,

    /// PIN and confirmation did not match.
    #[error("PINs do not match")]
    PinMismatch,

    /// A document write failed; retryable by re-submitting.
    #[error("profile could not be saved: {0}")]
    Store(#[from] StoreError),
}

/// Validates and commits a new profile document pair.
pub struct ProfileOnboarding<S, H, E> {
    store: S,
    hasher: H,
    env: E,
}

impl<S, H, E> ProfileOnboarding<S, H, E>
where
    S: medbox_core::DocumentStore,
    H: SecretHasher,
    E: Environment,
{
    /// Create an onboarding flow over the given store.
    pub fn new(store: S, hasher: H, env: E) -> Self {
        Self { store, hasher, env }
    }

    /// Validate the form and commit the profile pair for `identity`.
    ///
    /// On success the caller must signal
    /// [`SessionEvent::ProfileCreated`](crate::SessionEvent::ProfileCreated)
    /// so the resolver re-resolves and routes the new profile.
    pub async fn submit(
        &self,
        identity: &Identity,
        name: &str,
        pin: &str,
        confirm_pin: &str,
    ) -> Result<Profile, OnboardingError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OnboardingError::NameRequired);
        }
        validate_pin(pin)?;
        if pin != confirm_pin {
            return Err(OnboardingError::PinMismatch);
        }

        let medbox_id = MedboxId::generate(&self.env);
        let pin_hash = self.hasher.hash(pin);

        let secret = PatientSecret {
            name: name.to_string(),
            medbox_id: medbox_id.clone(),
            pin_hash,
            insurer_id: None,
        };
        let secret_path = DocPath::patient_secret(&identity.id);
        let secret_doc =
            Document::encode(DocumentId::from(&identity.id), Timestamp::ZERO, &secret)?;
        self.store.set(&secret_path, secret_doc).await?;

        let profile =
            Profile { role: Role::Patient, name: name.to_string(), medbox_id };
        let profile_doc = Document::encode(
            DocumentId::from(&identity.id),
            Timestamp::ZERO,
            &profile.to_record(),
        )?;
        if let Err(error) = self.store.set(&DocPath::profile(&identity.id), profile_doc).await {
            // Commit point failed: remove the orphaned secret so a re-submit
            // starts clean. The session is still in the onboarding state
            // either way, so a leftover secret is only hygiene.
            if let Err(cleanup) = self.store.delete(&secret_path).await {
                tracing::warn!(id = %identity.id, %cleanup, "orphaned secret cleanup failed");
            }
            return Err(OnboardingError::Store(error));
        }

        tracing::info!(id = %identity.id, medbox_id = %profile.medbox_id, "profile created");
        Ok(profile)
    }
}

/// The PIN policy: exactly four ASCII digits.
///
/// Length and digit checks run before the mismatch check so a short PIN is
/// reported as such regardless of the confirmation value.
fn validate_pin(pin: &str) -> Result<(), OnboardingError> {
    if pin.len() < PIN_LEN {
        return Err(OnboardingError::PinTooShort);
    }
    if pin.len() > PIN_LEN {
        return Err(OnboardingError::PinTooLong);
    }
    if !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(OnboardingError::PinNotNumeric);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_policy_is_exactly_four_digits() {
        assert_eq!(validate_pin("123"), Err(OnboardingError::PinTooShort));
        assert_eq!(validate_pin("12345"), Err(OnboardingError::PinTooLong));
        assert_eq!(validate_pin("12a4"), Err(OnboardingError::PinNotNumeric));
        assert_eq!(validate_pin(""), Err(OnboardingError::PinTooShort));
        assert_eq!(validate_pin("0000"), Ok(()));
    }
}
