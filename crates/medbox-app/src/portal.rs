//! Portal runtime.
//!
//! The [`Portal`] owns the session resolver, the onboarding flow, and one
//! collection synchronizer per record type, and connects them to the
//! external services. All mutation is funneled through single-tasked
//! dispatch - identity notifications first and in order, then pending
//! snapshots - so no locking is needed anywhere in the state machines.

use std::collections::VecDeque;

use medbox_client::{
    CollectionSynchronizer, NewMedication, OnboardingError, ProfileOnboarding, SecretHasher,
    SessionAction, SessionEvent, SessionResolver, SessionState, SyncError,
};
use medbox_core::{
    ConsultationRecord, DocPath, DocumentStore, Environment, GatewayError, Identity,
    IdentityGateway, MedicationRecord, RecordId,
};
use thiserror::Error;
use tokio::sync::watch;

use crate::view::{PortalView, ViewState};

/// Errors surfaced by portal commands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortalError {
    /// Credential operation failed; shown to the user verbatim.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Onboarding validation or commit failed.
    #[error(transparent)]
    Onboarding(#[from] OnboardingError),

    /// Collection operation failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The command does not apply to the current session state.
    #[error("not available in the current state")]
    InvalidState,
}

/// Application runtime: dispatch loop plus command surface.
///
/// # Type parameters
///
/// - `G`: identity gateway
/// - `S`: document store
/// - `E`: environment (time, randomness)
/// - `H`: secret hasher used at onboarding
pub struct Portal<G, S, E, H>
where
    G: IdentityGateway,
    S: DocumentStore,
    E: Environment,
    H: SecretHasher,
{
    gateway: G,
    store: S,
    env: E,
    resolver: SessionResolver,
    onboarding: ProfileOnboarding<S, H, E>,
    medications: CollectionSynchronizer<MedicationRecord, S>,
    consultations: CollectionSynchronizer<ConsultationRecord, S>,
    identity_rx: watch::Receiver<Option<Identity>>,
    view_tx: watch::Sender<ViewState>,
}

impl<G, S, E, H> Portal<G, S, E, H>
where
    G: IdentityGateway,
    S: DocumentStore,
    E: Environment,
    H: SecretHasher,
{
    /// Create a portal over the given services.
    ///
    /// The gateway's current identity is delivered on the first
    /// [`pump`](Self::pump), satisfying the fires-once-at-startup contract.
    pub fn new(gateway: G, store: S, hasher: H, env: E) -> Self {
        let mut identity_rx = gateway.watch();
        identity_rx.mark_changed();
        let (view_tx, _) = watch::channel(ViewState::Loading);
        Self {
            onboarding: ProfileOnboarding::new(store.clone(), hasher, env.clone()),
            medications: CollectionSynchronizer::new(store.clone()),
            consultations: CollectionSynchronizer::new(store.clone()),
            gateway,
            store,
            env,
            resolver: SessionResolver::new(),
            identity_rx,
            view_tx,
        }
    }

    /// Process every input that is already ready, then return.
    ///
    /// Identity notifications are drained first and in order; pending
    /// snapshots after. Commands call this internally, so a host that only
    /// issues commands and re-renders on the view channel never needs to.
    pub async fn pump(&mut self) {
        loop {
            if self.identity_rx.has_changed().unwrap_or(false) {
                let identity = self.identity_rx.borrow_and_update().clone();
                self.dispatch(SessionEvent::IdentityChanged(identity)).await;
                continue;
            }
            if let Some(snapshot) = self.medications.try_next_snapshot() {
                self.apply_medications(&snapshot);
                continue;
            }
            if let Some(snapshot) = self.consultations.try_next_snapshot() {
                self.apply_consultations(&snapshot);
                continue;
            }
            break;
        }
    }

    /// Await the next input of any kind and process it.
    ///
    /// Biased toward identity notifications so a sign-out always beats a
    /// queued snapshot. Returns `false` when the gateway channel is gone,
    /// which ends the host loop.
    pub async fn next_turn(&mut self) -> bool {
        tokio::select! {
            biased;
            changed = self.identity_rx.changed() => match changed {
                Ok(()) => {
                    let identity = self.identity_rx.borrow_and_update().clone();
                    self.dispatch(SessionEvent::IdentityChanged(identity)).await;
                    true
                },
                Err(_) => false,
            },
            snapshot = self.medications.next_snapshot(), if self.medications.is_live() => {
                match snapshot {
                    Some(snapshot) => self.apply_medications(&snapshot),
                    // Feed closed: republish so the sync-lost flag shows.
                    None => self.publish_view(),
                }
                true
            },
            snapshot = self.consultations.next_snapshot(), if self.consultations.is_live() => {
                match snapshot {
                    Some(snapshot) => self.apply_consultations(&snapshot),
                    None => self.publish_view(),
                }
                true
            },
        }
    }

    /// Authenticate an existing account.
    pub async fn sign_in(&mut self, email: &str, secret: &str) -> Result<(), PortalError> {
        self.gateway.sign_in(email, secret).await?;
        self.pump().await;
        Ok(())
    }

    /// Create and authenticate a new account.
    pub async fn sign_up(&mut self, email: &str, secret: &str) -> Result<(), PortalError> {
        self.gateway.sign_up(email, secret).await?;
        self.pump().await;
        Ok(())
    }

    /// Destroy the current session.
    ///
    /// Subscriptions for the prior identity are released while the
    /// notification is processed, before this returns.
    pub async fn sign_out(&mut self) {
        self.gateway.sign_out().await;
        self.pump().await;
    }

    /// Submit the onboarding form for the identity awaiting a profile.
    pub async fn submit_profile(
        &mut self,
        name: &str,
        pin: &str,
        confirm_pin: &str,
    ) -> Result<(), PortalError> {
        let identity = match self.resolver.state() {
            SessionState::NeedsProfile { identity } => identity.clone(),
            _ => return Err(PortalError::InvalidState),
        };
        self.onboarding.submit(&identity, name, pin, confirm_pin).await?;
        self.dispatch(SessionEvent::ProfileCreated { identity: identity.id }).await;
        self.pump().await;
        Ok(())
    }

    /// Retry a failed profile resolution.
    pub async fn retry_resolution(&mut self) {
        self.dispatch(SessionEvent::Retry).await;
        self.pump().await;
    }

    /// Add a medication to the signed-in patient's box.
    ///
    /// The list updates when the store pushes the next snapshot, not
    /// synchronously.
    pub async fn add_medication(
        &mut self,
        name: &str,
        dosage: &str,
    ) -> Result<RecordId, PortalError> {
        let draft = NewMedication { name: name.to_string(), dosage: dosage.to_string() };
        let id = self.medications.create(draft, &self.env).await?;
        self.pump().await;
        Ok(id)
    }

    /// Delete a medication from the signed-in patient's box.
    pub async fn remove_medication(&mut self, id: &RecordId) -> Result<(), PortalError> {
        self.medications.delete(id).await?;
        self.pump().await;
        Ok(())
    }

    /// Re-open any lost collection feeds for the current owner.
    pub async fn resync(&mut self) -> Result<(), PortalError> {
        if !self.medications.is_live() && self.medications.owner().is_some() {
            self.medications.reattach()?;
        }
        if !self.consultations.is_live() && self.consultations.owner().is_some() {
            self.consultations.reattach()?;
        }
        self.pump().await;
        Ok(())
    }

    /// Current view, derived on demand.
    pub fn view(&self) -> ViewState {
        self.derive_view()
    }

    /// Observe view changes.
    pub fn watch_view(&self) -> watch::Receiver<ViewState> {
        self.view_tx.subscribe()
    }

    /// Current session state, for hosts that need more than the view.
    pub fn session_state(&self) -> &SessionState {
        self.resolver.state()
    }

    async fn dispatch(&mut self, event: SessionEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for action in self.resolver.handle(event) {
                match action {
                    SessionAction::LoadProfile { identity } => {
                        // Inline await keeps at most one lookup in flight;
                        // the resolver's identity guard handles any result
                        // that became stale while we were waiting.
                        let result = self.store.get(&DocPath::profile(&identity.id)).await;
                        queue.push_back(SessionEvent::ProfileLoaded {
                            identity: identity.id,
                            result,
                        });
                    },
                    SessionAction::ReleaseCollections { .. } => {
                        self.medications.detach();
                        self.consultations.detach();
                    },
                    SessionAction::AttachCollections { owner } => {
                        if let Err(error) = self.medications.attach(owner.clone()) {
                            tracing::warn!(%error, "medication feed could not be opened");
                        }
                        if let Err(error) = self.consultations.attach(owner) {
                            tracing::warn!(%error, "consultation feed could not be opened");
                        }
                    },
                    SessionAction::Render => self.publish_view(),
                }
            }
        }
    }

    fn apply_medications(&mut self, snapshot: &medbox_core::Snapshot) {
        if let Err(error) = self.medications.apply_snapshot(snapshot) {
            tracing::warn!(%error, "medication snapshot could not be applied");
        }
        self.publish_view();
    }

    fn apply_consultations(&mut self, snapshot: &medbox_core::Snapshot) {
        if let Err(error) = self.consultations.apply_snapshot(snapshot) {
            tracing::warn!(%error, "consultation snapshot could not be applied");
        }
        self.publish_view();
    }

    fn publish_view(&self) {
        let _ = self.view_tx.send(self.derive_view());
    }

    fn derive_view(&self) -> ViewState {
        match self.resolver.state() {
            SessionState::Loading => ViewState::Loading,
            SessionState::Unauthenticated => ViewState::SignedOut,
            SessionState::ResolvingProfile { .. } => ViewState::ResolvingProfile,
            SessionState::NeedsProfile { identity } => {
                ViewState::CreateProfile { identity: identity.clone() }
            },
            SessionState::UnrecognizedRole { role, .. } => {
                ViewState::UnsupportedRole { role: role.clone() }
            },
            SessionState::ResolutionFailed { error, .. } => {
                ViewState::ResolutionFailed { error: error.clone() }
            },
            SessionState::Routed { identity, profile } => ViewState::PatientPortal(PortalView {
                identity: identity.clone(),
                profile: profile.clone(),
                medications: self.medications.records().to_vec(),
                consultations: self.consultations.records().to_vec(),
                medications_live: self.medications.is_live(),
                consultations_live: self.consultations.is_live(),
            }),
        }
    }
}
