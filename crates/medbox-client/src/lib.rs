//! Client state machines for the MedBox application.
//!
//! This crate contains the only parts of the application with real
//! state-transition logic, ordering concerns, and concurrency: session and
//! profile resolution, onboarding commits, and realtime collection
//! synchronization. Everything follows the same action-based pattern: a pure
//! state machine consumes events and returns actions for the caller to
//! execute, so the identical logic runs in production and in deterministic
//! tests.
//!
//! # Components
//!
//! - [`SessionResolver`]: top-level state machine from identity
//!   notifications to a routed view state
//! - [`ProfileOnboarding`]: validates and commits the profile document pair
//! - [`CollectionSynchronizer`]: live, ordered mirror of one owner-scoped
//!   record collection, generic over the record type
//! - [`SecretHasher`]: seam isolating PIN derivation from the state machines

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod event;
mod hasher;
mod onboarding;
mod session;
mod sync;

pub use event::{SessionAction, SessionEvent};
pub use hasher::{SaltedDigestHasher, SecretHasher};
pub use onboarding::{OnboardingError, ProfileOnboarding};
pub use session::{SessionResolver, SessionState};
pub use sync::{CollectionSynchronizer, Draft, NewMedication, SyncError};
