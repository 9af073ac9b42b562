//! Identity gateway contract.
//!
//! The gateway is an opaque external service that accepts credential
//! submission and notifies the client of identity changes. Credential
//! hashing, token refresh, and transport are the service's concern.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::identity::Identity;

/// Errors surfaced by credential operations.
///
/// These are shown to the user verbatim; none of them crash the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Email/secret pair did not match an account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Sign-up attempted with an email that already has an account.
    #[error("email already in use")]
    EmailInUse,

    /// Sign-up secret rejected by the provider's strength policy.
    #[error("secret does not meet strength requirements")]
    WeakSecret,

    /// Transport failure reaching the provider; retryable.
    #[error("network failure: {0}")]
    Network(String),
}

/// Identity gateway contract.
///
/// The watch channel carries the current identity: `None` when signed out.
/// A new receiver observes the current value immediately, satisfying the
/// fires-once-at-startup contract, and is notified on every sign-in and
/// sign-out in emission order (intermediate values may be collapsed to the
/// latest, which downstream last-writer-wins handling already requires).
#[async_trait]
pub trait IdentityGateway: Clone + Send + Sync + 'static {
    /// Authenticate an existing account.
    async fn sign_in(&self, email: &str, secret: &str) -> Result<Identity, GatewayError>;

    /// Create and authenticate a new account.
    async fn sign_up(&self, email: &str, secret: &str) -> Result<Identity, GatewayError>;

    /// Destroy the current session.
    async fn sign_out(&self);

    /// Observe the current identity.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}
