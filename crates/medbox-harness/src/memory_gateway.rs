//! In-memory identity gateway.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use medbox_core::{GatewayError, Identity, IdentityGateway};
use tokio::sync::watch;

/// Minimum secret length accepted at sign-up.
const MIN_SECRET_LEN: usize = 6;

struct Account {
    secret: String,
    identity: Identity,
}

struct MemoryGatewayInner {
    accounts: HashMap<String, Account>,
    next_uid: u64,
    network_fault: Option<String>,
}

/// In-memory gateway implementation for testing and simulation.
///
/// Ids are assigned deterministically (`uid-0`, `uid-1`, ...) in sign-up
/// order. The current identity is published over a watch channel; clones
/// share one account table and one channel.
///
/// # Panics
///
/// Operations panic if the internal mutex is poisoned. Acceptable for test
/// code.
#[derive(Clone)]
pub struct MemoryGateway {
    inner: Arc<Mutex<MemoryGatewayInner>>,
    current: Arc<watch::Sender<Option<Identity>>>,
}

impl MemoryGateway {
    /// Create a gateway with no accounts and no signed-in identity.
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            inner: Arc::new(Mutex::new(MemoryGatewayInner {
                accounts: HashMap::new(),
                next_uid: 0,
                network_fault: None,
            })),
            current: Arc::new(current),
        }
    }

    /// Fail every credential operation with a network error until restored.
    #[allow(clippy::expect_used)]
    pub fn fail_network(&self, reason: impl Into<String>) {
        self.inner.lock().expect("Mutex poisoned").network_fault = Some(reason.into());
    }

    /// Clear an injected network fault.
    #[allow(clippy::expect_used)]
    pub fn restore_network(&self) {
        self.inner.lock().expect("Mutex poisoned").network_fault = None;
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityGateway for MemoryGateway {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. Acceptable for test code.
    #[allow(clippy::expect_used)]
    async fn sign_in(&self, email: &str, secret: &str) -> Result<Identity, GatewayError> {
        let identity = {
            let inner = self.inner.lock().expect("Mutex poisoned");
            if let Some(reason) = &inner.network_fault {
                return Err(GatewayError::Network(reason.clone()));
            }
            match inner.accounts.get(email) {
                Some(account) if account.secret == secret => account.identity.clone(),
                _ => return Err(GatewayError::InvalidCredentials),
            }
        };
        let _ = self.current.send(Some(identity.clone()));
        Ok(identity)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. Acceptable for test code.
    #[allow(clippy::expect_used)]
    async fn sign_up(&self, email: &str, secret: &str) -> Result<Identity, GatewayError> {
        let identity = {
            let mut inner = self.inner.lock().expect("Mutex poisoned");
            if let Some(reason) = &inner.network_fault {
                return Err(GatewayError::Network(reason.clone()));
            }
            if inner.accounts.contains_key(email) {
                return Err(GatewayError::EmailInUse);
            }
            if secret.len() < MIN_SECRET_LEN {
                return Err(GatewayError::WeakSecret);
            }
            let identity = Identity::new(format!("uid-{}", inner.next_uid), email);
            inner.next_uid += 1;
            inner.accounts.insert(
                email.to_string(),
                Account { secret: secret.to_string(), identity: identity.clone() },
            );
            identity
        };
        let _ = self.current.send(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) {
        let _ = self.current.send(None);
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}
