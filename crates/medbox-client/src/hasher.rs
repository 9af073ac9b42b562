//! Secret derivation seam.
//!
//! PIN hashing is isolated behind [`SecretHasher`] so the onboarding state
//! machine never sees how the derivative is produced and a vetted
//! implementation can be swapped in without touching it.

use medbox_core::{Environment, SecretHash};
use sha2::{Digest, Sha256};

/// Derives a storable hash from a clear secret.
///
/// Implementations must never log or retain the clear secret.
pub trait SecretHasher: Send + Sync + 'static {
    /// Derive the storable form of `secret`.
    fn hash(&self, secret: &str) -> SecretHash;
}

/// Salted SHA-256 placeholder hasher.
///
/// Client-side PIN hashing is a stopgap: the real derivation belongs in a
/// trusted backend service with a memory-hard algorithm. This implementation
/// exists so the rest of the flow is complete and the seam is exercised; the
/// salt prevents trivial equality checks across accounts, nothing more.
#[derive(Clone)]
pub struct SaltedDigestHasher<E: Environment> {
    env: E,
}

/// Salt length in bytes.
const SALT_LEN: usize = 16;

impl<E: Environment> SaltedDigestHasher<E> {
    /// Create a hasher drawing salt from `env`.
    pub fn new(env: E) -> Self {
        Self { env }
    }
}

impl<E: Environment> SecretHasher for SaltedDigestHasher<E> {
    fn hash(&self, secret: &str) -> SecretHash {
        let mut salt = [0u8; SALT_LEN];
        self.env.random_bytes(&mut salt);

        let mut digest = Sha256::new();
        digest.update(salt);
        digest.update(secret.as_bytes());
        let out = digest.finalize();

        SecretHash::new(format!("{}${}", hex::encode(salt), hex::encode(out)))
    }
}
