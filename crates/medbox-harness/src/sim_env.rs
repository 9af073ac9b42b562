//! Seeded environment with virtual time.

use std::sync::{Arc, Mutex};

use medbox_core::{Environment, Timestamp};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

struct SimEnvInner {
    rng: ChaCha20Rng,
    now_ms: u64,
}

/// Deterministic environment for simulation.
///
/// Randomness comes from a seeded ChaCha RNG; time is virtual. The clock
/// auto-advances one millisecond per `now()` call so consecutive ordering
/// keys are strictly increasing, and can be moved forward explicitly with
/// [`advance`](SimEnv::advance).
///
/// # Panics
///
/// Operations panic if the internal mutex is poisoned. Acceptable for test
/// code.
#[derive(Clone)]
pub struct SimEnv {
    inner: Arc<Mutex<SimEnvInner>>,
}

impl SimEnv {
    /// Create an environment seeded with `seed`, starting at time zero.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimEnvInner {
                rng: ChaCha20Rng::seed_from_u64(seed),
                now_ms: 0,
            })),
        }
    }

    /// Move the virtual clock forward by `millis`.
    #[allow(clippy::expect_used)]
    pub fn advance(&self, millis: u64) {
        self.inner.lock().expect("Mutex poisoned").now_ms += millis;
    }
}

impl Environment for SimEnv {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. Acceptable for test code.
    #[allow(clippy::expect_used)]
    fn now(&self) -> Timestamp {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.now_ms += 1;
        Timestamp(inner.now_ms)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. Acceptable for test code.
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.inner.lock().expect("Mutex poisoned").rng.fill_bytes(buffer);
    }
}
