//! Environment abstraction for deterministic testing.
//!
//! Decouples client logic from system resources (wall-clock time,
//! randomness). Production uses real system resources; the test harness uses
//! a seeded RNG and virtual time so every run is reproducible.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
///
/// Used as the ordering key for record collections (creation time,
/// consultation date). Wall-clock rather than monotonic because the value is
/// persisted and compared across clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Zero timestamp, used for documents that carry no ordering key.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Milliseconds since the Unix epoch.
    pub fn millis(self) -> u64 {
        self.0
    }
}

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// - `now()` never goes backwards within a single execution context
/// - `random_bytes()` uses cryptographically secure entropy in production;
///   simulation environments may use a seeded RNG for reproducibility
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time.
    fn now(&self) -> Timestamp;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Convenience for id generation.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
