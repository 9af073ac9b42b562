//! Production environment using system time and OS RNG.

use medbox_core::{Environment, Timestamp};

/// Production environment.
///
/// Wall-clock time from `SystemTime` (ordering keys are persisted and
/// compared across clients, so monotonic process time would not do) and
/// cryptographic randomness from the OS.
///
/// # Panics
///
/// Panics if the OS RNG fails or the system clock reports a time before the
/// Unix epoch. Both indicate an environment the client cannot run in.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn now(&self) -> Timestamp {
        let since_epoch = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)");
        Timestamp(since_epoch.as_millis() as u64)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - ids and salts need entropy");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2020() {
        // 2020-01-01 in Unix millis.
        assert!(SystemEnv::new().now() > Timestamp(1_577_836_800_000));
    }

    #[test]
    fn random_bytes_fills_buffer() {
        let env = SystemEnv::new();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        env.random_bytes(&mut a);
        env.random_bytes(&mut b);
        // Collision chance across 32 bytes is negligible.
        assert_ne!(a, b);
    }
}
