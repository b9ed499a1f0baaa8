//! Environment abstraction and its production implementation.
//!
//! Decouples the runtime and the simulated devices from system resources
//! (wall-clock time, sleeping, randomness) so tests can run without real
//! delays.
//!
//! `SystemEnv` uses the Tokio timer, the system clock, and the OS
//! cryptographic RNG. Production behavior is therefore non-deterministic.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async sleeping.
///
/// # Invariants
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g. OS
///   entropy exhaustion)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Seconds since the Unix epoch.
    fn wall_clock_secs(&self) -> u64;

    /// Generates a random `u64`, e.g. for session ids.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

/// Production environment using Tokio time, the system clock, and getrandom.
///
/// # Panics
///
/// Panics if the OS RNG fails. A gateway that cannot draw session ids cannot
/// tell its clients apart, and OS RNG failure indicates a broken host.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }

    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_env_random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];

        env.random_bytes(&mut bytes1);
        env.random_bytes(&mut bytes2);

        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[test]
    fn system_env_clock_is_after_epoch() {
        assert!(SystemEnv::new().wall_clock_secs() > 1_600_000_000);
    }

    #[tokio::test]
    async fn system_env_sleep_works() {
        let env = SystemEnv::new();

        let start = tokio::time::Instant::now();
        env.sleep(Duration::from_millis(20)).await;

        assert!(start.elapsed() >= Duration::from_millis(20), "Sleep should wait at least 20ms");
    }
}
