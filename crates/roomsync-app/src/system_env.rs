//! Production environment using system time and OS randomness.

use std::time::Duration;

use roomsync_core::Environment;

/// Production environment.
///
/// Uses `std::time::Instant::now()` for time, `tokio::time::sleep()` for async
/// sleeping, and getrandom for randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        // Randomness only spreads snapshot requests across peers. A zeroed
        // buffer picks the first peer, which is still correct.
        if let Err(e) = getrandom::fill(buffer) {
            tracing::error!(error = %e, "OS RNG unavailable");
            buffer.fill(0);
        }
    }
}
