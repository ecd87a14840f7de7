//! Environment abstraction for deterministic testing.
//!
//! Decouples room logic from system resources (time, randomness). The
//! simulation harness supplies a virtual clock and a seeded RNG; production
//! uses the system clock and OS entropy.

use std::time::Duration;

/// Abstract environment providing time, randomness, and a sleep primitive.
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - given the same seed, `random_bytes()` yields the same sequence
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    ///
    /// Production uses `std::time::Instant`; simulation uses virtual time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this; state machines take time as input.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Picks an index in `0..len` uniformly, or `None` when `len == 0`.
    ///
    /// Used to choose which peer answers a status request.
    fn random_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let len = len as u64;
        // Rejection sampling removes modulo bias.
        let zone = u64::MAX - (u64::MAX % len);
        loop {
            let value = self.random_u64();
            if value < zone {
                return Some((value % len) as usize);
            }
        }
    }
}

/// Deterministic environment for unit tests in this and downstream crates.
pub mod test_utils {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    };

    use super::Environment;

    /// Environment with a manually advanced clock and a counter-driven RNG.
    ///
    /// Clones share the clock and the counter.
    #[derive(Clone)]
    pub struct MockEnv {
        start: Instant,
        elapsed_nanos: Arc<AtomicU64>,
        counter: Arc<AtomicU64>,
    }

    impl MockEnv {
        /// Clock at zero, counter at zero.
        pub fn new() -> Self {
            Self {
                start: Instant::now(),
                elapsed_nanos: Arc::new(AtomicU64::new(0)),
                counter: Arc::new(AtomicU64::new(0)),
            }
        }

        /// Moves the clock forward.
        pub fn advance(&self, by: Duration) {
            let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
            self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
        }
    }

    impl Default for MockEnv {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Environment for MockEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            self.start + Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
        }

        async fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let next = self.counter.fetch_add(1, Ordering::SeqCst).to_be_bytes();
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = next[i % 8];
            }
        }
    }
}
