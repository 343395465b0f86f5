//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (time, randomness).
//! Production uses real clocks and OS entropy; tests use a stepable
//! virtual clock and a seeded generator.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async primitives.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; simulation
    /// environments use virtual time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be
    /// used by driver code (not protocol logic).
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Convenience for jitter computation and request identifiers.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

pub mod test_utils {
    //! Deterministic environment for tests.

    use std::{
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    };

    use super::Environment;

    /// Environment with a stepable clock and a deterministic generator.
    ///
    /// `now()` returns a fixed base instant plus whatever has been
    /// [`advance`](MockEnv::advance)d; `sleep` resolves immediately so
    /// drivers never stall in tests.
    #[derive(Clone)]
    pub struct MockEnv {
        base: Instant,
        offset_nanos: Arc<AtomicU64>,
        rng_state: Arc<AtomicU64>,
    }

    impl MockEnv {
        /// Create an environment starting at an arbitrary base instant.
        #[must_use]
        pub fn new() -> Self {
            Self {
                base: Instant::now(),
                offset_nanos: Arc::new(AtomicU64::new(0)),
                rng_state: Arc::new(AtomicU64::new(0x9E37_79B9_7F4A_7C15)),
            }
        }

        /// Move the virtual clock forward.
        pub fn advance(&self, duration: Duration) {
            let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
            self.offset_nanos.fetch_add(nanos, Ordering::SeqCst);
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
            self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            // SplitMix64: deterministic, seeded, not cryptographic.
            for chunk in buffer.chunks_mut(8) {
                let mut z = self.rng_state.fetch_add(0x9E37_79B9_7F4A_7C15, Ordering::SeqCst);
                z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
                z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
                z ^= z >> 31;
                let bytes = z.to_be_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn clock_advances_monotonically() {
            let env = MockEnv::new();
            let t0 = env.now();
            env.advance(Duration::from_secs(5));
            let t1 = env.now();
            assert_eq!(t1 - t0, Duration::from_secs(5));
        }

        #[test]
        fn random_bytes_fills_buffer() {
            let env = MockEnv::new();
            let mut buf = [0u8; 13];
            env.random_bytes(&mut buf);
            assert!(buf.iter().any(|&b| b != 0));
        }
    }
}
