//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from system time. Production drivers supply a
//! monotonic system clock; tests supply a manually-advanced virtual clock so
//! the reconnect and echo-expiry deadlines can be exercised without
//! sleeping.

use std::time::Duration;

/// Abstract environment providing time and sleeping.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards within a single execution context
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; simulation
    /// environments use virtual time (a [`Duration`] since an epoch).
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be
    /// used by driver code (not session logic).
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

pub mod test_utils {
    //! Deterministic environment for tests.

    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    use super::Environment;

    /// Virtual-clock environment.
    ///
    /// Clones share one clock, so a test harness can hold a handle and
    /// advance time for a session that owns another clone. Sleeping advances
    /// the clock immediately instead of waiting.
    #[derive(Debug, Clone, Default)]
    pub struct MockEnv {
        now: Arc<Mutex<Duration>>,
    }

    impl MockEnv {
        /// Create an environment with the clock at zero.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Advance the virtual clock.
        pub fn advance(&self, delta: Duration) {
            let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
            *now += delta;
        }
    }

    impl Environment for MockEnv {
        type Instant = Duration;

        fn now(&self) -> Duration {
            *self.now.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            self.advance(duration);
            std::future::ready(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn clones_share_the_clock() {
            let env = MockEnv::new();
            let other = env.clone();

            env.advance(Duration::from_secs(3));
            assert_eq!(other.now(), Duration::from_secs(3));
        }
    }
}
