//! Monotonic time source, injectable for deterministic tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic clock. Never affected by wall-clock jumps; all timing
/// decisions in the engine go through this trait instead of calling
/// `Instant::now()` directly, so tests can substitute a fake.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn elapsed(&self, since: Instant) -> Duration {
        self.now().saturating_duration_since(since)
    }
}

/// Production clock backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

pub(crate) type ClockRef = Arc<dyn Clock>;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// A clock whose `now()` is advanced manually, for tests that need
    /// exact control over elapsed-time boundaries rather than `tokio`'s
    /// virtual time (used for pure, non-async logic tests).
    #[derive(Clone)]
    pub struct FakeClock {
        inner: Arc<Mutex<Instant>>,
    }

    impl FakeClock {
        pub fn new() -> Self {
            Self {
                inner: Arc::new(Mutex::new(Instant::now())),
            }
        }

        pub fn advance(&self, d: Duration) {
            let mut guard = self.inner.lock();
            *guard += d;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            *self.inner.lock()
        }
    }
}
