//! The `Clock` capability: monotonic time for timeouts and rate limiting,
//! wall time for timestamps that cross the wire. Kept behind a trait so the
//! rate limiter, invite timeout, and link-establishment timeout can be
//! driven deterministically in tests instead of via real sleeps.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

pub trait Clock: Send + Sync {
    /// A monotonic instant, used for sliding-window rate limiting and
    /// timeout accounting. Never goes backwards.
    fn monotonic_now(&self) -> Instant;

    /// Wall-clock time, used only for the `timestamp` field of outbound
    /// signaling messages and persisted records.
    fn wall_now(&self) -> SystemTime;
}

/// The real clock, backed by `std::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }

    fn wall_now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock tests can advance by hand. Starts at an arbitrary but fixed
/// instant rather than `Instant::now()` so test output doesn't depend on
/// wall-clock skew between runs.
#[derive(Clone)]
pub struct MockClock {
    inner: Arc<Mutex<MockClockState>>,
}

struct MockClockState {
    monotonic: Instant,
    wall: SystemTime,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockClockState {
                monotonic: Instant::now(),
                wall: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            })),
        }
    }

    /// Advance both the monotonic and wall clock by `d`.
    pub fn advance(&self, d: Duration) {
        let mut state = self.inner.lock().unwrap();
        state.monotonic += d;
        state.wall += d;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn monotonic_now(&self) -> Instant {
        self.inner.lock().unwrap().monotonic
    }

    fn wall_now(&self) -> SystemTime {
        self.inner.lock().unwrap().wall
    }
}
