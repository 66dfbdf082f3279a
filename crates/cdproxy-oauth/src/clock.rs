//! Wall-clock abstraction used for token expiry.
//!
//! Production code uses [`SystemClock`]; tests drive expiry with
//! [`ManualClock`] (behind the `testing` feature) instead of sleeping.

use std::fmt::Debug;
use std::sync::Arc;

/// Source of the current time in Unix epoch milliseconds.
pub trait Clock: Send + Sync + Debug {
    fn now_millis(&self) -> u64;
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

#[cfg(any(test, feature = "testing"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "testing"))]
mod manual {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use super::Clock;

    /// Time only moves when [`advance`](ManualClock::advance) or
    /// [`set`](ManualClock::set) is called. Clones share the same time.
    #[derive(Debug, Clone, Default)]
    pub struct ManualClock {
        now_ms: Arc<AtomicU64>,
    }

    impl ManualClock {
        pub fn new(start_ms: u64) -> Self {
            Self {
                now_ms: Arc::new(AtomicU64::new(start_ms)),
            }
        }

        pub fn advance(&self, by: Duration) {
            let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
            self.now_ms.fetch_add(millis, Ordering::SeqCst);
        }

        pub fn set(&self, now_ms: u64) {
            self.now_ms.store(now_ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> u64 {
            self.now_ms.load(Ordering::SeqCst)
        }
    }
}
