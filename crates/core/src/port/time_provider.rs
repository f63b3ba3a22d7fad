// Time Provider Port (for testability)

use chrono::NaiveDateTime;

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;

    /// Local wall-clock time, used to stamp records
    fn now_local(&self) -> NaiveDateTime;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn now_local(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Deterministic clock that advances by `step` on every `now_local` call
    #[derive(Clone)]
    pub struct SteppingTimeProvider {
        current: Arc<Mutex<NaiveDateTime>>,
        step: chrono::Duration,
    }

    impl SteppingTimeProvider {
        pub fn new(start: NaiveDateTime, step: chrono::Duration) -> Self {
            Self {
                current: Arc::new(Mutex::new(start)),
                step,
            }
        }

        /// Clock frozen at `at` (every call returns the same instant)
        pub fn fixed(at: NaiveDateTime) -> Self {
            Self::new(at, chrono::Duration::zero())
        }
    }

    impl TimeProvider for SteppingTimeProvider {
        fn now_millis(&self) -> i64 {
            self.current.lock().unwrap().and_utc().timestamp_millis()
        }

        fn now_local(&self) -> NaiveDateTime {
            let mut current = self.current.lock().unwrap();
            let now = *current;
            *current = now + self.step;
            now
        }
    }
}
