//! Narrow abstraction over wall time, so tests can inject a fixed or
//! steppable clock instead of `SystemTime::now()`.

use chrono::{DateTime, Utc};
use std::time::Instant;

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
    fn monotonic_now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub mod fake {
    use super::{Clock, DateTime, Instant, Utc};
    use std::sync::Mutex;

    /// A clock whose UTC time is fixed at construction; monotonic time still
    /// advances normally since no production code compares monotonic
    /// instants across a fake boundary.
    pub struct FakeClock {
        utc: Mutex<DateTime<Utc>>,
    }

    impl FakeClock {
        #[must_use]
        pub fn at(utc: DateTime<Utc>) -> Self {
            Self {
                utc: Mutex::new(utc),
            }
        }

        pub fn advance(&self, duration: chrono::Duration) {
            let mut guard = self.utc.lock().expect("fake clock lock poisoned");
            *guard += duration;
        }
    }

    impl Clock for FakeClock {
        fn now_utc(&self) -> DateTime<Utc> {
            *self.utc.lock().expect("fake clock lock poisoned")
        }

        fn monotonic_now(&self) -> Instant {
            Instant::now()
        }
    }
}
