//! Wall clock abstraction.
//!
//! The lock engine reads `now` for staleness checks and sleeps between
//! attempts. Both go through [`Clock`] so tests can drive time explicitly.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Source of the current time and of blocking waits.
pub trait Clock {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}
