//! Clock abstraction so review timestamps are deterministic under test.

use chrono::{DateTime, Utc};

/// Source of the current time for `reviewed_at`, `created_at` and event
/// timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
