//! Clock abstraction for response timestamps
//!
//! Production code uses `SystemClock` which delegates to `chrono::Utc::now()`.
//! Tests use `FixedClock` so rendered envelopes are deterministic.

use chrono::{DateTime, SecondsFormat, Utc};

/// Trait for getting the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as RFC3339 with second precision and a `Z` suffix
    fn timestamp(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Production clock that delegates to `chrono::Utc::now()`
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a single instant
#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
