//! Time source and the silence-window policy
//!
//! The store and the accumulator both ask the same question: "was this
//! producer heard from recently enough that its card is still open?". They
//! answer it with a shared [`SilenceWindow`] and an injectable [`Clock`] so
//! window lapses can be tested without sleeping.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::time::Duration;

/// Source of the current time
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += to_delta(by);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Maximum gap between updates before a producer's card is considered closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceWindow(Duration);

impl SilenceWindow {
    #[inline]
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    #[inline]
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    #[inline]
    #[must_use]
    pub fn duration(self) -> Duration {
        self.0
    }

    /// Whether a card last touched at `last` is still open at `now`
    #[must_use]
    pub fn is_open(self, last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(last) <= to_delta(self.0)
    }

    /// Oldest `updated_at` that still counts as open at `now`
    #[must_use]
    pub fn cutoff(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - to_delta(self.0)
    }
}

impl Default for SilenceWindow {
    fn default() -> Self {
        Self::from_secs(60 * 60)
    }
}

fn to_delta(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
