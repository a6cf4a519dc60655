//! Time sources.
//!
//! Every time-dependent structure takes its time from a [`Clock`] handed to it at construction, so
//! tests can drive time deterministically with [`ManualClock`].
use std::{
    fmt,
    sync::atomic::{AtomicI64, Ordering},
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};

/// A source of monotonic and wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Monotonic time, in nanoseconds, since an arbitrary fixed origin.
    fn now_nanos(&self) -> i64;

    /// Current wall-clock time.
    fn utc_now(&self) -> DateTime<Utc>;
}

/// The default clock, backed by [`quanta`] for monotonic time and the system clock for UTC.
pub struct SystemClock {
    clock: quanta::Clock,
    origin: quanta::Instant,
}

impl SystemClock {
    /// Creates a new `SystemClock`.
    pub fn new() -> Self {
        let clock = quanta::Clock::new();
        let origin = clock.now();
        Self { clock, origin }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemClock").finish_non_exhaustive()
    }
}

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        let elapsed = self.clock.now().duration_since(self.origin);
        i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX)
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Wall-clock time is derived from the UTC instant the clock was created at plus the monotonic
/// offset, so both views of time advance together.
#[derive(Debug)]
pub struct ManualClock {
    nanos: AtomicI64,
    base: DateTime<Utc>,
}

impl ManualClock {
    /// Creates a new `ManualClock` starting at zero.
    pub fn new() -> Self {
        Self { nanos: AtomicI64::new(0), base: Utc::now() }
    }

    /// Advances the clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        let delta = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        self.nanos.fetch_add(delta, Ordering::AcqRel);
    }

    /// Sets the monotonic time of the clock, in nanoseconds.
    pub fn set_nanos(&self, nanos: i64) {
        self.nanos.store(nanos, Ordering::Release);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> i64 {
        self.nanos.load(Ordering::Acquire)
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.base + TimeDelta::nanoseconds(self.now_nanos())
    }
}
