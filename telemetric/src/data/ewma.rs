use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Interval between two ticks of a moving average, in seconds.
pub(crate) const TICK_INTERVAL_SECS: u64 = 5;

/// An exponentially weighted moving average of a rate.
///
/// The average only moves when ticked.  Ticks are driven by the owning meter, which guarantees
/// that only one thread ticks a given average at a time, so the rate itself is stored with plain
/// loads and stores.
#[derive(Debug)]
pub(crate) struct Ewma {
    alpha: f64,
    rate: AtomicU64,
    initialized: AtomicBool,
}

impl Ewma {
    /// Creates a moving average equivalent to a UNIX load average over `minutes`.
    pub fn over_minutes(minutes: u64) -> Self {
        let alpha = 1.0 - (-(TICK_INTERVAL_SECS as f64) / (60.0 * minutes as f64)).exp();
        Self::with_alpha(alpha)
    }

    pub fn with_alpha(alpha: f64) -> Self {
        Self { alpha, rate: AtomicU64::new(0f64.to_bits()), initialized: AtomicBool::new(false) }
    }

    /// Folds `count` events observed over the last interval into the average.
    pub fn tick(&self, count: i64) {
        let instant_rate = count as f64 / TICK_INTERVAL_SECS as f64;
        if self.initialized.swap(true, Ordering::AcqRel) {
            let rate = self.load();
            self.store(rate + self.alpha * (instant_rate - rate));
        } else {
            self.store(instant_rate);
        }
    }

    /// Applies `ticks` consecutive idle intervals at once.
    pub fn decay(&self, ticks: u64) {
        if ticks == 0 || !self.initialized.load(Ordering::Acquire) {
            return;
        }

        let factor = (1.0 - self.alpha).powf(ticks as f64);
        self.store(self.load() * factor);
    }

    /// Current rate, in events per second.
    pub fn rate_per_second(&self) -> f64 {
        self.load()
    }

    pub fn reset(&self) {
        self.initialized.store(false, Ordering::Release);
        self.store(0.0);
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Acquire))
    }

    fn store(&self, rate: f64) {
        self.rate.store(rate.to_bits(), Ordering::Release);
    }
}
