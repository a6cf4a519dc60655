use std::{sync::Arc, time::Duration};

use telemetric_util::{Clock, Reservoir, SnapshotError, StripedAdder};

use crate::{ApdexFn, ApdexValue, ValueProvider};

/// An application performance index.
///
/// Durations are sampled into a reservoir and classified against a threshold `T` when read:
/// satisfied at or below `T`, tolerating up to `4T`, and frustrating beyond that.  The score is
/// `(satisfied + tolerating / 2) / total`.
#[derive(Debug)]
pub struct DefaultApdex {
    reservoir: Arc<dyn Reservoir>,
    threshold: i64,
    allow_warmup: bool,
    warmup_samples: u64,
    observed: StripedAdder,
    clock: Arc<dyn Clock>,
}

impl DefaultApdex {
    /// Creates a new `DefaultApdex`.
    ///
    /// When `allow_warmup` is `true`, the score is reported as `1.0` until `warmup_samples`
    /// durations have been tracked.
    pub fn new(
        reservoir: Arc<dyn Reservoir>,
        threshold: Duration,
        allow_warmup: bool,
        warmup_samples: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reservoir,
            threshold: duration_nanos(threshold),
            allow_warmup,
            warmup_samples,
            observed: StripedAdder::new(),
            clock,
        }
    }

    fn warming_up(&self) -> bool {
        self.allow_warmup && (self.observed.sum() as u64) < self.warmup_samples
    }
}

fn duration_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

impl ApdexFn for DefaultApdex {
    fn track(&self, duration: Duration) {
        self.reservoir.update(duration_nanos(duration));
        self.observed.increment();
    }

    fn current_time(&self) -> i64 {
        self.clock.now_nanos()
    }

    fn reset(&self) {
        self.reservoir.reset();
        self.observed.reset();
    }
}

impl ValueProvider<ApdexValue> for DefaultApdex {
    fn value(&self, reset: bool) -> Result<ApdexValue, SnapshotError> {
        let warming_up = self.warming_up();
        let snapshot = self.reservoir.snapshot(reset)?;

        let total = snapshot.size() as u64;
        let satisfied = snapshot.count_at_or_below(self.threshold);
        let tolerating =
            snapshot.count_at_or_below(self.threshold.saturating_mul(4)).saturating_sub(satisfied);
        let frustrating = total.saturating_sub(satisfied + tolerating);

        let score = if warming_up || total == 0 {
            1.0
        } else {
            (satisfied as f64 + tolerating as f64 / 2.0) / total as f64
        };

        Ok(ApdexValue { score, satisfied, tolerating, frustrating, sample_size: total })
    }
}

#[cfg(test)]
mod tests {
    use super::DefaultApdex;
    use crate::{Apdex, ApdexFn, ValueProvider};
    use approx::assert_relative_eq;
    use std::{sync::Arc, time::Duration};
    use telemetric_util::{ManualClock, ReservoirConfig};

    fn apdex(config: ReservoirConfig, allow_warmup: bool, warmup: u64) -> DefaultApdex {
        let clock = Arc::new(ManualClock::new());
        let reservoir = config.build(clock.clone());
        DefaultApdex::new(reservoir, Duration::from_millis(500), allow_warmup, warmup, clock)
    }

    #[test]
    fn test_score_classification() {
        let apdex = apdex(ReservoirConfig::uniform(1028).unwrap(), false, 0);
        for millis in [300, 300, 600, 2_100] {
            apdex.track(Duration::from_millis(millis));
        }

        let value = apdex.value(false).unwrap();
        assert_eq!(value.satisfied, 2);
        assert_eq!(value.tolerating, 1);
        assert_eq!(value.frustrating, 1);
        assert_eq!(value.sample_size, 4);
        assert_relative_eq!(value.score, 0.625);
    }

    #[test]
    fn test_score_with_hdr_reservoir() {
        let apdex = apdex(ReservoirConfig::hdr(1, 60_000_000_000, 3).unwrap(), false, 0);
        for millis in [300, 300, 600, 2_100] {
            apdex.track(Duration::from_millis(millis));
        }

        assert_relative_eq!(apdex.value(false).unwrap().score, 0.625);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let apdex = apdex(ReservoirConfig::uniform(16).unwrap(), false, 0);
        apdex.track(Duration::from_millis(500));
        apdex.track(Duration::from_millis(2_000));
        apdex.track(Duration::from_nanos(2_000_000_001));

        let value = apdex.value(false).unwrap();
        assert_eq!((value.satisfied, value.tolerating, value.frustrating), (1, 1, 1));
        assert_relative_eq!(value.score, 0.5);
    }

    #[test]
    fn test_hdr_boundaries_are_inclusive() {
        let apdex = apdex(ReservoirConfig::hdr(1, 60_000_000_000, 3).unwrap(), false, 0);
        apdex.track(Duration::from_millis(500));
        apdex.track(Duration::from_millis(2_000));

        let value = apdex.value(false).unwrap();
        assert_eq!((value.satisfied, value.tolerating, value.frustrating), (1, 1, 0));
        assert_relative_eq!(value.score, 0.75);
    }

    #[test]
    fn test_empty_score_is_perfect() {
        let apdex = apdex(ReservoirConfig::uniform(16).unwrap(), false, 0);
        let value = apdex.value(false).unwrap();
        assert_eq!(value.score, 1.0);
        assert_eq!(value.sample_size, 0);
    }

    #[test]
    fn test_warmup_reports_perfect_score() {
        let apdex = apdex(ReservoirConfig::uniform(16).unwrap(), true, 3);
        apdex.track(Duration::from_secs(10));
        apdex.track(Duration::from_secs(10));
        assert_eq!(apdex.value(false).unwrap().score, 1.0);

        apdex.track(Duration::from_secs(10));
        assert_eq!(apdex.value(false).unwrap().score, 0.0);
    }

    #[test]
    fn test_context_tracks_on_drop() {
        let clock = Arc::new(ManualClock::new());
        let inner = Arc::new(DefaultApdex::new(
            ReservoirConfig::uniform(16).unwrap().build(clock.clone()),
            Duration::from_millis(500),
            false,
            0,
            clock.clone(),
        ));
        let handle = Apdex::from_arc(inner.clone());

        {
            let context = handle.start();
            clock.advance(Duration::from_millis(700));
            assert_eq!(context.elapsed(), Duration::from_millis(700));
        }

        let value = inner.value(true).unwrap();
        assert_eq!(value.tolerating, 1);
        assert_relative_eq!(value.score, 0.5);
        assert_eq!(inner.value(false).unwrap().sample_size, 0);
    }
}
