use std::{sync::Arc, time::Duration};

use telemetric_util::{Clock, PaddedAtomic, Quantile, Reservoir, SnapshotError, StripedAdder};

use super::{DefaultHistogram, DefaultMeter};
use crate::{HistogramFn, MeterFn, TimeUnit, TimerFn, TimerValue, ValueProvider};

/// A timer: a histogram of durations combined with a meter of how often they were recorded.
///
/// Durations are always stored in nanoseconds.  The duration unit is only carried along so that
/// reporters know how to present them.
#[derive(Debug)]
pub struct DefaultTimer {
    histogram: DefaultHistogram,
    meter: DefaultMeter,
    active: PaddedAtomic,
    total_time: StripedAdder,
    duration_unit: TimeUnit,
    clock: Arc<dyn Clock>,
}

impl DefaultTimer {
    /// Creates a new `DefaultTimer`.
    pub fn new(
        reservoir: Arc<dyn Reservoir>,
        quantiles: Vec<Quantile>,
        rate_unit: TimeUnit,
        duration_unit: TimeUnit,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            histogram: DefaultHistogram::new(reservoir, quantiles),
            meter: DefaultMeter::new(rate_unit, clock.clone()),
            active: PaddedAtomic::new(0),
            total_time: StripedAdder::new(),
            duration_unit,
            clock,
        }
    }

    /// Number of timing sessions currently in progress.
    pub fn active_sessions(&self) -> i64 {
        self.active.get()
    }
}

impl TimerFn for DefaultTimer {
    fn record(&self, duration: Duration, user_value: Option<&str>) {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        self.histogram.update(nanos, user_value);
        self.meter.mark(1);
        self.total_time.add(nanos);
    }

    fn start_recording(&self) -> i64 {
        self.active.increment();
        self.clock.now_nanos()
    }

    fn end_recording(&self, start: i64) -> i64 {
        self.active.decrement();
        self.clock.now_nanos().saturating_sub(start).max(0)
    }

    fn current_time(&self) -> i64 {
        self.clock.now_nanos()
    }

    fn reset(&self) {
        self.histogram.reset();
        MeterFn::reset(&self.meter);
        self.total_time.reset();
    }
}

impl ValueProvider<TimerValue> for DefaultTimer {
    fn value(&self, reset: bool) -> Result<TimerValue, SnapshotError> {
        let histogram = self.histogram.read(reset)?;
        let rate = self.meter.read(reset);
        let total_time =
            if reset { self.total_time.sum_then_reset() } else { self.total_time.sum() };

        Ok(TimerValue {
            rate,
            histogram,
            active_sessions: self.active.get(),
            total_time,
            duration_unit: self.duration_unit,
        })
    }
}
