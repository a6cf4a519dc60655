use std::sync::Arc;

use telemetric_util::Clock;

use super::{Factory, MetricsRegistry};
use crate::{
    Apdex, ApdexOptions, ApdexValue, Counter, CounterOptions, CounterValue, EnvironmentInfo, Gauge,
    GaugeOptions, Histogram, HistogramOptions, HistogramValue, Meter, MeterOptions, MeterValue,
    MetricsDataValueSource, MetricsFilter, Timer, TimerOptions, TimerValue,
};

/// A registry that records nothing.
///
/// Every handle it returns is a no-op, and reading it always yields an empty data tree.
#[derive(Debug)]
pub struct NoopMetricsRegistry {
    clock: Arc<dyn Clock>,
    environment: EnvironmentInfo,
}

impl NoopMetricsRegistry {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, environment: EnvironmentInfo::capture() }
    }
}

impl MetricsRegistry for NoopMetricsRegistry {
    fn counter(&self, _options: &CounterOptions) -> Counter {
        Counter::noop()
    }

    fn counter_with(
        &self,
        _options: &CounterOptions,
        _factory: Factory<'_, Counter, CounterValue>,
    ) -> Counter {
        Counter::noop()
    }

    fn gauge(&self, _options: &GaugeOptions) -> Gauge {
        Gauge::noop()
    }

    fn gauge_with(&self, _options: &GaugeOptions, _factory: Factory<'_, Gauge, f64>) -> Gauge {
        Gauge::noop()
    }

    fn meter(&self, _options: &MeterOptions) -> Meter {
        Meter::noop()
    }

    fn meter_with(
        &self,
        _options: &MeterOptions,
        _factory: Factory<'_, Meter, MeterValue>,
    ) -> Meter {
        Meter::noop()
    }

    fn histogram(&self, _options: &HistogramOptions) -> Histogram {
        Histogram::noop()
    }

    fn histogram_with(
        &self,
        _options: &HistogramOptions,
        _factory: Factory<'_, Histogram, HistogramValue>,
    ) -> Histogram {
        Histogram::noop()
    }

    fn timer(&self, _options: &TimerOptions) -> Timer {
        Timer::noop()
    }

    fn timer_with(
        &self,
        _options: &TimerOptions,
        _factory: Factory<'_, Timer, TimerValue>,
    ) -> Timer {
        Timer::noop()
    }

    fn apdex(&self, _options: &ApdexOptions) -> Apdex {
        Apdex::noop()
    }

    fn apdex_with(
        &self,
        _options: &ApdexOptions,
        _factory: Factory<'_, Apdex, ApdexValue>,
    ) -> Apdex {
        Apdex::noop()
    }

    fn remove_context(&self, _context: &str) {}

    fn clear(&self) {}

    fn get_data(&self, _filter: &MetricsFilter) -> MetricsDataValueSource {
        MetricsDataValueSource::empty(self.clock.utc_now(), self.environment.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::NoopMetricsRegistry;
    use crate::{CounterOptions, MetricsFilter, MetricsRegistry, TimerOptions};
    use std::{sync::Arc, time::Duration};
    use telemetric_util::SystemClock;

    #[test]
    fn test_noop_registry() {
        let registry = NoopMetricsRegistry::new(Arc::new(SystemClock::new()));

        let counter = registry.counter(&CounterOptions::builder("c").build().unwrap());
        assert!(counter.is_noop());
        counter.increment(1);

        let timer = registry.timer(&TimerOptions::builder("t").build().unwrap());
        timer.record(Duration::from_secs(1));
        assert_eq!(timer.time(|| 3), 3);

        registry.remove_context("application");
        registry.clear();
        assert!(registry.get_data(&MetricsFilter::new()).is_empty());
    }
}
