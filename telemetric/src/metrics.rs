use std::{fmt, sync::Arc};

use telemetric_util::Clock;

use crate::{
    config::Configuration,
    data::{FunctionGauge, RatioGauge},
    Apdex, ApdexOptions, Counter, CounterOptions, DefaultMetricsRegistry, Gauge, GaugeOptions,
    Histogram, HistogramOptions, Instrument, Meter, MeterOptions, MetricsBuilder,
    MetricsDataValueSource, MetricsFilter, MetricsRegistry, NoopMetricsRegistry, Timer,
    TimerOptions,
};

/// Entry point for recording and reading metrics.
///
/// `Metrics` is cheap to clone: every clone shares the same registry, so handles registered
/// through one clone are visible through all of them.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<dyn MetricsRegistry>,
    clock: Arc<dyn Clock>,
    enabled: bool,
}

impl Metrics {
    /// Creates a [`MetricsBuilder`] for configuring a new `Metrics`.
    pub fn builder() -> MetricsBuilder {
        MetricsBuilder::new()
    }

    pub(crate) fn from_config(config: Configuration) -> Self {
        let clock = config.clock.clone();
        let enabled = config.enabled;
        let registry: Arc<dyn MetricsRegistry> = if enabled {
            Arc::new(DefaultMetricsRegistry::new(config))
        } else {
            Arc::new(NoopMetricsRegistry::new(clock.clone()))
        };

        Self { registry, clock, enabled }
    }

    /// Gets or creates a counter.
    pub fn counter(&self, options: &CounterOptions) -> Counter {
        self.registry.counter(options)
    }

    /// Gets or creates a gauge holding the last value set.
    pub fn gauge(&self, options: &GaugeOptions) -> Gauge {
        self.registry.gauge(options)
    }

    /// Gets or creates a gauge whose value is computed by `f` every time metrics are read.
    ///
    /// If a gauge with the same identity already exists, `f` is dropped and the existing gauge is
    /// returned.
    pub fn gauge_fn<F>(&self, options: &GaugeOptions, f: F) -> Gauge
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.registry.gauge_with(options, &|| {
            let f = f.clone();
            Instrument::gauge(FunctionGauge::new(move || f()))
        })
    }

    /// Gets or creates a gauge reporting `numerator / denominator`.
    ///
    /// Reads as `NaN` when the denominator is zero.
    pub fn ratio_gauge<N, D>(&self, options: &GaugeOptions, numerator: N, denominator: D) -> Gauge
    where
        N: Fn() -> f64 + Send + Sync + 'static,
        D: Fn() -> f64 + Send + Sync + 'static,
    {
        let numerator = Arc::new(numerator);
        let denominator = Arc::new(denominator);
        self.registry.gauge_with(options, &|| {
            let (n, d) = (numerator.clone(), denominator.clone());
            Instrument::gauge(RatioGauge::new(move || n(), move || d()))
        })
    }

    /// Gets or creates a meter.
    pub fn meter(&self, options: &MeterOptions) -> Meter {
        self.registry.meter(options)
    }

    /// Gets or creates a histogram.
    pub fn histogram(&self, options: &HistogramOptions) -> Histogram {
        self.registry.histogram(options)
    }

    /// Gets or creates a timer.
    pub fn timer(&self, options: &TimerOptions) -> Timer {
        self.registry.timer(options)
    }

    /// Gets or creates an apdex score.
    pub fn apdex(&self, options: &ApdexOptions) -> Apdex {
        self.registry.apdex(options)
    }

    /// Reads every metric.
    pub fn snapshot(&self) -> MetricsDataValueSource {
        self.get_data(&MetricsFilter::default())
    }

    /// Reads every metric matching `filter`.
    pub fn get_data(&self, filter: &MetricsFilter) -> MetricsDataValueSource {
        self.registry.get_data(filter)
    }

    /// Detaches every metric registered in `context`.
    pub fn remove_context(&self, context: &str) {
        self.registry.remove_context(context)
    }

    /// Detaches every metric.
    pub fn clear(&self) {
        self.registry.clear()
    }

    /// Gets the underlying registry, for registering custom instruments.
    pub fn registry(&self) -> &Arc<dyn MetricsRegistry> {
        &self.registry
    }

    /// Gets the clock used for rates, durations and timestamps.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Whether metrics are being recorded.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("registry", &self.registry)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::Metrics;
    use crate::{GaugeOptions, MetricsRegistry};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn test_gauge_fn_is_evaluated_on_read() {
        let metrics = Metrics::builder().build().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let options = GaugeOptions::builder("queue_depth").build().unwrap();
        metrics.gauge_fn(&options, move || counted.fetch_add(1, Ordering::SeqCst) as f64 + 1.0);
        // second registration keeps the first function
        metrics.gauge_fn(&options, || -1.0);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let data = metrics.snapshot();
        let context = data.context("application").unwrap();
        assert_eq!(*context.gauges[0].value(), 1.0);
        assert_eq!(*metrics.snapshot().contexts[0].gauges[0].value(), 2.0);
    }

    #[test]
    fn test_ratio_gauge() {
        let metrics = Metrics::builder().build().unwrap();
        let options = GaugeOptions::builder("hit_ratio").build().unwrap();
        metrics.ratio_gauge(&options, || 3.0, || 4.0);
        let empty = GaugeOptions::builder("empty_ratio").build().unwrap();
        metrics.ratio_gauge(&empty, || 3.0, || 0.0);

        let data = metrics.snapshot();
        let gauges = &data.context("application").unwrap().gauges;
        assert_eq!(gauges[0].name(), "empty_ratio");
        assert!(gauges[0].value().is_nan());
        assert_eq!(*gauges[1].value(), 0.75);
    }

    #[test]
    fn test_clones_share_registry() {
        let metrics = Metrics::builder().build().unwrap();
        let clone = metrics.clone();
        assert!(Arc::ptr_eq(metrics.registry(), clone.registry()));

        let options = crate::CounterOptions::builder("requests").build().unwrap();
        metrics.counter(&options).increment(2);
        clone.counter(&options).increment(3);
        let data = clone.registry().get_data(&crate::MetricsFilter::new());
        assert_eq!(data.contexts[0].counters[0].value().count, 5);
    }
}
