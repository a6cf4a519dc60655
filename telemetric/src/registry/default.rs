use std::{collections::BTreeMap, fmt, sync::Arc};

use telemetric_util::{MetricKind, SnapshotError};
use tracing::debug;

use super::{
    shards::{Entry, Pending, Shards},
    Factory, Instrument, MetricsRegistry,
};
use crate::{
    config::Configuration,
    data::{DefaultApdex, DefaultCounter, DefaultHistogram, DefaultMeter, DefaultTimer, ValueGauge},
    Apdex, ApdexOptions, ApdexValue, Counter, CounterOptions, CounterValue, EnvironmentInfo, Gauge,
    GaugeOptions, Histogram, HistogramOptions, HistogramValue, Meter, MeterOptions, MeterValue,
    MetricValueSource, MetricsContextValueSource, MetricsDataValueSource, MetricsFilter, Timer,
    TimerOptions, TimerValue, Unit, ValueProvider,
};

/// Applies a counter's reporting options to every value read from it.
struct CounterReporting {
    inner: Arc<dyn ValueProvider<CounterValue>>,
    report_set_items: bool,
    report_item_percentages: bool,
}

impl ValueProvider<CounterValue> for CounterReporting {
    fn value(&self, reset: bool) -> Result<CounterValue, SnapshotError> {
        let value = self.inner.value(reset)?;
        Ok(value.with_reporting(self.report_set_items, self.report_item_percentages))
    }
}

/// The default registry.
///
/// Instruments of each kind are kept in their own set of shards, so registrations and reads of
/// unrelated metrics rarely contend on the same lock.
pub struct DefaultMetricsRegistry {
    config: Configuration,
    environment: EnvironmentInfo,
    counters: Shards<Counter, CounterValue>,
    gauges: Shards<Gauge, f64>,
    meters: Shards<Meter, MeterValue>,
    histograms: Shards<Histogram, HistogramValue>,
    timers: Shards<Timer, TimerValue>,
    apdex_scores: Shards<Apdex, ApdexValue>,
}

impl DefaultMetricsRegistry {
    pub(crate) fn new(config: Configuration) -> Self {
        Self {
            config,
            environment: EnvironmentInfo::capture(),
            counters: Shards::new(MetricKind::Counter),
            gauges: Shards::new(MetricKind::Gauge),
            meters: Shards::new(MetricKind::Meter),
            histograms: Shards::new(MetricKind::Histogram),
            timers: Shards::new(MetricKind::Timer),
            apdex_scores: Shards::new(MetricKind::Apdex),
        }
    }

    fn read_into<V, F>(
        &self,
        pending: Vec<Pending<V>>,
        contexts: &mut BTreeMap<String, MetricsContextValueSource>,
        mut place: F,
    ) where
        F: FnMut(&mut MetricsContextValueSource, MetricValueSource<V>),
    {
        for pending in pending {
            let context = pending.context().to_owned();
            if let Some(source) = pending.read(self.config.snapshot_retries) {
                let tree = contexts.entry(context).or_insert_with_key(|context| {
                    MetricsContextValueSource::empty(context.clone())
                });
                place(tree, source);
            }
        }
    }
}

fn entry<H, V>(instrument: Instrument<H, V>, unit: &Unit, reset_on_reporting: bool) -> Entry<H, V> {
    let (handle, provider) = instrument.into_parts();
    Entry { handle, provider, unit: unit.clone(), reset_on_reporting }
}

impl MetricsRegistry for DefaultMetricsRegistry {
    fn counter(&self, options: &CounterOptions) -> Counter {
        self.counter_with(options, &|| Instrument::counter(DefaultCounter::new()))
    }

    fn counter_with(
        &self,
        options: &CounterOptions,
        factory: Factory<'_, Counter, CounterValue>,
    ) -> Counter {
        let identity = options.identity(&self.config.default_context, &self.config.global_tags);
        self.counters.get_or_create(identity, || {
            let (handle, provider) = factory().into_parts();
            let provider = Arc::new(CounterReporting {
                inner: provider,
                report_set_items: options.report_set_items(),
                report_item_percentages: options.report_item_percentages(),
            });
            Entry {
                handle,
                provider,
                unit: options.unit().clone(),
                reset_on_reporting: options.reset_on_reporting(),
            }
        })
    }

    fn gauge(&self, options: &GaugeOptions) -> Gauge {
        self.gauge_with(options, &|| Instrument::gauge(ValueGauge::new()))
    }

    fn gauge_with(&self, options: &GaugeOptions, factory: Factory<'_, Gauge, f64>) -> Gauge {
        let identity = options.identity(&self.config.default_context, &self.config.global_tags);
        self.gauges.get_or_create(identity, || {
            entry(factory(), options.unit(), options.reset_on_reporting())
        })
    }

    fn meter(&self, options: &MeterOptions) -> Meter {
        let clock = &self.config.clock;
        self.meter_with(options, &|| {
            Instrument::meter(DefaultMeter::new(options.rate_unit(), clock.clone()))
        })
    }

    fn meter_with(&self, options: &MeterOptions, factory: Factory<'_, Meter, MeterValue>) -> Meter {
        let identity = options.identity(&self.config.default_context, &self.config.global_tags);
        self.meters.get_or_create(identity, || {
            entry(factory(), options.unit(), options.reset_on_reporting())
        })
    }

    fn histogram(&self, options: &HistogramOptions) -> Histogram {
        let clock = &self.config.clock;
        let reservoir = options.reservoir().unwrap_or(&self.config.default_reservoir);
        self.histogram_with(options, &|| {
            Instrument::histogram(DefaultHistogram::new(
                reservoir.build(clock.clone()),
                options.quantiles(),
            ))
        })
    }

    fn histogram_with(
        &self,
        options: &HistogramOptions,
        factory: Factory<'_, Histogram, HistogramValue>,
    ) -> Histogram {
        let identity = options.identity(&self.config.default_context, &self.config.global_tags);
        self.histograms.get_or_create(identity, || {
            entry(factory(), options.unit(), options.reset_on_reporting())
        })
    }

    fn timer(&self, options: &TimerOptions) -> Timer {
        let clock = &self.config.clock;
        let reservoir = options.reservoir().unwrap_or(&self.config.default_reservoir);
        self.timer_with(options, &|| {
            Instrument::timer(DefaultTimer::new(
                reservoir.build(clock.clone()),
                options.quantiles(),
                options.rate_unit(),
                options.duration_unit(),
                clock.clone(),
            ))
        })
    }

    fn timer_with(&self, options: &TimerOptions, factory: Factory<'_, Timer, TimerValue>) -> Timer {
        let identity = options.identity(&self.config.default_context, &self.config.global_tags);
        self.timers.get_or_create(identity, || {
            entry(factory(), options.unit(), options.reset_on_reporting())
        })
    }

    fn apdex(&self, options: &ApdexOptions) -> Apdex {
        let clock = &self.config.clock;
        self.apdex_with(options, &|| {
            Instrument::apdex(DefaultApdex::new(
                options.reservoir().build(clock.clone()),
                options.threshold(),
                options.allow_warmup(),
                options.sample_size() as u64,
                clock.clone(),
            ))
        })
    }

    fn apdex_with(&self, options: &ApdexOptions, factory: Factory<'_, Apdex, ApdexValue>) -> Apdex {
        let identity = options.identity(&self.config.default_context, &self.config.global_tags);
        self.apdex_scores.get_or_create(identity, || {
            entry(factory(), options.unit(), options.reset_on_reporting())
        })
    }

    fn remove_context(&self, context: &str) {
        let removed = self.counters.remove_context(context)
            + self.gauges.remove_context(context)
            + self.meters.remove_context(context)
            + self.histograms.remove_context(context)
            + self.timers.remove_context(context)
            + self.apdex_scores.remove_context(context);
        debug!(context, removed, "removed metrics context");
    }

    fn clear(&self) {
        let removed = self.counters.clear()
            + self.gauges.clear()
            + self.meters.clear()
            + self.histograms.clear()
            + self.timers.clear()
            + self.apdex_scores.clear();
        debug!(removed, "cleared metrics");
    }

    fn get_data(&self, filter: &MetricsFilter) -> MetricsDataValueSource {
        let timestamp = self.config.clock.utc_now();

        let counters = self.counters.collect(filter);
        let gauges = self.gauges.collect(filter);
        let meters = self.meters.collect(filter);
        let histograms = self.histograms.collect(filter);
        let timers = self.timers.collect(filter);
        let apdex_scores = self.apdex_scores.collect(filter);

        let mut contexts = BTreeMap::new();
        self.read_into(counters, &mut contexts, |c, s| c.counters.push(s));
        self.read_into(gauges, &mut contexts, |c, s| c.gauges.push(s));
        self.read_into(meters, &mut contexts, |c, s| c.meters.push(s));
        self.read_into(histograms, &mut contexts, |c, s| c.histograms.push(s));
        self.read_into(timers, &mut contexts, |c, s| c.timers.push(s));
        self.read_into(apdex_scores, &mut contexts, |c, s| c.apdex_scores.push(s));

        MetricsDataValueSource::new(timestamp, self.environment.clone(), contexts.into_values())
    }
}

impl fmt::Debug for DefaultMetricsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultMetricsRegistry")
            .field("default_context", &self.config.default_context)
            .field("global_tags", &self.config.global_tags)
            .finish_non_exhaustive()
    }
}
