//! Registries of instruments.
//!
//! A registry guarantees that, for any identity, exactly one instrument is ever live: every
//! registration of the same `(context, name, tags)` resolves to the same instrument, no matter how
//! many threads race to create it.
use std::{fmt, sync::Arc};

use crate::{
    Apdex, ApdexFn, ApdexOptions, ApdexValue, Counter, CounterFn, CounterOptions, CounterValue,
    Gauge, GaugeFn, GaugeOptions, Histogram, HistogramFn, HistogramOptions, HistogramValue, Meter,
    MeterFn, MeterOptions, MeterValue, MetricsDataValueSource, MetricsFilter, Timer, TimerFn,
    TimerOptions, TimerValue, ValueProvider,
};

mod default;
pub use default::DefaultMetricsRegistry;

mod noop;
pub use noop::NoopMetricsRegistry;

mod shards;

/// An instrument about to be registered: the handle callers record through, and the provider the
/// registry reads values from.
///
/// Both usually point at the same underlying instrument, which the typed constructors take care of.
pub struct Instrument<H, V> {
    handle: H,
    provider: Arc<dyn ValueProvider<V>>,
}

impl<H, V> Instrument<H, V> {
    /// Creates an instrument from a handle and a provider.
    pub fn from_parts(handle: H, provider: Arc<dyn ValueProvider<V>>) -> Self {
        Self { handle, provider }
    }

    pub(crate) fn into_parts(self) -> (H, Arc<dyn ValueProvider<V>>) {
        (self.handle, self.provider)
    }
}

impl Instrument<Counter, CounterValue> {
    /// Wraps a counter.
    pub fn counter<C>(counter: C) -> Self
    where
        C: CounterFn + ValueProvider<CounterValue> + 'static,
    {
        let counter = Arc::new(counter);
        Self { handle: Counter::from_arc(counter.clone()), provider: counter }
    }
}

impl Instrument<Gauge, f64> {
    /// Wraps a gauge.
    pub fn gauge<G>(gauge: G) -> Self
    where
        G: GaugeFn + ValueProvider<f64> + 'static,
    {
        let gauge = Arc::new(gauge);
        Self { handle: Gauge::from_arc(gauge.clone()), provider: gauge }
    }
}

impl Instrument<Meter, MeterValue> {
    /// Wraps a meter.
    pub fn meter<M>(meter: M) -> Self
    where
        M: MeterFn + ValueProvider<MeterValue> + 'static,
    {
        let meter = Arc::new(meter);
        Self { handle: Meter::from_arc(meter.clone()), provider: meter }
    }
}

impl Instrument<Histogram, HistogramValue> {
    /// Wraps a histogram.
    pub fn histogram<T>(histogram: T) -> Self
    where
        T: HistogramFn + ValueProvider<HistogramValue> + 'static,
    {
        let histogram = Arc::new(histogram);
        Self { handle: Histogram::from_arc(histogram.clone()), provider: histogram }
    }
}

impl Instrument<Timer, TimerValue> {
    /// Wraps a timer.
    pub fn timer<T>(timer: T) -> Self
    where
        T: TimerFn + ValueProvider<TimerValue> + 'static,
    {
        let timer = Arc::new(timer);
        Self { handle: Timer::from_arc(timer.clone()), provider: timer }
    }
}

impl Instrument<Apdex, ApdexValue> {
    /// Wraps an apdex score.
    pub fn apdex<A>(apdex: A) -> Self
    where
        A: ApdexFn + ValueProvider<ApdexValue> + 'static,
    {
        let apdex = Arc::new(apdex);
        Self { handle: Apdex::from_arc(apdex.clone()), provider: apdex }
    }
}

impl<H: fmt::Debug, V> fmt::Debug for Instrument<H, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument").field("handle", &self.handle).finish_non_exhaustive()
    }
}

/// A factory creating an instrument on first registration.
pub type Factory<'a, H, V> = &'a dyn Fn() -> Instrument<H, V>;

/// A registry of instruments.
///
/// Each `*_with` method takes a factory which is only called when no instrument with the same
/// identity exists yet.  If one does, it is returned as-is and the options of the new registration
/// are ignored.
pub trait MetricsRegistry: Send + Sync + fmt::Debug {
    /// Gets or creates a counter.
    fn counter(&self, options: &CounterOptions) -> Counter;

    /// Gets or creates a counter, using `factory` to create it.
    fn counter_with(
        &self,
        options: &CounterOptions,
        factory: Factory<'_, Counter, CounterValue>,
    ) -> Counter;

    /// Gets or creates a value gauge.
    fn gauge(&self, options: &GaugeOptions) -> Gauge;

    /// Gets or creates a gauge, using `factory` to create it.
    fn gauge_with(&self, options: &GaugeOptions, factory: Factory<'_, Gauge, f64>) -> Gauge;

    /// Gets or creates a meter.
    fn meter(&self, options: &MeterOptions) -> Meter;

    /// Gets or creates a meter, using `factory` to create it.
    fn meter_with(&self, options: &MeterOptions, factory: Factory<'_, Meter, MeterValue>) -> Meter;

    /// Gets or creates a histogram.
    fn histogram(&self, options: &HistogramOptions) -> Histogram;

    /// Gets or creates a histogram, using `factory` to create it.
    fn histogram_with(
        &self,
        options: &HistogramOptions,
        factory: Factory<'_, Histogram, HistogramValue>,
    ) -> Histogram;

    /// Gets or creates a timer.
    fn timer(&self, options: &TimerOptions) -> Timer;

    /// Gets or creates a timer, using `factory` to create it.
    fn timer_with(&self, options: &TimerOptions, factory: Factory<'_, Timer, TimerValue>) -> Timer;

    /// Gets or creates an apdex score.
    fn apdex(&self, options: &ApdexOptions) -> Apdex;

    /// Gets or creates an apdex score, using `factory` to create it.
    fn apdex_with(&self, options: &ApdexOptions, factory: Factory<'_, Apdex, ApdexValue>) -> Apdex;

    /// Detaches every instrument of `context`.
    ///
    /// Handles that were already handed out keep working, but are no longer reported.
    fn remove_context(&self, context: &str);

    /// Detaches every instrument.
    fn clear(&self);

    /// Reads every instrument matching `filter`.
    fn get_data(&self, filter: &MetricsFilter) -> MetricsDataValueSource;
}
