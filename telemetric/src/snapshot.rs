//! The data tree read out of a registry.
use chrono::{DateTime, Utc};

use crate::{
    ApdexValue, CounterValue, EnvironmentInfo, HistogramValue, MeterValue, Tags, TimerValue, Unit,
};

/// The value of a single metric, along with what identifies and describes it.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricValueSource<T> {
    name: String,
    unit: Unit,
    tags: Tags,
    value: T,
    reset_on_reporting: bool,
}

impl<T> MetricValueSource<T> {
    pub(crate) fn new(
        name: String,
        unit: Unit,
        tags: Tags,
        value: T,
        reset_on_reporting: bool,
    ) -> Self {
        Self { name, unit, tags, value, reset_on_reporting }
    }

    /// Name of the metric.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit of the metric.
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Tags of the metric.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// The value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Whether or not the metric was reset as part of being read.
    pub fn reset_on_reporting(&self) -> bool {
        self.reset_on_reporting
    }

    /// Consumes the source, returning the value.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// A counter value source.
pub type CounterValueSource = MetricValueSource<CounterValue>;
/// A gauge value source.
pub type GaugeValueSource = MetricValueSource<f64>;
/// A meter value source.
pub type MeterValueSource = MetricValueSource<MeterValue>;
/// A histogram value source.
pub type HistogramValueSource = MetricValueSource<HistogramValue>;
/// A timer value source.
pub type TimerValueSource = MetricValueSource<TimerValue>;
/// An apdex value source.
pub type ApdexValueSource = MetricValueSource<ApdexValue>;

/// Every metric of a single context.
///
/// Within each kind, metrics are sorted by name and then by tags.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsContextValueSource {
    /// Name of the context.
    pub context: String,
    /// Counters.
    pub counters: Vec<CounterValueSource>,
    /// Gauges.
    pub gauges: Vec<GaugeValueSource>,
    /// Meters.
    pub meters: Vec<MeterValueSource>,
    /// Histograms.
    pub histograms: Vec<HistogramValueSource>,
    /// Timers.
    pub timers: Vec<TimerValueSource>,
    /// Apdex scores.
    pub apdex_scores: Vec<ApdexValueSource>,
}

impl MetricsContextValueSource {
    pub(crate) fn empty(context: String) -> Self {
        Self {
            context,
            counters: Vec::new(),
            gauges: Vec::new(),
            meters: Vec::new(),
            histograms: Vec::new(),
            timers: Vec::new(),
            apdex_scores: Vec::new(),
        }
    }

    /// Whether or not the context holds no metrics at all.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
            && self.gauges.is_empty()
            && self.meters.is_empty()
            && self.histograms.is_empty()
            && self.timers.is_empty()
            && self.apdex_scores.is_empty()
    }

    fn sort(&mut self) {
        fn by_identity<T>(
            a: &MetricValueSource<T>,
            b: &MetricValueSource<T>,
        ) -> std::cmp::Ordering {
            a.name.cmp(&b.name).then_with(|| a.tags.cmp(&b.tags))
        }

        self.counters.sort_by(by_identity);
        self.gauges.sort_by(by_identity);
        self.meters.sort_by(by_identity);
        self.histograms.sort_by(by_identity);
        self.timers.sort_by(by_identity);
        self.apdex_scores.sort_by(by_identity);
    }
}

/// A point-in-time read of a registry.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsDataValueSource {
    /// When the data was read.
    pub timestamp: DateTime<Utc>,
    /// The environment the data was read in.
    pub environment: EnvironmentInfo,
    /// Every context holding at least one metric, sorted by name.
    pub contexts: Vec<MetricsContextValueSource>,
}

impl MetricsDataValueSource {
    pub(crate) fn new(
        timestamp: DateTime<Utc>,
        environment: EnvironmentInfo,
        contexts: impl IntoIterator<Item = MetricsContextValueSource>,
    ) -> Self {
        let mut contexts = contexts
            .into_iter()
            .filter(|c| !c.is_empty())
            .map(|mut c| {
                c.sort();
                c
            })
            .collect::<Vec<_>>();
        contexts.sort_by(|a, b| a.context.cmp(&b.context));

        Self { timestamp, environment, contexts }
    }

    /// An empty data tree.
    pub fn empty(timestamp: DateTime<Utc>, environment: EnvironmentInfo) -> Self {
        Self { timestamp, environment, contexts: Vec::new() }
    }

    /// Gets the data of a single context.
    pub fn context(&self, context: &str) -> Option<&MetricsContextValueSource> {
        self.contexts.iter().find(|c| c.context == context)
    }

    /// Whether or not no metrics were read.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricValueSource, MetricsContextValueSource, MetricsDataValueSource};
    use crate::{CounterValue, EnvironmentInfo, Tags, Unit};
    use chrono::Utc;

    fn counter(name: &str, count: i64) -> MetricValueSource<CounterValue> {
        let value = CounterValue { count, items: Vec::new() };
        MetricValueSource::new(name.to_owned(), Unit::Calls, Tags::new(), value, false)
    }

    #[test]
    fn test_tree_is_sorted_and_pruned() {
        let mut b = MetricsContextValueSource::empty("b".to_owned());
        b.counters.push(counter("zeta", 1));
        b.counters.push(counter("alpha", 2));
        let mut a = MetricsContextValueSource::empty("a".to_owned());
        a.gauges.push(MetricValueSource::new("g".to_owned(), Unit::None, Tags::new(), 1.5, false));
        let empty = MetricsContextValueSource::empty("c".to_owned());

        let data =
            MetricsDataValueSource::new(Utc::now(), EnvironmentInfo::capture(), [b, empty, a]);

        assert_eq!(data.contexts.len(), 2);
        assert_eq!(data.contexts[0].context, "a");
        let b = data.context("b").unwrap();
        assert_eq!(b.counters[0].name(), "alpha");
        assert_eq!(b.counters[1].value().count, 1);
        assert_eq!(b.counters[0].unit(), &Unit::Calls);
        assert!(data.context("c").is_none());
    }
}
