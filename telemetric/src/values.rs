//! Point-in-time values read from instruments.
use telemetric_util::{Quantile, Snapshot};

use crate::TimeUnit;

/// Count of a single item tracked by a counter.
#[derive(Clone, Debug, PartialEq)]
pub struct CounterItem {
    /// The item.
    pub item: String,
    /// Count recorded against the item.
    pub count: i64,
    /// Share of the counter's total attributed to the item, as a percentage.
    ///
    /// `None` when percentages are not reported.
    pub percent: Option<f64>,
}

/// Value of a counter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CounterValue {
    /// Total count.
    pub count: i64,
    /// Per-item counts, sorted by item.
    pub items: Vec<CounterItem>,
}

impl CounterValue {
    /// Applies reporting options to this value.
    pub fn with_reporting(mut self, report_set_items: bool, report_item_percentages: bool) -> Self {
        if !report_set_items {
            self.items.clear();
        } else if !report_item_percentages {
            for item in &mut self.items {
                item.percent = None;
            }
        }
        self
    }
}

/// Rates of a single item tracked by a meter.
#[derive(Clone, Debug, PartialEq)]
pub struct MeterItem {
    /// The item.
    pub item: String,
    /// Share of the meter's count attributed to the item, as a percentage.
    pub percent: f64,
    /// Rates of the item.
    pub value: MeterValue,
}

/// Value of a meter.
#[derive(Clone, Debug, PartialEq)]
pub struct MeterValue {
    /// Number of events marked.
    pub count: i64,
    /// Mean rate since the meter was created or last reset.
    pub mean_rate: f64,
    /// One-minute exponentially weighted moving average rate.
    pub one_minute_rate: f64,
    /// Five-minute exponentially weighted moving average rate.
    pub five_minute_rate: f64,
    /// Fifteen-minute exponentially weighted moving average rate.
    pub fifteen_minute_rate: f64,
    /// Unit of time the rates are expressed per.
    pub rate_unit: TimeUnit,
    /// Per-item rates, sorted by item.
    pub items: Vec<MeterItem>,
}

impl MeterValue {
    /// An empty meter value.
    pub fn empty(rate_unit: TimeUnit) -> Self {
        Self {
            count: 0,
            mean_rate: 0.0,
            one_minute_rate: 0.0,
            five_minute_rate: 0.0,
            fifteen_minute_rate: 0.0,
            rate_unit,
            items: Vec::new(),
        }
    }

    /// Re-expresses every rate per `unit`.
    pub fn scale_to(mut self, unit: TimeUnit) -> Self {
        let factor = unit.nanos() as f64 / self.rate_unit.nanos() as f64;
        self.mean_rate *= factor;
        self.one_minute_rate *= factor;
        self.five_minute_rate *= factor;
        self.fifteen_minute_rate *= factor;
        self.rate_unit = unit;
        self.items = self
            .items
            .into_iter()
            .map(|item| MeterItem { value: item.value.scale_to(unit), ..item })
            .collect();
        self
    }
}

/// Value of a histogram.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramValue {
    /// Total number of values recorded.
    pub count: u64,
    /// Number of values the statistics below were computed over.
    pub sample_size: usize,
    /// Sum of the summarized values.
    pub sum: f64,
    /// Most recently recorded value.
    pub last_value: Option<i64>,
    /// Tag of the most recently recorded value.
    pub last_user_value: Option<String>,
    /// Smallest value.
    pub min: i64,
    /// Tag of the smallest value.
    pub min_user_value: Option<String>,
    /// Largest value.
    pub max: i64,
    /// Tag of the largest value.
    pub max_user_value: Option<String>,
    /// Mean value.
    pub mean: f64,
    /// Standard deviation.
    pub stddev: f64,
    /// Median value.
    pub median: f64,
    /// 75th percentile.
    pub percentile_75: f64,
    /// 95th percentile.
    pub percentile_95: f64,
    /// 98th percentile.
    pub percentile_98: f64,
    /// 99th percentile.
    pub percentile_99: f64,
    /// 99.9th percentile.
    pub percentile_999: f64,
    /// Values at additional, labeled quantiles.
    pub quantiles: Vec<(Quantile, f64)>,
}

impl HistogramValue {
    /// Summarizes a reservoir snapshot, computing values for any extra `quantiles`.
    pub fn from_snapshot(snapshot: &Snapshot, quantiles: &[Quantile]) -> Self {
        Self {
            count: snapshot.count(),
            sample_size: snapshot.size(),
            sum: snapshot.sum(),
            last_value: snapshot.last_value(),
            last_user_value: snapshot.last_user_value().map(str::to_owned),
            min: snapshot.min(),
            min_user_value: snapshot.min_user_value().map(str::to_owned),
            max: snapshot.max(),
            max_user_value: snapshot.max_user_value().map(str::to_owned),
            mean: snapshot.mean(),
            stddev: snapshot.stddev(),
            median: snapshot.median(),
            percentile_75: snapshot.percentile_75(),
            percentile_95: snapshot.percentile_95(),
            percentile_98: snapshot.percentile_98(),
            percentile_99: snapshot.percentile_99(),
            percentile_999: snapshot.percentile_999(),
            quantiles: snapshot.quantiles(quantiles),
        }
    }
}

/// Value of a timer.
///
/// Durations in the histogram and the total time are in nanoseconds; use
/// [`duration_unit`](TimerValue::duration_unit) with [`TimeUnit::convert_nanos`] to express them
/// in the unit the timer was registered with.
#[derive(Clone, Debug, PartialEq)]
pub struct TimerValue {
    /// Rate at which durations were recorded.
    pub rate: MeterValue,
    /// Distribution of recorded durations, in nanoseconds.
    pub histogram: HistogramValue,
    /// Number of timing sessions currently in progress.
    pub active_sessions: i64,
    /// Sum of all recorded durations, in nanoseconds.
    pub total_time: i64,
    /// Unit durations should be reported in.
    pub duration_unit: TimeUnit,
}

impl TimerValue {
    /// Total recorded time, in the timer's duration unit.
    pub fn total_time_scaled(&self) -> f64 {
        self.duration_unit.convert_nanos(self.total_time as f64)
    }
}

/// Value of an apdex score.
#[derive(Clone, Debug, PartialEq)]
pub struct ApdexValue {
    /// The score, between `0.0` and `1.0`.
    pub score: f64,
    /// Number of satisfied samples.
    pub satisfied: u64,
    /// Number of tolerating samples.
    pub tolerating: u64,
    /// Number of frustrating samples.
    pub frustrating: u64,
    /// Number of samples the score was computed over.
    pub sample_size: u64,
}

#[cfg(test)]
mod tests {
    use super::{CounterItem, CounterValue, MeterItem, MeterValue};
    use crate::TimeUnit;
    use approx::assert_relative_eq;

    #[test]
    fn test_counter_reporting_options() {
        let value = CounterValue {
            count: 4,
            items: vec![CounterItem { item: "a".into(), count: 4, percent: Some(100.0) }],
        };

        assert!(value.clone().with_reporting(false, true).items.is_empty());
        assert_eq!(value.clone().with_reporting(true, false).items[0].percent, None);
        assert_eq!(value.with_reporting(true, true).items[0].percent, Some(100.0));
    }

    #[test]
    fn test_meter_rescaling() {
        let mut value = MeterValue::empty(TimeUnit::Seconds);
        value.mean_rate = 2.0;
        value.one_minute_rate = 1.0;
        value.items.push(MeterItem {
            item: "x".into(),
            percent: 50.0,
            value: MeterValue { mean_rate: 1.0, ..MeterValue::empty(TimeUnit::Seconds) },
        });

        let scaled = value.scale_to(TimeUnit::Minutes);
        assert_eq!(scaled.rate_unit, TimeUnit::Minutes);
        assert_relative_eq!(scaled.mean_rate, 120.0);
        assert_relative_eq!(scaled.one_minute_rate, 60.0);
        assert_relative_eq!(scaled.items[0].value.mean_rate, 60.0);
    }
}
