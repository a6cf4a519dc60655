//! Point-in-time summaries of reservoirs.
use std::cmp::Ordering;

use crate::Quantile;

/// A single recorded value.
///
/// Samples are immutable once stored.  `weight` is `1.0` for reservoirs that do not weight their
/// samples, and `recorded_at` is the monotonic time, in nanoseconds, at which the sample was taken.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    value: i64,
    user_value: Option<String>,
    weight: f64,
    recorded_at: i64,
}

impl Sample {
    /// Creates a new `Sample`.
    pub fn new(value: i64, user_value: Option<String>, weight: f64, recorded_at: i64) -> Self {
        Self { value, user_value, weight, recorded_at }
    }

    /// Recorded value.
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Tag supplied alongside the value, if any.
    pub fn user_value(&self) -> Option<&str> {
        self.user_value.as_deref()
    }

    /// Weight of this sample relative to the others in the same reservoir.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Monotonic time, in nanoseconds, at which the sample was recorded.
    pub fn recorded_at(&self) -> i64 {
        self.recorded_at
    }

    pub(crate) fn scale_weight(&mut self, factor: f64) {
        self.weight *= factor;
    }
}

#[derive(Clone, Debug)]
enum Distribution {
    Uniform,
    Weighted { normalized: Vec<f64>, quantiles: Vec<f64> },
    Bucketed { buckets: Vec<(i64, i64, u64)>, total: u64 },
}

/// An immutable statistical summary of a reservoir.
///
/// Snapshots are plain values: taking a snapshot copies whatever it needs out of the reservoir, so
/// later updates to the reservoir never affect a snapshot that has already been taken.
#[derive(Clone, Debug)]
pub struct Snapshot {
    count: u64,
    size: usize,
    sum: f64,
    min: i64,
    max: i64,
    min_user_value: Option<String>,
    max_user_value: Option<String>,
    mean: f64,
    stddev: f64,
    last_value: Option<i64>,
    last_user_value: Option<String>,
    samples: Vec<Sample>,
    distribution: Distribution,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn empty() -> Self {
        Self {
            count: 0,
            size: 0,
            sum: 0.0,
            min: 0,
            max: 0,
            min_user_value: None,
            max_user_value: None,
            mean: 0.0,
            stddev: 0.0,
            last_value: None,
            last_user_value: None,
            samples: Vec::new(),
            distribution: Distribution::Uniform,
        }
    }

    /// Creates a snapshot over equally weighted samples.
    ///
    /// `count` is the total number of updates the reservoir has seen, which may be larger than
    /// the number of samples it kept.
    pub fn from_uniform(count: u64, mut samples: Vec<Sample>) -> Self {
        if samples.is_empty() {
            return Self { count, ..Self::empty() };
        }

        samples.sort_by_key(|s| s.value);

        let n = samples.len() as f64;
        let sum = samples.iter().map(|s| s.value as f64).sum::<f64>();
        let mean = sum / n;
        let stddev = if samples.len() > 1 {
            let squares = samples.iter().map(|s| (s.value as f64 - mean).powi(2)).sum::<f64>();
            (squares / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        Self::from_sorted(count, sum, mean, stddev, samples, Distribution::Uniform)
    }

    /// Creates a snapshot over samples with individual weights.
    ///
    /// Weights are normalized, so only their relative magnitude matters.  Quantiles are resolved by
    /// cumulative weight rather than by rank.
    pub fn from_weighted(count: u64, mut samples: Vec<Sample>) -> Self {
        if samples.is_empty() {
            return Self { count, ..Self::empty() };
        }

        samples.sort_by_key(|s| s.value);

        let total_weight = samples.iter().map(|s| s.weight).sum::<f64>();
        let normalized = samples
            .iter()
            .map(|s| if total_weight != 0.0 { s.weight / total_weight } else { 0.0 })
            .collect::<Vec<_>>();

        let mut quantiles = Vec::with_capacity(samples.len());
        let mut cumulative = 0.0;
        for weight in &normalized {
            quantiles.push(cumulative);
            cumulative += weight;
        }

        let sum = samples.iter().map(|s| s.value as f64).sum::<f64>();
        let mean = samples.iter().zip(&normalized).map(|(s, w)| s.value as f64 * w).sum::<f64>();
        // Unbiased for reliability weights, which reduces to `n - 1` when all weights are equal.
        let correction = 1.0 - normalized.iter().map(|w| w * w).sum::<f64>();
        let stddev = if samples.len() > 1 && correction > 0.0 {
            let variance = samples
                .iter()
                .zip(&normalized)
                .map(|(s, w)| w * (s.value as f64 - mean).powi(2))
                .sum::<f64>();
            (variance / correction).sqrt()
        } else {
            0.0
        };

        let distribution = Distribution::Weighted { normalized, quantiles };
        Self::from_sorted(count, sum, mean, stddev, samples, distribution)
    }

    /// Creates a snapshot over bucketed counts.
    ///
    /// `buckets` holds, in ascending order, the lowest and highest value equivalent to each
    /// non-empty bucket along with the number of values counted in it.  `min`, `max` and `sum` are
    /// the exact values tracked alongside the buckets.
    pub fn from_buckets(
        count: u64,
        sum: f64,
        min: i64,
        max: i64,
        buckets: Vec<(i64, i64, u64)>,
    ) -> Self {
        let total = buckets.iter().map(|(_, _, c)| *c).sum::<u64>();
        if total == 0 {
            return Self { count, ..Self::empty() };
        }

        let mean = sum / total as f64;
        let stddev = if total > 1 {
            let squares = buckets
                .iter()
                .map(|(_, v, c)| (*v as f64 - mean).powi(2) * *c as f64)
                .sum::<f64>();
            (squares / (total - 1) as f64).sqrt()
        } else {
            0.0
        };

        Self {
            count,
            size: usize::try_from(total).unwrap_or(usize::MAX),
            sum,
            min,
            max,
            min_user_value: None,
            max_user_value: None,
            mean,
            stddev,
            last_value: None,
            last_user_value: None,
            samples: Vec::new(),
            distribution: Distribution::Bucketed { buckets, total },
        }
    }

    fn from_sorted(
        count: u64,
        sum: f64,
        mean: f64,
        stddev: f64,
        samples: Vec<Sample>,
        distribution: Distribution,
    ) -> Self {
        let (min, min_user_value) =
            samples.first().map(|s| (s.value, s.user_value.clone())).unwrap_or((0, None));
        let (max, max_user_value) =
            samples.last().map(|s| (s.value, s.user_value.clone())).unwrap_or((0, None));

        Self {
            count,
            size: samples.len(),
            sum,
            min,
            max,
            min_user_value,
            max_user_value,
            mean,
            stddev,
            last_value: None,
            last_user_value: None,
            samples,
            distribution,
        }
    }

    /// Attaches the most recently recorded value, and its tag, to this snapshot.
    pub fn with_last_value(mut self, value: i64, user_value: Option<String>) -> Self {
        self.last_value = Some(value);
        self.last_user_value = user_value;
        self
    }

    /// Total number of updates the reservoir had seen.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of values summarized by this snapshot.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether or not this snapshot summarizes any values.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Sum of the summarized values.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Smallest summarized value, or zero if empty.
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Largest summarized value, or zero if empty.
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Tag of the smallest value.
    pub fn min_user_value(&self) -> Option<&str> {
        self.min_user_value.as_deref()
    }

    /// Tag of the largest value.
    pub fn max_user_value(&self) -> Option<&str> {
        self.max_user_value.as_deref()
    }

    /// Mean of the summarized values.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Standard deviation of the summarized values.
    pub fn stddev(&self) -> f64 {
        self.stddev
    }

    /// Most recently recorded value, if known.
    pub fn last_value(&self) -> Option<i64> {
        self.last_value
    }

    /// Tag of the most recently recorded value.
    pub fn last_user_value(&self) -> Option<&str> {
        self.last_user_value.as_deref()
    }

    /// Samples backing this snapshot, sorted by value.
    ///
    /// Empty for bucketed snapshots, which do not keep individual values.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Values backing this snapshot, sorted ascending.
    pub fn values(&self) -> Vec<i64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    /// Gets the value at the given quantile.
    ///
    /// The quantile is clamped to `0.0..=1.0`; `NaN` is treated as `0.0`.  Returns `0.0` for an
    /// empty snapshot.
    pub fn value(&self, quantile: f64) -> f64 {
        if self.is_empty() {
            return 0.0;
        }

        let quantile = if quantile.is_nan() { 0.0 } else { quantile.clamp(0.0, 1.0) };
        match &self.distribution {
            Distribution::Uniform => self.uniform_value(quantile),
            Distribution::Weighted { quantiles, .. } => self.weighted_value(quantiles, quantile),
            Distribution::Bucketed { buckets, total } => {
                self.bucketed_value(buckets, *total, quantile)
            }
        }
    }

    fn uniform_value(&self, quantile: f64) -> f64 {
        let len = self.samples.len();
        let pos = quantile * (len as f64 + 1.0);
        let index = pos as usize;

        if index < 1 {
            return self.samples[0].value as f64;
        }
        if index >= len {
            return self.samples[len - 1].value as f64;
        }

        let lower = self.samples[index - 1].value as f64;
        let upper = self.samples[index].value as f64;
        lower + (pos - pos.floor()) * (upper - lower)
    }

    fn weighted_value(&self, quantiles: &[f64], quantile: f64) -> f64 {
        let pos = match quantiles.binary_search_by(|q| q.total_cmp(&quantile)) {
            Ok(idx) => idx,
            Err(insertion) => insertion.saturating_sub(1),
        };

        let len = self.samples.len();
        if pos >= len {
            return self.samples[len - 1].value as f64;
        }
        self.samples[pos].value as f64
    }

    fn bucketed_value(&self, buckets: &[(i64, i64, u64)], total: u64, quantile: f64) -> f64 {
        let target = ((quantile * total as f64).ceil() as u64).max(1);

        let mut seen = 0;
        for (_, value, count) in buckets {
            seen += count;
            if seen >= target {
                return (*value).clamp(self.min, self.max) as f64;
            }
        }

        self.max as f64
    }

    /// Number of summarized values less than or equal to `threshold`.
    ///
    /// Bucketed snapshots count every bucket whose lower bound is within the threshold, so a value
    /// recorded exactly at the threshold is always included.  The result carries the same precision
    /// as the buckets themselves.
    pub fn count_at_or_below(&self, threshold: i64) -> u64 {
        match &self.distribution {
            Distribution::Bucketed { buckets, .. } => {
                buckets
                    .iter()
                    .take_while(|(low, _, _)| *low <= threshold)
                    .map(|(_, _, c)| *c)
                    .sum()
            }
            _ => self.samples.partition_point(|s| s.value <= threshold) as u64,
        }
    }

    /// Normalized weight of each sample, in the same order as [`samples`](Self::samples).
    ///
    /// Uniform snapshots report equal weights; bucketed snapshots report nothing.
    pub fn normalized_weights(&self) -> Vec<f64> {
        match &self.distribution {
            Distribution::Uniform => {
                let n = self.samples.len() as f64;
                self.samples.iter().map(|_| 1.0 / n).collect()
            }
            Distribution::Weighted { normalized, .. } => normalized.clone(),
            Distribution::Bucketed { .. } => Vec::new(),
        }
    }

    /// Median value.
    pub fn median(&self) -> f64 {
        self.value(0.5)
    }

    /// Value at the 75th percentile.
    pub fn percentile_75(&self) -> f64 {
        self.value(0.75)
    }

    /// Value at the 95th percentile.
    pub fn percentile_95(&self) -> f64 {
        self.value(0.95)
    }

    /// Value at the 98th percentile.
    pub fn percentile_98(&self) -> f64 {
        self.value(0.98)
    }

    /// Value at the 99th percentile.
    pub fn percentile_99(&self) -> f64 {
        self.value(0.99)
    }

    /// Value at the 99.9th percentile.
    pub fn percentile_999(&self) -> f64 {
        self.value(0.999)
    }

    /// Values at each of the given quantiles, paired with the quantile itself.
    pub fn quantiles(&self, quantiles: &[Quantile]) -> Vec<(Quantile, f64)> {
        quantiles.iter().map(|q| (q.clone(), self.value(q.value()))).collect()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count
            && self.size == other.size
            && self.min == other.min
            && self.max == other.max
            && self.samples == other.samples
            && self.last_value == other.last_value
            && self.mean.total_cmp(&other.mean) == Ordering::Equal
    }
}
