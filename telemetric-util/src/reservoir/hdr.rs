use std::sync::{
    atomic::{AtomicI64, AtomicU64, Ordering},
    Arc,
};

use arc_swap::ArcSwap;

use super::Reservoir;
use crate::{ConfigError, Snapshot, SnapshotError};

const MAX_SIGNIFICANT_DIGITS: u8 = 5;

/// Bucket geometry of an HDR reservoir.
///
/// Values are grouped into buckets whose width doubles from one bucket to the next.  Each bucket
/// is split into `sub_bucket_count` linear sub-buckets, enough to resolve any value to the
/// configured number of significant decimal digits.  The lower half of every bucket after the
/// first overlaps with the previous bucket, so only the upper half of those is stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Layout {
    highest: u64,
    unit_magnitude: u32,
    sub_bucket_half_count_magnitude: u32,
    sub_bucket_count: u64,
    sub_bucket_half_count: u64,
    sub_bucket_mask: u64,
    counts_len: usize,
}

impl Layout {
    pub(crate) fn new(lowest: u64, highest: u64, digits: u8) -> Result<Self, ConfigError> {
        if digits > MAX_SIGNIFICANT_DIGITS {
            return Err(ConfigError::InvalidSignificantDigits(digits));
        }

        let invalid_range = ConfigError::InvalidTrackableRange { lowest, highest };
        if lowest < 1 || highest < lowest.saturating_mul(2) || highest > i64::MAX as u64 {
            return Err(invalid_range);
        }

        // Smallest power of two that can resolve `2 * 10^digits` distinct values.
        let single_unit_resolution = 2 * 10u64.pow(u32::from(digits));
        let sub_bucket_count_magnitude = 64 - (single_unit_resolution - 1).leading_zeros();
        let sub_bucket_half_count_magnitude = sub_bucket_count_magnitude.max(1) - 1;

        let unit_magnitude = 63 - lowest.leading_zeros();
        if unit_magnitude + sub_bucket_half_count_magnitude > 61 {
            return Err(invalid_range);
        }

        let sub_bucket_count = 1u64 << (sub_bucket_half_count_magnitude + 1);
        let sub_bucket_half_count = sub_bucket_count / 2;
        let sub_bucket_mask = (sub_bucket_count - 1) << unit_magnitude;

        let mut smallest_untrackable = sub_bucket_count << unit_magnitude;
        let mut bucket_count = 1usize;
        while smallest_untrackable <= highest {
            if smallest_untrackable > u64::MAX / 2 {
                bucket_count += 1;
                break;
            }
            smallest_untrackable <<= 1;
            bucket_count += 1;
        }

        Ok(Self {
            highest,
            unit_magnitude,
            sub_bucket_half_count_magnitude,
            sub_bucket_count,
            sub_bucket_half_count,
            sub_bucket_mask,
            counts_len: (bucket_count + 1) * sub_bucket_half_count as usize,
        })
    }

    fn bucket_index(&self, value: u64) -> u32 {
        let pow2_ceiling = 64 - (value | self.sub_bucket_mask).leading_zeros();
        pow2_ceiling - self.unit_magnitude - (self.sub_bucket_half_count_magnitude + 1)
    }

    fn index_for(&self, value: u64) -> usize {
        let bucket_index = self.bucket_index(value);
        let sub_bucket_index = value >> (bucket_index + self.unit_magnitude);
        let bucket_base = u64::from(bucket_index + 1) << self.sub_bucket_half_count_magnitude;

        (bucket_base + sub_bucket_index - self.sub_bucket_half_count) as usize
    }

    /// Lowest value that is counted at `index`.
    fn value_for(&self, index: usize) -> u64 {
        let index = index as u64;
        let mut bucket_index = (index >> self.sub_bucket_half_count_magnitude) as i64 - 1;
        let mut sub_bucket_index =
            (index & (self.sub_bucket_half_count - 1)) + self.sub_bucket_half_count;
        if bucket_index < 0 {
            sub_bucket_index -= self.sub_bucket_half_count;
            bucket_index = 0;
        }

        sub_bucket_index << (bucket_index as u32 + self.unit_magnitude)
    }

    /// Highest value that is counted in the same bucket as `value`.
    fn highest_equivalent(&self, value: u64) -> u64 {
        let bucket_index = self.bucket_index(value);
        let sub_bucket_index = value >> (bucket_index + self.unit_magnitude);
        let lowest = sub_bucket_index << (bucket_index + self.unit_magnitude);

        let range_magnitude = if sub_bucket_index >= self.sub_bucket_count {
            bucket_index + 1
        } else {
            bucket_index
        };

        lowest.saturating_add((1u64 << (self.unit_magnitude + range_magnitude)) - 1)
    }

    fn clamp(&self, value: i64) -> u64 {
        (value.max(0) as u64).min(self.highest)
    }
}

#[derive(Debug)]
struct Counts {
    buckets: Box<[AtomicU64]>,
    total: AtomicU64,
    min: AtomicI64,
    max: AtomicI64,
    sum: AtomicI64,
}

impl Counts {
    fn new(len: usize) -> Self {
        Self {
            buckets: (0..len).map(|_| AtomicU64::new(0)).collect(),
            total: AtomicU64::new(0),
            min: AtomicI64::new(i64::MAX),
            max: AtomicI64::new(i64::MIN),
            sum: AtomicI64::new(0),
        }
    }
}

/// A high-dynamic-range histogram reservoir.
///
/// Rather than sampling, every value is counted into a fixed-precision bucket, so quantiles are
/// recovered from the complete stream with a relative error of at most `10^-digits`.  Counting is
/// lock-free: each update is a handful of atomic operations.
///
/// Values outside of the trackable range are counted in the nearest edge bucket, while the exact
/// minimum, maximum and sum still reflect the value as recorded.
///
/// Taking a snapshot walks the buckets without stopping writers, and fails with
/// [`SnapshotError::ConcurrentModification`] if the walk did not observe a consistent state.
#[derive(Debug)]
pub struct HdrReservoir {
    layout: Layout,
    counts: ArcSwap<Counts>,
}

impl HdrReservoir {
    /// Creates a new `HdrReservoir` covering `lowest..=highest` with `digits` significant digits.
    pub fn new(lowest: u64, highest: u64, digits: u8) -> Result<Self, ConfigError> {
        Layout::new(lowest, highest, digits).map(Self::from_layout)
    }

    pub(crate) fn from_layout(layout: Layout) -> Self {
        Self { layout, counts: ArcSwap::from_pointee(Counts::new(layout.counts_len)) }
    }

    /// Total number of values recorded since creation or the last reset.
    pub fn count(&self) -> u64 {
        self.counts.load().total.load(Ordering::Acquire)
    }

    fn collect(&self, counts: &Counts) -> (Vec<(i64, i64, u64)>, u64) {
        let mut walked = 0;
        let mut buckets = Vec::new();
        for (index, bucket) in counts.buckets.iter().enumerate() {
            let count = bucket.load(Ordering::Acquire);
            if count == 0 {
                continue;
            }

            walked += count;
            let lowest = self.layout.value_for(index);
            let highest = self.layout.highest_equivalent(lowest);
            buckets.push((
                i64::try_from(lowest).unwrap_or(i64::MAX),
                i64::try_from(highest).unwrap_or(i64::MAX),
                count,
            ));
        }

        (buckets, walked)
    }

    fn build_snapshot(counts: &Counts, buckets: Vec<(i64, i64, u64)>, total: u64) -> Snapshot {
        if total == 0 {
            return Snapshot::empty();
        }

        let mut min = counts.min.load(Ordering::Acquire);
        let mut max = counts.max.load(Ordering::Acquire);
        if min > max {
            // Only possible while the sole write to a detached storage is still in flight.
            min = buckets.first().map_or(0, |(low, _, _)| *low);
            max = buckets.last().map_or(0, |(_, high, _)| *high);
        }
        let sum = counts.sum.load(Ordering::Acquire) as f64;

        Snapshot::from_buckets(total, sum, min, max, buckets)
    }
}

impl Reservoir for HdrReservoir {
    fn update_with_tag(&self, value: i64, _tag: Option<&str>) {
        let index = self.layout.index_for(self.layout.clamp(value));

        let counts = self.counts.load();
        counts.buckets[index].fetch_add(1, Ordering::AcqRel);
        counts.min.fetch_min(value, Ordering::AcqRel);
        counts.max.fetch_max(value, Ordering::AcqRel);
        counts.sum.fetch_add(value, Ordering::AcqRel);
        counts.total.fetch_add(1, Ordering::AcqRel);
    }

    fn snapshot(&self, reset: bool) -> Result<Snapshot, SnapshotError> {
        if reset {
            // Once swapped out, the old counts only receive writes that were already in flight, so
            // the walked buckets are taken as the authoritative total.
            let counts = self.counts.swap(Arc::new(Counts::new(self.layout.counts_len)));
            let (buckets, walked) = self.collect(&counts);
            return Ok(Self::build_snapshot(&counts, buckets, walked));
        }

        let counts = self.counts.load();
        let expected = counts.total.load(Ordering::Acquire);
        let (buckets, walked) = self.collect(&counts);
        let observed = counts.total.load(Ordering::Acquire);

        if expected != observed {
            return Err(SnapshotError::ConcurrentModification { expected, observed });
        }
        if walked != observed {
            return Err(SnapshotError::ConcurrentModification { expected, observed: walked });
        }

        Ok(Self::build_snapshot(&counts, buckets, observed))
    }

    fn reset(&self) {
        self.counts.store(Arc::new(Counts::new(self.layout.counts_len)));
    }

    fn size(&self) -> usize {
        usize::try_from(self.count()).unwrap_or(usize::MAX)
    }
}
