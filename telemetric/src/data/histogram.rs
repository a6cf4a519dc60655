use std::sync::Arc;

use parking_lot::Mutex;
use telemetric_util::{Quantile, Reservoir, SnapshotError};

use crate::{HistogramFn, HistogramValue, ValueProvider};

/// A histogram backed by a reservoir.
///
/// Besides whatever the reservoir keeps, the histogram remembers the most recently recorded value
/// and its tag, so the last value is always reported exactly even when the reservoir has sampled it
/// away.
#[derive(Debug)]
pub struct DefaultHistogram {
    reservoir: Arc<dyn Reservoir>,
    last: Mutex<Option<(i64, Option<String>)>>,
    quantiles: Vec<Quantile>,
}

impl DefaultHistogram {
    /// Creates a new `DefaultHistogram` over `reservoir`, reporting values at `quantiles` in
    /// addition to the fixed percentiles.
    pub fn new(reservoir: Arc<dyn Reservoir>, quantiles: Vec<Quantile>) -> Self {
        Self { reservoir, last: Mutex::new(None), quantiles }
    }

    /// Reads the histogram.
    pub fn read(&self, reset: bool) -> Result<HistogramValue, SnapshotError> {
        let snapshot = self.reservoir.snapshot(reset)?;
        let last = if reset { self.last.lock().take() } else { self.last.lock().clone() };

        let snapshot = match last {
            Some((value, user_value)) => snapshot.with_last_value(value, user_value),
            None => snapshot,
        };

        Ok(HistogramValue::from_snapshot(&snapshot, &self.quantiles))
    }
}

impl HistogramFn for DefaultHistogram {
    fn update(&self, value: i64, user_value: Option<&str>) {
        self.reservoir.update_with_tag(value, user_value);
        *self.last.lock() = Some((value, user_value.map(str::to_owned)));
    }

    fn reset(&self) {
        self.reservoir.reset();
        *self.last.lock() = None;
    }
}

impl ValueProvider<HistogramValue> for DefaultHistogram {
    fn value(&self, reset: bool) -> Result<HistogramValue, SnapshotError> {
        self.read(reset)
    }
}
