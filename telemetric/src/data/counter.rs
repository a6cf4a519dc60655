use hashbrown::HashMap;
use parking_lot::RwLock;
use telemetric_util::{SnapshotError, StripedAdder};

use crate::{CounterFn, CounterItem, CounterValue, ValueProvider};

/// A counter that can go up and down, with optional per-item counts.
///
/// The total is kept in a [`StripedAdder`] so that heavily contended counters scale with the
/// number of writers.  Items are counted in their own adders, created on first use.  Item updates
/// and reset reads are serialized through the items lock, so a drained value never loses an item
/// update that its total already includes.
#[derive(Debug, Default)]
pub struct DefaultCounter {
    total: StripedAdder,
    items: RwLock<HashMap<String, StripedAdder>>,
}

impl DefaultCounter {
    /// Creates a new `DefaultCounter`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current total.
    pub fn count(&self) -> i64 {
        self.total.sum()
    }

    fn add_to_item(&self, item: &str, value: i64) {
        let items = self.items.read();
        if let Some(adder) = items.get(item) {
            adder.add(value);
            self.total.add(value);
            return;
        }
        drop(items);

        let mut items = self.items.write();
        items.entry(item.to_owned()).or_default().add(value);
        self.total.add(value);
    }

    fn read(&self, reset: bool) -> CounterValue {
        let (count, items) = if reset {
            let mut items = self.items.write();
            let count = self.total.sum_then_reset();
            let drained = std::mem::take(&mut *items)
                .into_iter()
                .map(|(k, v)| (k, v.sum()))
                .collect::<Vec<_>>();
            (count, drained)
        } else {
            let items = self.items.read();
            (self.total.sum(), items.iter().map(|(k, v)| (k.clone(), v.sum())).collect())
        };

        let mut items = items
            .into_iter()
            .map(|(item, item_count)| {
                let percent =
                    if count == 0 { 0.0 } else { item_count as f64 / count as f64 * 100.0 };
                CounterItem { item, count: item_count, percent: Some(percent) }
            })
            .collect::<Vec<_>>();
        items.sort_by(|a, b| a.item.cmp(&b.item));

        CounterValue { count, items }
    }
}

impl CounterFn for DefaultCounter {
    fn increment(&self, value: i64) {
        self.total.add(value);
    }

    fn decrement(&self, value: i64) {
        self.total.add(-value);
    }

    fn increment_item(&self, item: &str, value: i64) {
        self.add_to_item(item, value);
    }

    fn decrement_item(&self, item: &str, value: i64) {
        self.add_to_item(item, -value);
    }

    fn reset(&self) {
        self.items.write().clear();
        self.total.reset();
    }
}

impl ValueProvider<CounterValue> for DefaultCounter {
    fn value(&self, reset: bool) -> Result<CounterValue, SnapshotError> {
        Ok(self.read(reset))
    }
}
