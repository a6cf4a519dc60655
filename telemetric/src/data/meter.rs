use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use hashbrown::HashMap;
use parking_lot::RwLock;
use telemetric_util::{Clock, SnapshotError, StripedAdder};

use super::ewma::{Ewma, TICK_INTERVAL_SECS};
use crate::{MeterFn, MeterItem, MeterValue, TimeUnit, ValueProvider};

const TICK_INTERVAL_NANOS: i64 = TICK_INTERVAL_SECS as i64 * 1_000_000_000;
const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Rates of a stream of events.
///
/// Tracks the total count, the mean rate since creation, and one, five and fifteen-minute
/// exponentially weighted moving averages.
///
/// Averages are ticked lazily: every mark and every read checks how many tick intervals have
/// passed since the last tick, and the thread that wins the race to advance the last tick applies
/// them.  The first elapsed tick flushes the events marked since the previous tick, and any further
/// idle ticks are applied as a single closed-form decay.
#[derive(Debug)]
pub struct DefaultMeter {
    count: StripedAdder,
    pending: StripedAdder,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    start_time: AtomicI64,
    last_tick: AtomicI64,
    items: RwLock<HashMap<String, DefaultMeter>>,
    rate_unit: TimeUnit,
    clock: Arc<dyn Clock>,
}

impl DefaultMeter {
    /// Creates a new `DefaultMeter` reporting rates per `rate_unit`.
    pub fn new(rate_unit: TimeUnit, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_nanos();
        Self {
            count: StripedAdder::new(),
            pending: StripedAdder::new(),
            m1: Ewma::over_minutes(1),
            m5: Ewma::over_minutes(5),
            m15: Ewma::over_minutes(15),
            start_time: AtomicI64::new(now),
            last_tick: AtomicI64::new(now),
            items: RwLock::new(HashMap::new()),
            rate_unit,
            clock,
        }
    }

    /// Total number of events marked.
    pub fn count(&self) -> i64 {
        self.count.sum()
    }

    fn tick_if_necessary(&self) {
        let old_tick = self.last_tick.load(Ordering::Acquire);
        let now = self.clock.now_nanos();
        let age = now - old_tick;
        if age < TICK_INTERVAL_NANOS {
            return;
        }

        let new_tick = now - age % TICK_INTERVAL_NANOS;
        if self
            .last_tick
            .compare_exchange(old_tick, new_tick, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let ticks = (age / TICK_INTERVAL_NANOS) as u64;
            let flushed = self.pending.sum_then_reset();
            for ewma in [&self.m1, &self.m5, &self.m15] {
                ewma.tick(flushed);
                ewma.decay(ticks - 1);
            }
        }
    }

    fn rates(&self, count: i64, now: i64) -> MeterValue {
        let elapsed = (now - self.start_time.load(Ordering::Acquire)) as f64 / NANOS_PER_SEC;
        let mean_rate = if count == 0 || elapsed <= 0.0 { 0.0 } else { count as f64 / elapsed };

        MeterValue {
            count,
            mean_rate: self.rate_unit.scale_rate(mean_rate),
            one_minute_rate: self.rate_unit.scale_rate(self.m1.rate_per_second()),
            five_minute_rate: self.rate_unit.scale_rate(self.m5.rate_per_second()),
            fifteen_minute_rate: self.rate_unit.scale_rate(self.m15.rate_per_second()),
            rate_unit: self.rate_unit,
            items: Vec::new(),
        }
    }

    fn reset_rates(&self, now: i64) {
        self.pending.reset();
        for ewma in [&self.m1, &self.m5, &self.m15] {
            ewma.reset();
        }
        self.start_time.store(now, Ordering::Release);
        self.last_tick.store(now, Ordering::Release);
    }

    /// Reads the meter, clearing it in the same step when `reset` is `true`.
    pub fn read(&self, reset: bool) -> MeterValue {
        self.tick_if_necessary();
        let now = self.clock.now_nanos();

        // Item marks happen under the items lock, so the total and the items drained by one read
        // always cover the same marks.
        let (mut value, items) = if reset {
            let mut items = self.items.write();
            let value = self.rates(self.count.sum_then_reset(), now);
            self.reset_rates(now);
            let drained = std::mem::take(&mut *items)
                .into_iter()
                .map(|(item, meter)| (item, meter.read(false)))
                .collect::<Vec<_>>();
            (value, drained)
        } else {
            let items = self.items.read();
            let value = self.rates(self.count.sum(), now);
            let read =
                items.iter().map(|(item, meter)| (item.clone(), meter.read(false))).collect();
            (value, read)
        };

        let count = value.count;
        let mut items = items
            .into_iter()
            .map(|(item, value)| {
                let percent =
                    if count > 0 { value.count as f64 / count as f64 * 100.0 } else { 0.0 };
                MeterItem { item, percent, value }
            })
            .collect::<Vec<_>>();
        items.sort_by(|a, b| a.item.cmp(&b.item));
        value.items = items;

        value
    }
}

impl MeterFn for DefaultMeter {
    fn mark(&self, value: i64) {
        self.tick_if_necessary();
        self.count.add(value);
        self.pending.add(value);
    }

    fn mark_item(&self, item: &str, value: i64) {
        let items = self.items.read();
        if let Some(meter) = items.get(item) {
            self.mark(value);
            meter.mark(value);
            return;
        }
        drop(items);

        let mut items = self.items.write();
        self.mark(value);
        items
            .entry(item.to_owned())
            .or_insert_with(|| DefaultMeter::new(self.rate_unit, self.clock.clone()))
            .mark(value);
    }

    fn reset(&self) {
        self.count.reset();
        self.reset_rates(self.clock.now_nanos());
        self.items.write().clear();
    }
}

impl ValueProvider<MeterValue> for DefaultMeter {
    fn value(&self, reset: bool) -> Result<MeterValue, SnapshotError> {
        Ok(self.read(reset))
    }
}
