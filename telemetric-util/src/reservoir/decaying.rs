use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use tracing::debug;

use super::{random_unit, Reservoir};
use crate::{Clock, Sample, Snapshot, SnapshotError};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Samples ordered by priority, with an insertion sequence to break ties.
type Key = (OrderedFloat<f64>, u64);

#[derive(Debug)]
struct State {
    values: BTreeMap<Key, Sample>,
    count: u64,
    landmark: i64,
    sequence: u64,
}

impl State {
    fn new(landmark: i64) -> Self {
        Self { values: BTreeMap::new(), count: 0, landmark, sequence: 0 }
    }
}

/// An exponentially decaying reservoir.
///
/// Uses Cormode et al.'s forward-decaying priority sampling: each value is given a weight of
/// `e^(alpha * t)`, where `t` is the number of seconds since the landmark, and a priority of
/// `weight / u` for a uniformly random `u`.  Only the highest-priority values are held, so the
/// reservoir favours recent values while still representing older ones.
///
/// Weights grow without bound as time passes, so the landmark is periodically moved forward: the
/// first thread to notice that the rescale deadline has passed wins the right to rescale, and
/// multiplies every held weight and priority by `e^(-alpha * elapsed)`.  Values whose weight
/// underflows to zero are dropped.
#[derive(Debug)]
pub struct ExponentiallyDecayingReservoir {
    capacity: usize,
    alpha: f64,
    rescale_interval: i64,
    next_rescale: AtomicI64,
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
}

impl ExponentiallyDecayingReservoir {
    /// Creates a new `ExponentiallyDecayingReservoir`.
    ///
    /// Holds up to `size` samples, decays by `alpha` per second, and rescales every
    /// `rescale_interval`.
    pub fn new(size: usize, alpha: f64, rescale_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_nanos();
        let rescale_interval =
            i64::try_from(rescale_interval.as_nanos()).unwrap_or(i64::MAX).max(1);

        Self {
            capacity: size.max(1),
            alpha,
            rescale_interval,
            next_rescale: AtomicI64::new(now.saturating_add(rescale_interval)),
            state: Mutex::new(State::new(now)),
            clock,
        }
    }

    /// Total number of values recorded since creation or the last reset.
    pub fn count(&self) -> u64 {
        self.state.lock().count
    }

    fn weight(&self, timestamp: i64, landmark: i64) -> f64 {
        let elapsed = (timestamp - landmark) as f64 / NANOS_PER_SEC;
        (self.alpha * elapsed).exp()
    }

    fn rescale_if_needed(&self, now: i64) {
        let next = self.next_rescale.load(Ordering::Acquire);
        if now < next {
            return;
        }

        let following = now.saturating_add(self.rescale_interval);
        if self
            .next_rescale
            .compare_exchange(next, following, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.rescale(now);
        }
    }

    fn rescale(&self, now: i64) {
        let mut state = self.state.lock();

        let old_landmark = std::mem::replace(&mut state.landmark, now);
        let factor = (-self.alpha * ((now - old_landmark) as f64 / NANOS_PER_SEC)).exp();

        let before = state.values.len();
        let values = std::mem::take(&mut state.values);
        for ((priority, seq), mut sample) in values {
            sample.scale_weight(factor);
            if sample.weight() == 0.0 {
                continue;
            }

            state.values.insert((OrderedFloat(priority.0 * factor), seq), sample);
        }

        debug!(
            factor,
            dropped = before - state.values.len(),
            held = state.values.len(),
            "rescaled decaying reservoir"
        );
    }
}

impl Reservoir for ExponentiallyDecayingReservoir {
    fn update_with_tag(&self, value: i64, tag: Option<&str>) {
        let now = self.clock.now_nanos();
        self.rescale_if_needed(now);

        let mut state = self.state.lock();
        let weight = self.weight(now, state.landmark);
        let priority = OrderedFloat(weight / random_unit());
        let sample = Sample::new(value, tag.map(str::to_owned), weight, now);

        state.count += 1;
        state.sequence = state.sequence.wrapping_add(1);
        let key = (priority, state.sequence);

        if state.values.len() < self.capacity {
            state.values.insert(key, sample);
            return;
        }

        let lowest = state.values.keys().next().map(|(p, _)| *p);
        if matches!(lowest, Some(lowest) if lowest < priority) {
            state.values.insert(key, sample);
            state.values.pop_first();
        }
    }

    fn snapshot(&self, reset: bool) -> Result<Snapshot, SnapshotError> {
        let now = self.clock.now_nanos();
        self.rescale_if_needed(now);

        let (count, samples) = {
            let mut state = self.state.lock();
            if reset {
                let old = std::mem::replace(&mut *state, State::new(now));
                let next_rescale = now.saturating_add(self.rescale_interval);
                self.next_rescale.store(next_rescale, Ordering::Release);
                (old.count, old.values.into_values().collect())
            } else {
                (state.count, state.values.values().cloned().collect::<Vec<_>>())
            }
        };

        Ok(Snapshot::from_weighted(count, samples))
    }

    fn reset(&self) {
        let now = self.clock.now_nanos();
        *self.state.lock() = State::new(now);
        self.next_rescale.store(now.saturating_add(self.rescale_interval), Ordering::Release);
    }

    fn size(&self) -> usize {
        self.state.lock().values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::ExponentiallyDecayingReservoir;
    use crate::{ManualClock, Reservoir};
    use approx::assert_relative_eq;
    use crossbeam_utils::thread;
    use std::{sync::Arc, time::Duration};

    const HOUR: Duration = Duration::from_secs(60 * 60);

    #[test]
    fn test_size_is_bounded() {
        let clock = Arc::new(ManualClock::new());
        let reservoir = ExponentiallyDecayingReservoir::new(100, 0.99, HOUR, clock.clone());
        for value in 0..1_000 {
            reservoir.update(value);
            clock.advance(Duration::from_millis(1));
        }

        assert_eq!(reservoir.size(), 100);
        assert_eq!(reservoir.count(), 1_000);

        let snapshot = reservoir.snapshot(false).unwrap();
        assert_eq!(snapshot.size(), 100);
        assert_eq!(snapshot.count(), 1_000);
        assert!(snapshot.values().iter().all(|v| (0..1_000).contains(v)));
    }

    #[test]
    fn test_concurrent_writers_are_all_counted() {
        let clock = Arc::new(ManualClock::new());
        let reservoir =
            ExponentiallyDecayingReservoir::new(64, 0.015, Duration::from_secs(1), clock.clone());

        thread::scope(|s| {
            for t in 0..8i64 {
                let (reservoir, clock) = (&reservoir, &clock);
                s.spawn(move |_| {
                    for value in 0..5_000 {
                        reservoir.update(t * 5_000 + value);
                        // One writer moves time along so that rescales race with updates.
                        if t == 0 && value % 500 == 0 {
                            clock.advance(Duration::from_millis(300));
                        }
                    }
                });
            }
        })
        .unwrap();

        assert_eq!(reservoir.count(), 40_000);
        assert!(reservoir.size() <= 64);

        let snapshot = reservoir.snapshot(false).unwrap();
        assert_eq!(snapshot.count(), 40_000);
        assert!(snapshot.size() <= 64);
        assert!(snapshot.values().iter().all(|v| (0..40_000).contains(v)));
    }

    #[test]
    fn test_small_stream_is_held_entirely() {
        let clock = Arc::new(ManualClock::new());
        let reservoir = ExponentiallyDecayingReservoir::new(1_000, 0.015, HOUR, clock);
        for value in 0..10 {
            reservoir.update(value);
        }

        let snapshot = reservoir.snapshot(false).unwrap();
        assert_eq!(snapshot.values(), (0..10).collect::<Vec<_>>());
        assert_relative_eq!(snapshot.normalized_weights().iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_recent_values_dominate() {
        let clock = Arc::new(ManualClock::new());
        let reservoir = ExponentiallyDecayingReservoir::new(100, 0.015, HOUR, clock.clone());
        for _ in 0..500 {
            reservoir.update(1);
        }

        clock.advance(Duration::from_secs(15 * 60));
        for _ in 0..500 {
            reservoir.update(2);
        }

        let snapshot = reservoir.snapshot(false).unwrap();
        let recent = snapshot.values().iter().filter(|v| **v == 2).count();
        assert!(recent >= 95, "only {} of 100 samples are recent", recent);
    }

    #[test]
    fn test_rescale_decays_existing_weights() {
        let alpha = 0.015;
        let interval = Duration::from_secs(60);
        let clock = Arc::new(ManualClock::new());
        let reservoir = ExponentiallyDecayingReservoir::new(10, alpha, interval, clock.clone());

        clock.advance(Duration::from_secs(30));
        reservoir.update(100);
        let original = reservoir.snapshot(false).unwrap().samples()[0].weight();
        assert_relative_eq!(original, (alpha * 30.0).exp(), max_relative = 1e-9);

        clock.advance(Duration::from_secs(30));
        reservoir.update(200);

        let snapshot = reservoir.snapshot(false).unwrap();
        let old = snapshot.samples().iter().find(|s| s.value() == 100).unwrap();
        let new = snapshot.samples().iter().find(|s| s.value() == 200).unwrap();

        assert_relative_eq!(old.weight(), original * (-alpha * 60.0).exp(), max_relative = 1e-9);
        assert_relative_eq!(new.weight(), 1.0, max_relative = 1e-9);
    }

    #[test]
    fn test_rescale_after_one_hour() {
        let alpha = 0.015;
        let clock = Arc::new(ManualClock::new());
        let reservoir = ExponentiallyDecayingReservoir::new(10, alpha, HOUR, clock.clone());

        reservoir.update(7);
        clock.advance(HOUR);
        reservoir.update(8);

        let snapshot = reservoir.snapshot(false).unwrap();
        let old = snapshot.samples().iter().find(|s| s.value() == 7).unwrap();
        assert_relative_eq!(old.weight(), (-alpha * 3_600.0).exp(), max_relative = 1e-9);
    }

    #[test]
    fn test_underflowing_weights_are_dropped() {
        let clock = Arc::new(ManualClock::new());
        let reservoir = ExponentiallyDecayingReservoir::new(10, 1.0, HOUR, clock.clone());

        reservoir.update(1);
        clock.advance(HOUR);
        reservoir.update(2);

        let snapshot = reservoir.snapshot(false).unwrap();
        assert_eq!(snapshot.values(), vec![2]);
        assert_eq!(snapshot.count(), 2);
    }

    #[test]
    fn test_long_idle_periods_stay_finite() {
        let clock = Arc::new(ManualClock::new());
        let reservoir = ExponentiallyDecayingReservoir::new(10, 0.015, HOUR, clock.clone());

        for hour in 0..48 {
            reservoir.update(hour);
            clock.advance(HOUR);
        }

        let snapshot = reservoir.snapshot(false).unwrap();
        assert!(snapshot.samples().iter().all(|s| s.weight().is_finite()));
        assert!(snapshot.mean().is_finite());
    }

    #[test]
    fn test_snapshot_with_reset() {
        let clock = Arc::new(ManualClock::new());
        let reservoir = ExponentiallyDecayingReservoir::new(10, 0.015, HOUR, clock);
        reservoir.update_with_tag(5, Some("slow"));

        let snapshot = reservoir.snapshot(true).unwrap();
        assert_eq!(snapshot.count(), 1);
        assert_eq!(snapshot.max_user_value(), Some("slow"));
        assert_eq!(reservoir.size(), 0);
        assert_eq!(reservoir.count(), 0);
    }
}
