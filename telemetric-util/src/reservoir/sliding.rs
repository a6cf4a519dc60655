use std::sync::Arc;

use parking_lot::Mutex;

use super::Reservoir;
use crate::{Clock, Sample, Snapshot, SnapshotError};

#[derive(Debug)]
struct Window {
    samples: Vec<Sample>,
    next: usize,
    count: u64,
}

/// A reservoir holding exactly the most recently recorded values.
///
/// Backed by a fixed-size ring buffer: once full, each new value overwrites the oldest one.
#[derive(Debug)]
pub struct SlidingWindowReservoir {
    capacity: usize,
    window: Mutex<Window>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowReservoir {
    /// Creates a new `SlidingWindowReservoir` holding the last `size` values.
    pub fn new(size: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = size.max(1);
        Self {
            capacity,
            window: Mutex::new(Window { samples: Vec::with_capacity(capacity), next: 0, count: 0 }),
            clock,
        }
    }
}

impl Reservoir for SlidingWindowReservoir {
    fn update_with_tag(&self, value: i64, tag: Option<&str>) {
        let sample = Sample::new(value, tag.map(str::to_owned), 1.0, self.clock.now_nanos());

        let mut window = self.window.lock();
        window.count += 1;
        if window.samples.len() < self.capacity {
            window.samples.push(sample);
        } else {
            let next = window.next;
            window.samples[next] = sample;
        }
        window.next = (window.next + 1) % self.capacity;
    }

    fn snapshot(&self, reset: bool) -> Result<Snapshot, SnapshotError> {
        let (count, samples) = {
            let mut window = self.window.lock();
            let state = (window.count, window.samples.clone());
            if reset {
                window.samples.clear();
                window.next = 0;
                window.count = 0;
            }
            state
        };

        Ok(Snapshot::from_uniform(count, samples))
    }

    fn reset(&self) {
        let mut window = self.window.lock();
        window.samples.clear();
        window.next = 0;
        window.count = 0;
    }

    fn size(&self) -> usize {
        self.window.lock().samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::SlidingWindowReservoir;
    use crate::{ManualClock, Reservoir};
    use crossbeam_utils::thread;
    use std::sync::Arc;

    #[test]
    fn test_holds_last_values() {
        let reservoir = SlidingWindowReservoir::new(3, Arc::new(ManualClock::new()));
        for value in 1..=10 {
            reservoir.update(value);
        }

        let snapshot = reservoir.snapshot(false).unwrap();
        assert_eq!(snapshot.values(), vec![8, 9, 10]);
        assert_eq!(snapshot.count(), 10);
        assert_eq!(reservoir.size(), 3);
    }

    #[test]
    fn test_concurrent_writers_are_all_counted() {
        let reservoir = SlidingWindowReservoir::new(64, Arc::new(ManualClock::new()));
        thread::scope(|s| {
            for t in 0..8i64 {
                let reservoir = &reservoir;
                s.spawn(move |_| {
                    for value in 0..5_000 {
                        reservoir.update(t * 5_000 + value);
                    }
                });
            }
        })
        .unwrap();

        let snapshot = reservoir.snapshot(false).unwrap();
        assert_eq!(snapshot.count(), 40_000);
        assert_eq!(snapshot.size(), 64);
        assert!(reservoir.size() <= 64);
    }

    #[test]
    fn test_partially_filled_window() {
        let reservoir = SlidingWindowReservoir::new(5, Arc::new(ManualClock::new()));
        reservoir.update(4);
        reservoir.update(2);

        let snapshot = reservoir.snapshot(false).unwrap();
        assert_eq!(snapshot.values(), vec![2, 4]);
        assert_eq!(snapshot.size(), 2);
    }

    #[test]
    fn test_window_keeps_sliding_after_reset() {
        let reservoir = SlidingWindowReservoir::new(2, Arc::new(ManualClock::new()));
        for value in 1..=5 {
            reservoir.update_with_tag(value, Some("before"));
        }

        let drained = reservoir.snapshot(true).unwrap();
        assert_eq!(drained.values(), vec![4, 5]);
        assert_eq!(reservoir.size(), 0);

        for value in 10..=12 {
            reservoir.update(value);
        }
        assert_eq!(reservoir.snapshot(false).unwrap().values(), vec![11, 12]);
    }
}
