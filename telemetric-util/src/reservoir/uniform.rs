use std::sync::Arc;

use parking_lot::Mutex;

use super::{fastrand, Reservoir};
use crate::{Clock, Sample, Snapshot, SnapshotError};

#[derive(Debug)]
struct State {
    count: u64,
    samples: Vec<Sample>,
}

/// A uniform sampling reservoir.
///
/// [Reservoir sampling][rs] produces a statistically representative sample of a stream of values,
/// in a fixed amount of space, without knowing the length of the stream in advance.  This
/// reservoir is based on Vitter's ["Algorithm R"][vitter_paper]: once full, the `n`th value
/// replaces a random held value with probability `size / n`, so every value ever recorded is
/// equally likely to be present.
///
/// Random draws come from a fast, thread-local PRNG ([Xoshiro256**][xoshiro256starstar]), and the
/// count and samples are kept under a single narrow lock so they never disagree.
///
/// [rs]: https://en.wikipedia.org/wiki/Reservoir_sampling
/// [vitter_paper]: https://www.cs.umd.edu/~samir/498/vitter.pdf
/// [xoshiro256starstar]: https://prng.di.unimi.it
#[derive(Debug)]
pub struct UniformReservoir {
    capacity: usize,
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
}

impl UniformReservoir {
    /// Creates a new `UniformReservoir` that holds up to `size` samples.
    pub fn new(size: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = size.max(1);
        Self {
            capacity,
            state: Mutex::new(State { count: 0, samples: Vec::with_capacity(capacity) }),
            clock,
        }
    }

    /// Total number of values recorded since creation or the last reset.
    pub fn count(&self) -> u64 {
        self.state.lock().count
    }
}

impl Reservoir for UniformReservoir {
    fn update_with_tag(&self, value: i64, tag: Option<&str>) {
        let sample = Sample::new(value, tag.map(str::to_owned), 1.0, self.clock.now_nanos());

        let mut state = self.state.lock();
        state.count += 1;
        if state.samples.len() < self.capacity {
            state.samples.push(sample);
        } else {
            let idx = fastrand(state.count) as usize;
            if idx < self.capacity {
                state.samples[idx] = sample;
            }
        }
    }

    fn snapshot(&self, reset: bool) -> Result<Snapshot, SnapshotError> {
        let (count, samples) = {
            let mut state = self.state.lock();
            if reset {
                let count = std::mem::take(&mut state.count);
                let samples = std::mem::replace(
                    &mut state.samples,
                    Vec::with_capacity(self.capacity),
                );
                (count, samples)
            } else {
                (state.count, state.samples.clone())
            }
        };

        Ok(Snapshot::from_uniform(count, samples))
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.count = 0;
        state.samples.clear();
    }

    fn size(&self) -> usize {
        self.state.lock().samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::UniformReservoir;
    use crate::{ManualClock, Reservoir};
    use crossbeam_utils::thread;
    use std::sync::Arc;

    #[test]
    fn test_fills_before_sampling() {
        let reservoir = UniformReservoir::new(100, Arc::new(ManualClock::new()));
        for value in 0..10 {
            reservoir.update(value);
        }

        let snapshot = reservoir.snapshot(false).unwrap();
        assert_eq!(snapshot.size(), 10);
        assert_eq!(snapshot.count(), 10);
        assert_eq!(snapshot.values(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_size_is_bounded() {
        let reservoir = UniformReservoir::new(100, Arc::new(ManualClock::new()));
        for value in 0..1_000 {
            reservoir.update(value);
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
        let reservoir = UniformReservoir::new(64, Arc::new(ManualClock::new()));
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
        assert!(snapshot.values().iter().all(|v| (0..40_000).contains(v)));
    }

    #[test]
    fn test_inclusion_frequency_is_uniform() {
        const SIZE: usize = 10;
        const VALUES: i64 = 100;
        const TRIALS: usize = 5_000;

        let clock = Arc::new(ManualClock::new());
        let mut inclusions = vec![0usize; VALUES as usize];
        for _ in 0..TRIALS {
            let reservoir = UniformReservoir::new(SIZE, clock.clone());
            for value in 0..VALUES {
                reservoir.update(value);
            }

            for value in reservoir.snapshot(false).unwrap().values() {
                inclusions[value as usize] += 1;
            }
        }

        let expected = SIZE as f64 / VALUES as f64;
        for (value, count) in inclusions.iter().enumerate() {
            let frequency = *count as f64 / TRIALS as f64;
            assert!(
                (frequency - expected).abs() < 0.03,
                "value {} included with frequency {}, expected {}",
                value,
                frequency,
                expected
            );
        }
    }

    #[test]
    fn test_snapshot_with_reset_drains() {
        let reservoir = UniformReservoir::new(5, Arc::new(ManualClock::new()));
        reservoir.update_with_tag(3, Some("req-1"));
        reservoir.update(9);

        let snapshot = reservoir.snapshot(true).unwrap();
        assert_eq!(snapshot.count(), 2);
        assert_eq!(snapshot.min_user_value(), Some("req-1"));
        assert_eq!(reservoir.size(), 0);

        let empty = reservoir.snapshot(false).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.count(), 0);
    }
}
