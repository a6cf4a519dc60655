//! Atomic primitives used for counting.
//!
//! Counters are read-modify-written from many threads at once, so the cells backing them must
//! never share a cache line with another hot field.  [`PaddedAtomic`] provides a single such
//! cell, while [`StripedAdder`] spreads contended additions over several padded cells and sums
//! them on read.

use std::{
    cell::Cell,
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicI64, Ordering},
};

use crossbeam_utils::CachePadded;

/// Upper bound on the number of stripes an adder will allocate by default.
const MAX_STRIPES: usize = 32;

thread_local! {
    static PROBE: Cell<u64> = Cell::new(initial_probe());
}

fn initial_probe() -> u64 {
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);

    // A zero probe would make every hash land on the first stripe, so force at least one bit on.
    hasher.finish() | 1
}

fn thread_probe() -> u64 {
    PROBE.with(|p| p.get())
}

fn set_thread_probe(probe: u64) {
    PROBE.with(|p| p.set(probe));
}

/// A 64-bit signed atomic integer that occupies its own cache line.
#[derive(Debug, Default)]
pub struct PaddedAtomic {
    value: CachePadded<AtomicI64>,
}

impl PaddedAtomic {
    /// Creates a new `PaddedAtomic` holding `value`.
    pub fn new(value: i64) -> Self {
        Self { value: CachePadded::new(AtomicI64::new(value)) }
    }

    /// Gets the current value.
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Sets the current value.
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Adds `delta` to the value, returning the updated value.
    pub fn add(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::AcqRel).wrapping_add(delta)
    }

    /// Increments the value by one, returning the updated value.
    pub fn increment(&self) -> i64 {
        self.add(1)
    }

    /// Decrements the value by one, returning the updated value.
    pub fn decrement(&self) -> i64 {
        self.add(-1)
    }

    /// Sets the value to `value`, returning the previous value.
    pub fn get_and_set(&self, value: i64) -> i64 {
        self.value.swap(value, Ordering::AcqRel)
    }

    /// Resets the value to zero, returning the previous value.
    pub fn get_and_reset(&self) -> i64 {
        self.get_and_set(0)
    }

    /// Sets the value to `new` if it currently equals `expected`.
    ///
    /// Returns `true` if the swap happened.
    pub fn compare_and_swap(&self, expected: i64, new: i64) -> bool {
        self.value.compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    #[inline]
    fn try_add(&self, delta: i64) -> bool {
        let current = self.value.load(Ordering::Relaxed);
        self.value
            .compare_exchange_weak(
                current,
                current.wrapping_add(delta),
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }
}

/// A counter striped across multiple cache-line-padded cells.
///
/// Each thread is assigned a home stripe through a thread-local probe.  Additions attempt a CAS on
/// the home stripe; when the CAS fails because another thread is updating the same stripe, the
/// thread probes linearly to the next stripe and remembers it as its new home.  After a full lap of
/// failed attempts, the addition falls back to an unconditional `fetch_add`, so every addition
/// completes in a bounded number of steps.
///
/// Reading the value sums all stripes.  The sum is eventually consistent: a read concurrent with
/// writers may or may not include their additions, but no addition is ever lost or double
/// counted.
#[derive(Debug)]
pub struct StripedAdder {
    stripes: Box<[PaddedAtomic]>,
    mask: usize,
}

impl StripedAdder {
    /// Creates a new `StripedAdder` with a stripe count derived from the number of CPUs.
    pub fn new() -> Self {
        let stripes = num_cpus::get().max(1).next_power_of_two().min(MAX_STRIPES);
        Self::with_stripes(stripes)
    }

    /// Creates a new `StripedAdder` with at least `stripes` stripes.
    ///
    /// The stripe count is rounded up to the next power of two, with a minimum of one.
    pub fn with_stripes(stripes: usize) -> Self {
        let count = stripes.max(1).next_power_of_two();
        let stripes = (0..count).map(|_| PaddedAtomic::default()).collect::<Vec<_>>();

        Self { stripes: stripes.into_boxed_slice(), mask: count - 1 }
    }

    /// Number of stripes in this adder.
    pub fn stripes(&self) -> usize {
        self.stripes.len()
    }

    /// Adds `delta` to the adder.
    pub fn add(&self, delta: i64) {
        let mut probe = thread_probe();
        let start = probe;

        for _ in 0..self.stripes.len() {
            let stripe = &self.stripes[probe as usize & self.mask];
            if stripe.try_add(delta) {
                if probe != start {
                    set_thread_probe(probe);
                }
                return;
            }

            probe = probe.wrapping_add(1);
        }

        // Every stripe was contended on this lap, so just force the update through.
        let stripe = &self.stripes[probe as usize & self.mask];
        let _ = stripe.add(delta);
        set_thread_probe(probe);
    }

    /// Increments the adder by one.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Decrements the adder by one.
    pub fn decrement(&self) {
        self.add(-1);
    }

    /// Gets the sum of all stripes.
    pub fn sum(&self) -> i64 {
        self.stripes.iter().fold(0i64, |acc, s| acc.wrapping_add(s.get()))
    }

    /// Resets all stripes to zero.
    ///
    /// Additions racing with a reset may survive it.  Use [`sum_then_reset`](Self::sum_then_reset)
    /// when the drained amount must be accounted for.
    pub fn reset(&self) {
        for stripe in self.stripes.iter() {
            stripe.set(0);
        }
    }

    /// Atomically drains every stripe, returning the sum of what was drained.
    ///
    /// Each stripe is swapped to zero individually, so every addition is counted either in the
    /// returned sum or in a later read, never both.
    pub fn sum_then_reset(&self) -> i64 {
        self.stripes.iter().fold(0i64, |acc, s| acc.wrapping_add(s.get_and_reset()))
    }
}

impl Default for StripedAdder {
    fn default() -> Self {
        Self::new()
    }
}
