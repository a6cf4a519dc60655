use std::{hash::BuildHasher, iter::repeat_with, sync::Arc};

use hashbrown::{hash_map, DefaultHashBuilder, HashMap};
use parking_lot::RwLock;
use tracing::{debug, warn};

use telemetric_util::MetricKind;

use crate::{MetricIdentity, MetricValueSource, MetricsFilter, Unit, ValueProvider};

/// A registered instrument.
pub(crate) struct Entry<H, V> {
    pub handle: H,
    pub provider: Arc<dyn ValueProvider<V>>,
    pub unit: Unit,
    pub reset_on_reporting: bool,
}

/// Everything needed to read an instrument once its shard lock has been released.
pub(crate) struct Pending<V> {
    identity: MetricIdentity,
    provider: Arc<dyn ValueProvider<V>>,
    unit: Unit,
    reset_on_reporting: bool,
}

impl<V> Pending<V> {
    pub fn context(&self) -> &str {
        self.identity.context()
    }

    /// Reads the instrument, retrying reads that raced with writers up to `retries` times.
    ///
    /// Returns `None` when the instrument could not be read, in which case it is left out of the
    /// data tree.
    pub fn read(self, retries: usize) -> Option<MetricValueSource<V>> {
        let mut attempts = 0;
        let value = loop {
            match self.provider.value(self.reset_on_reporting) {
                Ok(value) => break value,
                Err(e) if e.is_retryable() && attempts < retries => attempts += 1,
                Err(e) => {
                    warn!(
                        metric = %self.identity,
                        error = %e,
                        attempts,
                        "omitting metric from snapshot"
                    );
                    return None;
                }
            }
        };

        let Pending { identity, unit, reset_on_reporting, .. } = self;
        Some(MetricValueSource::new(
            identity.name().to_owned(),
            unit,
            identity.tags().clone(),
            value,
            reset_on_reporting,
        ))
    }
}

type Shard<H, V> = RwLock<HashMap<MetricIdentity, Entry<H, V>>>;

/// Instruments of a single kind, spread across independently locked shards.
pub(crate) struct Shards<H, V> {
    kind: MetricKind,
    shards: Box<[Shard<H, V>]>,
    shard_mask: usize,
    hasher: DefaultHashBuilder,
}

impl<H: Clone, V> Shards<H, V> {
    pub fn new(kind: MetricKind) -> Self {
        let shard_count = std::cmp::max(1, num_cpus::get()).next_power_of_two();
        let shards = repeat_with(|| RwLock::new(HashMap::new())).take(shard_count).collect();

        Self { kind, shards, shard_mask: shard_count - 1, hasher: DefaultHashBuilder::default() }
    }

    fn shard(&self, identity: &MetricIdentity) -> &Shard<H, V> {
        let hash = self.hasher.hash_one(identity);
        &self.shards[hash as usize & self.shard_mask]
    }

    /// Gets the handle of the instrument registered under `identity`, creating it with `create`
    /// if there is none.
    ///
    /// `create` runs with no lock held, so it may itself register instruments.  When several
    /// threads race on the same identity each may create an instrument, but only the first one
    /// inserted is kept and handed back to all of them.
    pub fn get_or_create<F>(&self, identity: MetricIdentity, create: F) -> H
    where
        F: FnOnce() -> Entry<H, V>,
    {
        let shard = self.shard(&identity);
        if let Some(entry) = shard.read().get(&identity) {
            return entry.handle.clone();
        }

        let created = create();
        let mut guard = shard.write();
        match guard.entry(identity) {
            hash_map::Entry::Occupied(existing) => existing.get().handle.clone(),
            hash_map::Entry::Vacant(vacant) => {
                debug!(metric = %vacant.key(), kind = %self.kind, "registered metric");
                vacant.insert(created).handle.clone()
            }
        }
    }

    /// Detaches every instrument of `context`, returning how many were detached.
    pub fn remove_context(&self, context: &str) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let mut shard = shard.write();
                let before = shard.len();
                shard.retain(|identity, _| identity.context() != context);
                before - shard.len()
            })
            .sum()
    }

    /// Detaches every instrument, returning how many were detached.
    pub fn clear(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let mut shard = shard.write();
                let len = shard.len();
                shard.clear();
                len
            })
            .sum()
    }

    /// Collects every instrument matching `filter`, to be read outside of the shard locks.
    pub fn collect(&self, filter: &MetricsFilter) -> Vec<Pending<V>> {
        if !filter.matches_kind(self.kind) {
            return Vec::new();
        }

        let mut pending = Vec::new();
        for shard in self.shards.iter() {
            let shard = shard.read();
            for (identity, entry) in shard.iter() {
                if filter.matches(self.kind, identity) {
                    pending.push(Pending {
                        identity: identity.clone(),
                        provider: entry.provider.clone(),
                        unit: entry.unit.clone(),
                        reset_on_reporting: entry.reset_on_reporting,
                    });
                }
            }
        }
        pending
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::{Entry, Shards};
    use crate::{data::DefaultCounter, Counter, MetricIdentity, MetricsFilter, Tags, Unit};
    use crossbeam_utils::thread;
    use parking_lot::Mutex;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use telemetric_util::{MetricKind, SnapshotError};

    fn entry(created: &AtomicUsize) -> Entry<Counter, crate::CounterValue> {
        created.fetch_add(1, Ordering::SeqCst);
        let counter = Arc::new(DefaultCounter::new());
        Entry {
            handle: Counter::from_arc(counter.clone()),
            provider: counter,
            unit: Unit::Calls,
            reset_on_reporting: false,
        }
    }

    fn identity(context: &str, name: &str) -> MetricIdentity {
        MetricIdentity::new(context, name, Tags::new()).unwrap()
    }

    #[test]
    fn test_racing_registrations_keep_one_instrument() {
        let shards = Shards::new(MetricKind::Counter);
        let created = AtomicUsize::new(0);
        let handles = Mutex::new(Vec::new());

        thread::scope(|s| {
            for _ in 0..50 {
                s.spawn(|_| {
                    let handle =
                        shards.get_or_create(identity("app", "requests"), || entry(&created));
                    handle.increment(1);
                    handles.lock().push(handle);
                });
            }
        })
        .unwrap();

        assert!(created.load(Ordering::SeqCst) >= 1);
        assert_eq!(shards.len(), 1);
        let handles = handles.into_inner();
        assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));

        let pending = shards.collect(&MetricsFilter::new());
        let value = pending.into_iter().next().and_then(|p| p.read(3)).unwrap();
        assert_eq!(value.value().count, 50);
        assert_eq!(value.unit(), &Unit::Calls);
    }

    #[test]
    fn test_factories_may_register_other_instruments() {
        let shards = Shards::new(MetricKind::Counter);
        let created = AtomicUsize::new(0);

        let parent = shards.get_or_create(identity("app", "parent"), || {
            for i in 0..64 {
                let child = shards
                    .get_or_create(identity("app", &format!("child-{}", i)), || entry(&created));
                child.increment(1);
            }
            entry(&created)
        });
        parent.increment(1);

        assert_eq!(created.load(Ordering::SeqCst), 65);
        assert_eq!(shards.len(), 65);
        let again = shards.get_or_create(identity("app", "parent"), || entry(&created));
        assert!(again.ptr_eq(&parent));
        assert_eq!(created.load(Ordering::SeqCst), 65);
    }

    #[test]
    fn test_remove_context_and_clear_are_idempotent() {
        let shards = Shards::new(MetricKind::Counter);
        let created = AtomicUsize::new(0);
        shards.get_or_create(identity("a", "x"), || entry(&created));
        shards.get_or_create(identity("a", "y"), || entry(&created));
        shards.get_or_create(identity("b", "x"), || entry(&created));

        assert_eq!(shards.remove_context("a"), 2);
        assert_eq!(shards.remove_context("a"), 0);
        assert_eq!(shards.len(), 1);

        assert_eq!(shards.clear(), 1);
        assert_eq!(shards.clear(), 0);
        assert_eq!(shards.len(), 0);
    }

    struct Flaky {
        failures: AtomicUsize,
    }

    impl crate::ValueProvider<crate::CounterValue> for Flaky {
        fn value(&self, _reset: bool) -> Result<crate::CounterValue, SnapshotError> {
            if self.failures.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(SnapshotError::ConcurrentModification { expected: 1, observed: 2 })
            } else {
                Ok(crate::CounterValue::default())
            }
        }
    }

    fn flaky_entry(failures: usize) -> Entry<Counter, crate::CounterValue> {
        Entry {
            handle: Counter::noop(),
            provider: Arc::new(Flaky { failures: AtomicUsize::new(failures) }),
            unit: Unit::None,
            reset_on_reporting: false,
        }
    }

    #[test]
    fn test_reads_retry_concurrent_modifications() {
        let shards = Shards::new(MetricKind::Counter);
        shards.get_or_create(identity("app", "x"), || flaky_entry(3));
        let pending = shards.collect(&MetricsFilter::new()).pop().unwrap();
        assert!(pending.read(3).is_some());

        let shards = Shards::new(MetricKind::Counter);
        shards.get_or_create(identity("app", "x"), || flaky_entry(4));
        let pending = shards.collect(&MetricsFilter::new()).pop().unwrap();
        assert!(pending.read(3).is_none());
    }
}
