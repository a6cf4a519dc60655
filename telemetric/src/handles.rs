use std::{fmt, sync::Arc, time::Duration};

use telemetric_util::SnapshotError;

/// Reads the current value of an instrument.
///
/// When `reset` is `true`, the instrument is cleared as part of the same read, so that nothing
/// recorded concurrently is either lost or counted twice across the reset.
pub trait ValueProvider<T>: Send + Sync {
    /// Reads the current value.
    fn value(&self, reset: bool) -> Result<T, SnapshotError>;
}

/// A counter handler.
pub trait CounterFn: Send + Sync {
    /// Increments the counter by the given amount.
    fn increment(&self, value: i64);

    /// Decrements the counter by the given amount.
    fn decrement(&self, value: i64);

    /// Increments the count of `item` and the counter's total by the given amount.
    fn increment_item(&self, item: &str, value: i64);

    /// Decrements the count of `item` and the counter's total by the given amount.
    fn decrement_item(&self, item: &str, value: i64);

    /// Resets the counter, and all of its items, to zero.
    fn reset(&self);
}

/// A gauge handler.
pub trait GaugeFn: Send + Sync {
    /// Increments the gauge by the given amount.
    fn increment(&self, value: f64);

    /// Decrements the gauge by the given amount.
    fn decrement(&self, value: f64);

    /// Sets the gauge to the given amount.
    fn set(&self, value: f64);
}

/// A meter handler.
pub trait MeterFn: Send + Sync {
    /// Marks the occurrence of `value` events.
    fn mark(&self, value: i64);

    /// Marks the occurrence of `value` events against `item`.
    fn mark_item(&self, item: &str, value: i64);

    /// Resets the meter.
    fn reset(&self);
}

/// A histogram handler.
pub trait HistogramFn: Send + Sync {
    /// Records a value, optionally tagged with a user value.
    fn update(&self, value: i64, user_value: Option<&str>);

    /// Resets the histogram.
    fn reset(&self);
}

/// A timer handler.
pub trait TimerFn: Send + Sync {
    /// Records a duration, optionally tagged with a user value.
    fn record(&self, duration: Duration, user_value: Option<&str>);

    /// Marks the start of a timing session, returning the current time in nanoseconds.
    fn start_recording(&self) -> i64;

    /// Marks the end of a timing session started at `start`, returning the elapsed nanoseconds.
    ///
    /// The elapsed time is not recorded; pass it to [`record`](TimerFn::record) to do so.
    fn end_recording(&self, start: i64) -> i64;

    /// Current time of the timer's clock, in nanoseconds.
    fn current_time(&self) -> i64;

    /// Resets the timer.
    fn reset(&self);
}

/// An apdex handler.
pub trait ApdexFn: Send + Sync {
    /// Tracks the duration of a single operation.
    fn track(&self, duration: Duration);

    /// Current time of the apdex's clock, in nanoseconds.
    fn current_time(&self) -> i64;

    /// Resets the apdex.
    fn reset(&self);
}

macro_rules! handle {
    ($(#[$attr:meta])* $name:ident, $fn_trait:ident) => {
        $(#[$attr])*
        #[derive(Clone)]
        pub struct $name {
            inner: Option<Arc<dyn $fn_trait>>,
        }

        impl $name {
            /// Creates a no-op handle which does nothing.
            ///
            /// Suitable when a handle must be provided that does nothing i.e. a disabled registry.
            pub fn noop() -> Self {
                Self { inner: None }
            }

            /// Creates a handle based on a shared handler.
            pub fn from_arc<F: $fn_trait + 'static>(a: Arc<F>) -> Self {
                Self { inner: Some(a) }
            }

            /// Whether or not this handle does nothing.
            pub fn is_noop(&self) -> bool {
                self.inner.is_none()
            }

            /// Whether or not both handles refer to the same instrument.
            ///
            /// Two no-op handles are never considered to be the same instrument.
            pub fn ptr_eq(&self, other: &Self) -> bool {
                match (&self.inner, &other.inner) {
                    (Some(a), Some(b)) => {
                        std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
                    }
                    _ => false,
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name)).field("noop", &self.is_noop()).finish()
            }
        }
    };
}

handle!(
    /// A counter.
    Counter,
    CounterFn
);
handle!(
    /// A gauge.
    Gauge,
    GaugeFn
);
handle!(
    /// A meter.
    Meter,
    MeterFn
);
handle!(
    /// A histogram.
    Histogram,
    HistogramFn
);
handle!(
    /// A timer.
    Timer,
    TimerFn
);
handle!(
    /// An apdex score.
    Apdex,
    ApdexFn
);

impl Counter {
    /// Increments the counter.
    pub fn increment(&self, value: i64) {
        if let Some(ref inner) = self.inner {
            inner.increment(value)
        }
    }

    /// Decrements the counter.
    pub fn decrement(&self, value: i64) {
        if let Some(ref inner) = self.inner {
            inner.decrement(value)
        }
    }

    /// Increments the counter, attributing the increment to `item`.
    pub fn increment_item(&self, item: &str, value: i64) {
        if let Some(ref inner) = self.inner {
            inner.increment_item(item, value)
        }
    }

    /// Decrements the counter, attributing the decrement to `item`.
    pub fn decrement_item(&self, item: &str, value: i64) {
        if let Some(ref inner) = self.inner {
            inner.decrement_item(item, value)
        }
    }

    /// Resets the counter.
    pub fn reset(&self) {
        if let Some(ref inner) = self.inner {
            inner.reset()
        }
    }
}

impl Gauge {
    /// Increments the gauge.
    pub fn increment(&self, value: f64) {
        if let Some(ref inner) = self.inner {
            inner.increment(value)
        }
    }

    /// Decrements the gauge.
    pub fn decrement(&self, value: f64) {
        if let Some(ref inner) = self.inner {
            inner.decrement(value)
        }
    }

    /// Sets the gauge.
    pub fn set(&self, value: f64) {
        if let Some(ref inner) = self.inner {
            inner.set(value)
        }
    }
}

impl Meter {
    /// Marks a single event.
    pub fn mark_one(&self) {
        self.mark(1);
    }

    /// Marks the occurrence of `value` events.
    pub fn mark(&self, value: i64) {
        if let Some(ref inner) = self.inner {
            inner.mark(value)
        }
    }

    /// Marks the occurrence of `value` events against `item`.
    pub fn mark_item(&self, item: &str, value: i64) {
        if let Some(ref inner) = self.inner {
            inner.mark_item(item, value)
        }
    }

    /// Resets the meter.
    pub fn reset(&self) {
        if let Some(ref inner) = self.inner {
            inner.reset()
        }
    }
}

impl Histogram {
    /// Records a value.
    pub fn update(&self, value: i64) {
        self.update_with_tag(value, None);
    }

    /// Records a value tagged with a user value.
    pub fn update_with_tag(&self, value: i64, user_value: Option<&str>) {
        if let Some(ref inner) = self.inner {
            inner.update(value, user_value)
        }
    }

    /// Resets the histogram.
    pub fn reset(&self) {
        if let Some(ref inner) = self.inner {
            inner.reset()
        }
    }
}

impl Timer {
    /// Records a duration.
    pub fn record(&self, duration: Duration) {
        self.record_with_tag(duration, None);
    }

    /// Records a duration tagged with a user value.
    pub fn record_with_tag(&self, duration: Duration, user_value: Option<&str>) {
        if let Some(ref inner) = self.inner {
            inner.record(duration, user_value)
        }
    }

    /// Runs `f`, recording how long it took.
    pub fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _context = self.start();
        f()
    }

    /// Starts a timing session that is recorded when the returned guard is dropped.
    pub fn start(&self) -> TimerContext {
        TimerContext::new(self.clone())
    }

    /// Marks the start of a timing session, returning the current time in nanoseconds.
    pub fn start_recording(&self) -> i64 {
        match self.inner {
            Some(ref inner) => inner.start_recording(),
            None => 0,
        }
    }

    /// Marks the end of a timing session, returning the elapsed nanoseconds.
    pub fn end_recording(&self, start: i64) -> i64 {
        match self.inner {
            Some(ref inner) => inner.end_recording(start),
            None => 0,
        }
    }

    /// Current time of the timer's clock, in nanoseconds.
    pub fn current_time(&self) -> i64 {
        match self.inner {
            Some(ref inner) => inner.current_time(),
            None => 0,
        }
    }

    /// Resets the timer.
    pub fn reset(&self) {
        if let Some(ref inner) = self.inner {
            inner.reset()
        }
    }
}

impl Apdex {
    /// Tracks the duration of a single operation.
    pub fn track(&self, duration: Duration) {
        if let Some(ref inner) = self.inner {
            inner.track(duration)
        }
    }

    /// Runs `f`, tracking how long it took.
    pub fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _context = self.start();
        f()
    }

    /// Starts tracking an operation that is recorded when the returned guard is dropped.
    pub fn start(&self) -> ApdexContext {
        let start = self.current_time();
        ApdexContext { apdex: self.clone(), start }
    }

    /// Current time of the apdex's clock, in nanoseconds.
    pub fn current_time(&self) -> i64 {
        match self.inner {
            Some(ref inner) => inner.current_time(),
            None => 0,
        }
    }

    /// Resets the apdex.
    pub fn reset(&self) {
        if let Some(ref inner) = self.inner {
            inner.reset()
        }
    }
}

fn elapsed_between(start: i64, end: i64) -> Duration {
    Duration::from_nanos(u64::try_from(end.saturating_sub(start)).unwrap_or(0))
}

/// A timing session in progress.
///
/// The elapsed time is recorded into the timer when the context is dropped or
/// [`stop`](TimerContext::stop)ped, whichever happens first.
#[must_use = "dropping the context immediately records a near-zero duration"]
pub struct TimerContext {
    timer: Timer,
    start: i64,
    user_value: Option<String>,
    finished: bool,
}

impl TimerContext {
    fn new(timer: Timer) -> Self {
        let start = timer.start_recording();
        Self { timer, start, user_value: None, finished: false }
    }

    /// Time elapsed since the session started.
    pub fn elapsed(&self) -> Duration {
        elapsed_between(self.start, self.timer.current_time())
    }

    /// Tags the recorded duration with a user value.
    pub fn track_user_value<S: Into<String>>(&mut self, user_value: S) {
        self.user_value = Some(user_value.into());
    }

    /// Ends the session, recording and returning the elapsed time.
    pub fn stop(mut self) -> Duration {
        self.finish()
    }

    fn finish(&mut self) -> Duration {
        self.finished = true;
        let elapsed = self.timer.end_recording(self.start);
        let elapsed = elapsed_between(0, elapsed);
        self.timer.record_with_tag(elapsed, self.user_value.as_deref());
        elapsed
    }
}

impl Drop for TimerContext {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.finish();
        }
    }
}

impl fmt::Debug for TimerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerContext")
            .field("start", &self.start)
            .field("user_value", &self.user_value)
            .finish()
    }
}

/// An operation tracked by an apdex score.
///
/// The elapsed time is tracked when the context is dropped.
#[must_use = "dropping the context immediately tracks a near-zero duration"]
#[derive(Debug)]
pub struct ApdexContext {
    apdex: Apdex,
    start: i64,
}

impl ApdexContext {
    /// Time elapsed since the operation started.
    pub fn elapsed(&self) -> Duration {
        elapsed_between(self.start, self.apdex.current_time())
    }
}

impl Drop for ApdexContext {
    fn drop(&mut self) {
        self.apdex.track(self.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::{Counter, CounterFn, Timer, TimerFn};
    use parking_lot::Mutex;
    use std::{
        sync::{
            atomic::{AtomicI64, Ordering},
            Arc,
        },
        time::Duration,
    };

    #[derive(Default)]
    struct RecordingTimer {
        now: AtomicI64,
        active: AtomicI64,
        recorded: Mutex<Vec<(Duration, Option<String>)>>,
    }

    impl TimerFn for RecordingTimer {
        fn record(&self, duration: Duration, user_value: Option<&str>) {
            self.recorded.lock().push((duration, user_value.map(str::to_owned)));
        }

        fn start_recording(&self) -> i64 {
            self.active.fetch_add(1, Ordering::SeqCst);
            self.now.load(Ordering::SeqCst)
        }

        fn end_recording(&self, start: i64) -> i64 {
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.now.load(Ordering::SeqCst) - start
        }

        fn current_time(&self) -> i64 {
            self.now.load(Ordering::SeqCst)
        }

        fn reset(&self) {
            self.recorded.lock().clear();
        }
    }

    struct SumCounter(AtomicI64);

    impl CounterFn for SumCounter {
        fn increment(&self, value: i64) {
            self.0.fetch_add(value, Ordering::SeqCst);
        }

        fn decrement(&self, value: i64) {
            self.0.fetch_sub(value, Ordering::SeqCst);
        }

        fn increment_item(&self, _item: &str, value: i64) {
            self.increment(value);
        }

        fn decrement_item(&self, _item: &str, value: i64) {
            self.decrement(value);
        }

        fn reset(&self) {
            self.0.store(0, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_handles_do_nothing() {
        let counter = Counter::noop();
        counter.increment(5);
        assert!(counter.is_noop());
        assert!(!counter.ptr_eq(&Counter::noop()));

        let timer = Timer::noop();
        assert_eq!(timer.time(|| 42), 42);
        assert_eq!(timer.start().stop(), Duration::ZERO);
    }

    #[test]
    fn test_handles_share_instrument() {
        let inner = Arc::new(SumCounter(AtomicI64::new(0)));
        let a = Counter::from_arc(inner.clone());
        let b = a.clone();
        let other = Counter::from_arc(Arc::new(SumCounter(AtomicI64::new(0))));

        a.increment(3);
        b.decrement_item("x", 1);
        assert_eq!(inner.0.load(Ordering::SeqCst), 2);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&other));
    }

    #[test]
    fn test_timer_context_records_on_drop() {
        let inner = Arc::new(RecordingTimer::default());
        let timer = Timer::from_arc(inner.clone());

        {
            let mut context = timer.start();
            assert_eq!(inner.active.load(Ordering::SeqCst), 1);
            inner.now.store(1_500, Ordering::SeqCst);
            assert_eq!(context.elapsed(), Duration::from_nanos(1_500));
            context.track_user_value("user-7");
        }

        assert_eq!(inner.active.load(Ordering::SeqCst), 0);
        let recorded = inner.recorded.lock().clone();
        assert_eq!(recorded, vec![(Duration::from_nanos(1_500), Some("user-7".to_string()))]);
    }

    #[test]
    fn test_timer_context_stop_records_once() {
        let inner = Arc::new(RecordingTimer::default());
        let timer = Timer::from_arc(inner.clone());

        let context = timer.start();
        inner.now.store(10, Ordering::SeqCst);
        assert_eq!(context.stop(), Duration::from_nanos(10));
        assert_eq!(inner.recorded.lock().len(), 1);

        inner.now.store(20, Ordering::SeqCst);
        timer.time(|| inner.now.store(25, Ordering::SeqCst));
        assert_eq!(inner.recorded.lock()[1].0, Duration::from_nanos(5));
    }
}
