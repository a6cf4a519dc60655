//! In-process metrics measurement engine.
//!
//! `telemetric` lets application code cheaply record counts, rates, durations and distributions
//! from many threads at once, and lets a reporting layer periodically read a consistent
//! point-in-time view of everything recorded.
//!
//! # Design
//!
//! Callers create a [`Metrics`] through a [`MetricsBuilder`].  `Metrics` owns a registry which
//! maps every metric identity (context, name and tags) to exactly one live instrument, created
//! lazily the first time it is asked for.  Registering the same identity again, from any thread,
//! hands back the same instrument.
//!
//! Registration returns a handle: [`Counter`], [`Gauge`], [`Meter`], [`Histogram`], [`Timer`] or
//! [`Apdex`].  Handles are cheap to clone and can be stored in a struct field to avoid looking the
//! metric up on every update.
//!
//! Reading metrics out is done with [`Metrics::snapshot`] or [`Metrics::get_data`], which walk
//! every registered instrument and produce an immutable [`MetricsDataValueSource`] tree, grouped by
//! context.  Serializing that tree and shipping it somewhere is left to the caller.
//!
//! # Instruments
//!
//! - counters track a signed count, optionally broken down by item
//! - gauges hold the last value set, or compute it on read from a function
//! - meters track the rate of events as 1, 5 and 15 minute moving averages
//! - histograms track the distribution of values through a sampling reservoir
//! - timers combine a histogram of durations with a meter of calls
//! - apdex scores rate response times against a satisfaction threshold
//!
//! Histograms, timers and apdex scores sample through a [`Reservoir`], picked per metric with
//! [`ReservoirConfig`]: uniform, exponentially decaying, sliding window, or an HDR histogram.
//!
//! ```rust
//! use std::time::Duration;
//! use telemetric::{CounterOptions, Metrics, TimerOptions};
//!
//! let metrics = Metrics::builder().global_tag("env", "dev").build().unwrap();
//!
//! let requests = CounterOptions::builder("requests").build().unwrap();
//! metrics.counter(&requests).increment(1);
//!
//! let latency = TimerOptions::builder("latency").context("http").build().unwrap();
//! let timer = metrics.timer(&latency);
//! timer.record(Duration::from_millis(12));
//! let sum = timer.time(|| 2 + 2);
//! assert_eq!(sum, 4);
//!
//! let data = metrics.snapshot();
//! let http = data.context("http").unwrap();
//! assert_eq!(http.timers[0].value().histogram.count, 2);
//! assert_eq!(data.context("application").unwrap().counters[0].value().count, 1);
//! ```
#![deny(missing_docs)]

mod builder;
pub use builder::{MetricsBuilder, DEFAULT_CONTEXT, DEFAULT_SNAPSHOT_RETRIES};

mod config;

pub mod data;

mod environment;
pub use environment::EnvironmentInfo;

mod filter;
pub use filter::{MetricPredicate, MetricsFilter};

mod handles;
pub use handles::{
    Apdex, ApdexContext, ApdexFn, Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn,
    Meter, MeterFn, Timer, TimerContext, TimerFn, ValueProvider,
};

mod identity;
pub use identity::{MetricIdentity, Tags};

mod metrics;
pub use metrics::Metrics;

mod options;
pub use options::{
    ApdexOptions, ApdexOptionsBuilder, CounterOptions, CounterOptionsBuilder, GaugeOptions,
    GaugeOptionsBuilder, HistogramOptions, HistogramOptionsBuilder, MeterOptions,
    MeterOptionsBuilder, TimerOptions, TimerOptionsBuilder, DEFAULT_APDEX_THRESHOLD,
};

mod registry;
pub use registry::{
    DefaultMetricsRegistry, Factory, Instrument, MetricsRegistry, NoopMetricsRegistry,
};

mod snapshot;
pub use snapshot::{
    ApdexValueSource, CounterValueSource, GaugeValueSource, HistogramValueSource,
    MeterValueSource, MetricValueSource, MetricsContextValueSource, MetricsDataValueSource,
    TimerValueSource,
};

mod unit;
pub use unit::{TimeUnit, Unit};

mod values;
pub use values::{
    ApdexValue, CounterItem, CounterValue, HistogramValue, MeterItem, MeterValue, TimerValue,
};

pub use telemetric_util::{
    Clock, ConfigError, ManualClock, MetricKind, MetricKindMask, Quantile, Reservoir,
    ReservoirConfig, Snapshot, SnapshotError, SystemClock,
};
