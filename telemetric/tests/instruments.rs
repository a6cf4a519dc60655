use std::{sync::Arc, time::Duration};

use approx::assert_relative_eq;
use telemetric::{
    ApdexOptions, GaugeOptions, HistogramOptions, ManualClock, MeterOptions, Metrics,
    ReservoirConfig, TimeUnit, TimerOptions,
};

fn metrics() -> (Metrics, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let metrics = Metrics::builder().clock(clock.clone()).build().unwrap();
    (metrics, clock)
}

#[test]
fn apdex_classifies_samples() {
    let (metrics, _) = metrics();
    let options = ApdexOptions::builder("checkout")
        .threshold(Duration::from_millis(500))
        .allow_warmup(false)
        .build()
        .unwrap();
    let apdex = metrics.apdex(&options);

    for millis in [300, 300, 600, 2100] {
        apdex.track(Duration::from_millis(millis));
    }

    let data = metrics.snapshot();
    let value = data.context("application").unwrap().apdex_scores[0].value().clone();
    assert_eq!(value.satisfied, 2);
    assert_eq!(value.tolerating, 1);
    assert_eq!(value.frustrating, 1);
    assert_eq!(value.sample_size, 4);
    assert_relative_eq!(value.score, 0.625);
}

#[test]
fn apdex_reports_perfect_score_while_warming_up() {
    let (metrics, _) = metrics();
    let options = ApdexOptions::builder("warming").sample_size(10).build().unwrap();
    let apdex = metrics.apdex(&options);
    apdex.track(Duration::from_secs(10));

    let data = metrics.snapshot();
    let value = &data.context("application").unwrap().apdex_scores[0];
    assert_eq!(value.value().score, 1.0);
    assert_eq!(value.value().frustrating, 1);
}

#[test]
fn timer_tracks_sessions_with_injected_clock() {
    let (metrics, clock) = metrics();
    let options =
        TimerOptions::builder("query").duration_unit(TimeUnit::Milliseconds).build().unwrap();
    let timer = metrics.timer(&options);

    let mut context = timer.start();
    context.track_user_value("users");
    clock.advance(Duration::from_millis(250));

    let in_flight = metrics.snapshot();
    assert_eq!(in_flight.context("application").unwrap().timers[0].value().active_sessions, 1);

    assert_eq!(context.stop(), Duration::from_millis(250));
    timer.record(Duration::from_millis(50));

    let data = metrics.snapshot();
    let value = data.context("application").unwrap().timers[0].value().clone();
    assert_eq!(value.active_sessions, 0);
    assert_eq!(value.histogram.count, 2);
    assert_eq!(value.histogram.max, 250_000_000);
    assert_eq!(value.histogram.max_user_value.as_deref(), Some("users"));
    assert_eq!(value.rate.count, 2);
    assert_relative_eq!(value.total_time_scaled(), 300.0);
}

#[test]
fn meter_rates_follow_clock() {
    let (metrics, clock) = metrics();
    let meter = metrics.meter(&MeterOptions::builder("jobs").build().unwrap());
    meter.mark(3);
    meter.mark_item("email", 1);
    clock.advance(Duration::from_secs(5));

    let data = metrics.snapshot();
    let value = data.context("application").unwrap().meters[0].value().clone();
    assert_eq!(value.count, 4);
    assert_relative_eq!(value.mean_rate, 0.8, epsilon = 1e-9);
    assert!(value.one_minute_rate > 0.0);
    assert_eq!(value.items.len(), 1);
    assert_relative_eq!(value.items[0].percent, 25.0);
}

#[test]
fn hdr_histogram_quantiles_are_accurate() {
    let (metrics, _) = metrics();
    let options = HistogramOptions::builder("payload")
        .reservoir(ReservoirConfig::hdr(1, 1_000_000, 3).unwrap())
        .quantiles(&[0.5])
        .build()
        .unwrap();
    let histogram = metrics.histogram(&options);
    for value in 1..=10_000 {
        histogram.update(value);
    }

    let data = metrics.snapshot();
    let value = data.context("application").unwrap().histograms[0].value().clone();
    assert_eq!(value.count, 10_000);
    assert_eq!(value.min, 1);
    assert_relative_eq!(value.median, 5_000.0, max_relative = 1e-3);
    assert_relative_eq!(value.percentile_99, 9_900.0, max_relative = 1e-3);
    assert_eq!(value.quantiles[0].0.label(), "p50");
    assert_relative_eq!(value.quantiles[0].1, value.median);
}

#[test]
fn value_gauges_accumulate_updates() {
    let (metrics, _) = metrics();
    let gauge = metrics.gauge(&GaugeOptions::builder("workers").build().unwrap());
    gauge.set(4.0);
    gauge.increment(2.5);
    gauge.decrement(0.5);

    let data = metrics.snapshot();
    assert_eq!(*data.context("application").unwrap().gauges[0].value(), 6.0);
}
