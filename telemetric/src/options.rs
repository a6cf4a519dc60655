//! Registration options for instruments.
//!
//! Every instrument is registered from an options value describing its identity, its unit, and
//! how it should be reported.  Options are created through consuming builders whose `build`
//! validates the whole description up front, so that registering an instrument from valid options
//! never fails.
use std::time::Duration;

use telemetric_util::{
    parse_quantiles,
    reservoir::{DEFAULT_ALPHA, DEFAULT_SAMPLE_SIZE},
    ConfigError, Quantile, ReservoirConfig,
};

use crate::{MetricIdentity, Tags, TimeUnit, Unit};

/// Default apdex threshold.
pub const DEFAULT_APDEX_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Clone, Debug, PartialEq)]
struct Common {
    context: Option<String>,
    name: String,
    unit: Unit,
    tags: Tags,
    reset_on_reporting: bool,
}

impl Common {
    fn new(name: String) -> Self {
        Self { context: None, name, unit: Unit::None, tags: Tags::new(), reset_on_reporting: false }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyIdentityField("name"));
        }
        if matches!(self.context.as_deref(), Some("")) {
            return Err(ConfigError::EmptyIdentityField("context"));
        }
        self.tags.validate()
    }
}

macro_rules! options {
    (
        $(#[$attr:meta])*
        $name:ident, $builder:ident { $($field:ident: $ty:ty = $default:expr),* $(,)? }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            common: Common,
            $($field: $ty,)*
        }

        #[doc = concat!("Builder for [`", stringify!($name), "`].")]
        #[derive(Clone, Debug)]
        #[must_use]
        pub struct $builder {
            common: Common,
            $($field: $ty,)*
        }

        impl $name {
            #[doc = concat!(
                "Creates a builder for [`",
                stringify!($name),
                "`] with the given metric name."
            )]
            pub fn builder<N: Into<String>>(name: N) -> $builder {
                $builder { common: Common::new(name.into()), $($field: $default,)* }
            }

            /// Name of the metric.
            pub fn name(&self) -> &str {
                &self.common.name
            }

            /// Context of the metric, if one was set.
            pub fn context(&self) -> Option<&str> {
                self.common.context.as_deref()
            }

            /// Unit of the metric.
            pub fn unit(&self) -> &Unit {
                &self.common.unit
            }

            /// Tags of the metric.
            pub fn tags(&self) -> &Tags {
                &self.common.tags
            }

            /// Whether or not the metric is reset every time it is reported.
            pub fn reset_on_reporting(&self) -> bool {
                self.common.reset_on_reporting
            }

            /// Resolves the identity of the metric.
            ///
            /// Falls back to `default_context` when no context was set, and merges `global_tags`
            /// underneath the metric's own tags.  Both must have been validated already.
            pub(crate) fn identity(
                &self,
                default_context: &str,
                global_tags: &Tags,
            ) -> MetricIdentity {
                let context = self.common.context.as_deref().unwrap_or(default_context);
                let tags = global_tags.merged(&self.common.tags);
                MetricIdentity::from_validated(context, &self.common.name, tags)
            }
        }

        impl $builder {
            /// Sets the context the metric belongs to.
            pub fn context<C: Into<String>>(mut self, context: C) -> Self {
                self.common.context = Some(context.into());
                self
            }

            /// Sets the unit of the metric.
            pub fn unit(mut self, unit: Unit) -> Self {
                self.common.unit = unit;
                self
            }

            /// Sets a tag, replacing any existing value for the same key.
            pub fn tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
                self.common.tags.insert(key, value);
                self
            }

            /// Replaces all tags.
            pub fn tags(mut self, tags: Tags) -> Self {
                self.common.tags = tags;
                self
            }

            /// Sets whether or not the metric is reset every time it is reported.
            pub fn reset_on_reporting(mut self, reset: bool) -> Self {
                self.common.reset_on_reporting = reset;
                self
            }
        }
    };
}

options!(
    /// Options for a counter.
    CounterOptions, CounterOptionsBuilder {
        report_set_items: bool = true,
        report_item_percentages: bool = true,
    }
);

impl CounterOptions {
    /// Whether or not per-item counts are reported.
    pub fn report_set_items(&self) -> bool {
        self.report_set_items
    }

    /// Whether or not per-item percentages are reported.
    pub fn report_item_percentages(&self) -> bool {
        self.report_item_percentages
    }
}

impl CounterOptionsBuilder {
    /// Sets whether or not per-item counts are reported.
    ///
    /// Defaults to `true`.
    pub fn report_set_items(mut self, report: bool) -> Self {
        self.report_set_items = report;
        self
    }

    /// Sets whether or not per-item percentages are reported.
    ///
    /// Defaults to `true`.
    pub fn report_item_percentages(mut self, report: bool) -> Self {
        self.report_item_percentages = report;
        self
    }

    /// Validates and builds the options.
    pub fn build(self) -> Result<CounterOptions, ConfigError> {
        self.common.validate()?;
        Ok(CounterOptions {
            common: self.common,
            report_set_items: self.report_set_items,
            report_item_percentages: self.report_item_percentages,
        })
    }
}

options!(
    /// Options for a gauge.
    GaugeOptions, GaugeOptionsBuilder {}
);

impl GaugeOptionsBuilder {
    /// Validates and builds the options.
    pub fn build(self) -> Result<GaugeOptions, ConfigError> {
        self.common.validate()?;
        Ok(GaugeOptions { common: self.common })
    }
}

options!(
    /// Options for a meter.
    MeterOptions, MeterOptionsBuilder {
        rate_unit: TimeUnit = TimeUnit::Seconds,
    }
);

impl MeterOptions {
    /// Unit of time rates are expressed per.
    pub fn rate_unit(&self) -> TimeUnit {
        self.rate_unit
    }
}

impl MeterOptionsBuilder {
    /// Sets the unit of time rates are expressed per.
    ///
    /// Defaults to seconds.
    pub fn rate_unit(mut self, unit: TimeUnit) -> Self {
        self.rate_unit = unit;
        self
    }

    /// Validates and builds the options.
    pub fn build(self) -> Result<MeterOptions, ConfigError> {
        self.common.validate()?;
        Ok(MeterOptions { common: self.common, rate_unit: self.rate_unit })
    }
}

options!(
    /// Options for a histogram.
    HistogramOptions, HistogramOptionsBuilder {
        reservoir: Option<ReservoirConfig> = None,
        quantiles: Vec<f64> = Vec::new(),
    }
);

impl HistogramOptions {
    /// Reservoir the histogram samples into, if overridden.
    pub fn reservoir(&self) -> Option<&ReservoirConfig> {
        self.reservoir.as_ref()
    }

    /// Additional quantiles to report.
    pub fn quantiles(&self) -> Vec<Quantile> {
        parse_quantiles(&self.quantiles)
    }
}

impl HistogramOptionsBuilder {
    /// Sets the reservoir the histogram samples into.
    ///
    /// Defaults to the registry's default reservoir.
    pub fn reservoir(mut self, reservoir: ReservoirConfig) -> Self {
        self.reservoir = Some(reservoir);
        self
    }

    /// Sets additional quantiles to report, on top of the fixed percentiles.
    pub fn quantiles(mut self, quantiles: &[f64]) -> Self {
        self.quantiles = quantiles.to_vec();
        self
    }

    /// Validates and builds the options.
    pub fn build(self) -> Result<HistogramOptions, ConfigError> {
        self.common.validate()?;
        validate_quantiles(&self.quantiles)?;
        Ok(HistogramOptions {
            common: self.common,
            reservoir: self.reservoir,
            quantiles: self.quantiles,
        })
    }
}

options!(
    /// Options for a timer.
    TimerOptions, TimerOptionsBuilder {
        rate_unit: TimeUnit = TimeUnit::Seconds,
        duration_unit: TimeUnit = TimeUnit::Milliseconds,
        reservoir: Option<ReservoirConfig> = None,
        quantiles: Vec<f64> = Vec::new(),
    }
);

impl TimerOptions {
    /// Unit of time rates are expressed per.
    pub fn rate_unit(&self) -> TimeUnit {
        self.rate_unit
    }

    /// Unit durations are reported in.
    pub fn duration_unit(&self) -> TimeUnit {
        self.duration_unit
    }

    /// Reservoir durations are sampled into, if overridden.
    pub fn reservoir(&self) -> Option<&ReservoirConfig> {
        self.reservoir.as_ref()
    }

    /// Additional quantiles to report.
    pub fn quantiles(&self) -> Vec<Quantile> {
        parse_quantiles(&self.quantiles)
    }
}

impl TimerOptionsBuilder {
    /// Sets the unit of time rates are expressed per.
    ///
    /// Defaults to seconds.
    pub fn rate_unit(mut self, unit: TimeUnit) -> Self {
        self.rate_unit = unit;
        self
    }

    /// Sets the unit durations are reported in.
    ///
    /// Defaults to milliseconds.
    pub fn duration_unit(mut self, unit: TimeUnit) -> Self {
        self.duration_unit = unit;
        self
    }

    /// Sets the reservoir durations are sampled into.
    pub fn reservoir(mut self, reservoir: ReservoirConfig) -> Self {
        self.reservoir = Some(reservoir);
        self
    }

    /// Sets additional quantiles to report, on top of the fixed percentiles.
    pub fn quantiles(mut self, quantiles: &[f64]) -> Self {
        self.quantiles = quantiles.to_vec();
        self
    }

    /// Validates and builds the options.
    pub fn build(self) -> Result<TimerOptions, ConfigError> {
        self.common.validate()?;
        validate_quantiles(&self.quantiles)?;
        Ok(TimerOptions {
            common: self.common,
            rate_unit: self.rate_unit,
            duration_unit: self.duration_unit,
            reservoir: self.reservoir,
            quantiles: self.quantiles,
        })
    }
}

options!(
    /// Options for an apdex score.
    ApdexOptions, ApdexOptionsBuilder {
        threshold: Duration = DEFAULT_APDEX_THRESHOLD,
        allow_warmup: bool = true,
        sample_size: usize = DEFAULT_SAMPLE_SIZE,
        reservoir: Option<ReservoirConfig> = None,
    }
);

impl ApdexOptions {
    /// Threshold at or below which a duration is satisfying.
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Whether or not a perfect score is reported until `sample_size` durations were tracked.
    pub fn allow_warmup(&self) -> bool {
        self.allow_warmup
    }

    /// Number of samples kept, and the length of the warm-up.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Reservoir durations are sampled into.
    ///
    /// Without an explicit reservoir, a decaying reservoir of `sample_size` samples is used.
    pub fn reservoir(&self) -> ReservoirConfig {
        self.reservoir.clone().unwrap_or_default()
    }
}

impl ApdexOptionsBuilder {
    /// Sets the satisfying threshold `T`.
    ///
    /// Defaults to 500 milliseconds.
    pub fn threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets whether or not a perfect score is reported during warm-up.
    ///
    /// Defaults to `true`.
    pub fn allow_warmup(mut self, allow: bool) -> Self {
        self.allow_warmup = allow;
        self
    }

    /// Sets the number of samples kept.
    ///
    /// Defaults to 1028.
    pub fn sample_size(mut self, size: usize) -> Self {
        self.sample_size = size;
        self
    }

    /// Sets the reservoir durations are sampled into.
    pub fn reservoir(mut self, reservoir: ReservoirConfig) -> Self {
        self.reservoir = Some(reservoir);
        self
    }

    /// Validates and builds the options.
    pub fn build(self) -> Result<ApdexOptions, ConfigError> {
        self.common.validate()?;
        if self.threshold.is_zero() {
            return Err(ConfigError::InvalidApdexThreshold(self.threshold));
        }
        if self.sample_size == 0 {
            return Err(ConfigError::InvalidSampleSize);
        }

        let reservoir = match self.reservoir {
            Some(reservoir) => reservoir,
            None => ReservoirConfig::exponentially_decaying(self.sample_size, DEFAULT_ALPHA)?,
        };

        Ok(ApdexOptions {
            common: self.common,
            threshold: self.threshold,
            allow_warmup: self.allow_warmup,
            sample_size: self.sample_size,
            reservoir: Some(reservoir),
        })
    }
}

fn validate_quantiles(quantiles: &[f64]) -> Result<(), ConfigError> {
    for quantile in quantiles {
        Quantile::try_new(*quantile)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ApdexOptions, CounterOptions, HistogramOptions, MeterOptions, TimerOptions};
    use crate::{Tags, TimeUnit, Unit};
    use std::time::Duration;
    use telemetric_util::{ConfigError, ReservoirConfig};

    #[test]
    fn test_defaults() {
        let counter = CounterOptions::builder("requests").build().unwrap();
        assert_eq!(counter.name(), "requests");
        assert_eq!(counter.context(), None);
        assert_eq!(counter.unit(), &Unit::None);
        assert!(counter.report_set_items());
        assert!(counter.report_item_percentages());
        assert!(!counter.reset_on_reporting());

        let meter = MeterOptions::builder("hits").build().unwrap();
        assert_eq!(meter.rate_unit(), TimeUnit::Seconds);

        let timer = TimerOptions::builder("latency").build().unwrap();
        assert_eq!(timer.duration_unit(), TimeUnit::Milliseconds);
        assert!(timer.reservoir().is_none());

        let apdex = ApdexOptions::builder("score").build().unwrap();
        assert_eq!(apdex.threshold(), Duration::from_millis(500));
        assert_eq!(apdex.sample_size(), 1028);
        assert!(apdex.allow_warmup());
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            CounterOptions::builder("").build().unwrap_err(),
            ConfigError::EmptyIdentityField("name")
        );
        assert_eq!(
            MeterOptions::builder("m").context("").build().unwrap_err(),
            ConfigError::EmptyIdentityField("context")
        );
        assert_eq!(
            CounterOptions::builder("c").tag("", "v").build().unwrap_err(),
            ConfigError::EmptyIdentityField("tag key")
        );
        assert_eq!(
            ApdexOptions::builder("a").threshold(Duration::ZERO).build().unwrap_err(),
            ConfigError::InvalidApdexThreshold(Duration::ZERO)
        );
        assert_eq!(
            ApdexOptions::builder("a").sample_size(0).build().unwrap_err(),
            ConfigError::InvalidSampleSize
        );
        assert_eq!(
            HistogramOptions::builder("h").quantiles(&[1.5]).build().unwrap_err(),
            ConfigError::InvalidQuantile(1.5)
        );
    }

    #[test]
    fn test_identity_resolution() {
        let global = Tags::from_pairs([("env", "prod"), ("host", "a")]);

        let options = CounterOptions::builder("requests").tag("host", "b").build().unwrap();
        let identity = options.identity("application", &global);
        assert_eq!(identity.context(), "application");
        assert_eq!(identity.tags().get("host"), Some("b"));
        assert_eq!(identity.tags().get("env"), Some("prod"));

        let options = CounterOptions::builder("requests").context("db").build().unwrap();
        assert_eq!(options.identity("application", &Tags::new()).context(), "db");
    }

    #[test]
    fn test_apdex_reservoir_resolution() {
        let options = ApdexOptions::builder("a").sample_size(64).build().unwrap();
        assert_eq!(
            options.reservoir(),
            ReservoirConfig::exponentially_decaying(64, 0.015).unwrap()
        );

        let uniform = ReservoirConfig::uniform(8).unwrap();
        let options = ApdexOptions::builder("a").reservoir(uniform.clone()).build().unwrap();
        assert_eq!(options.reservoir(), uniform);
    }
}
