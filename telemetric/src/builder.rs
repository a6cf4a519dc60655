use std::sync::Arc;

use telemetric_util::{Clock, ConfigError, ReservoirConfig, SystemClock};

use crate::{config::Configuration, Metrics, Tags};

/// Context metrics are registered in when their options do not name one.
pub const DEFAULT_CONTEXT: &str = "application";

/// Number of times a snapshot that raced with writers is retried before the metric is left out.
pub const DEFAULT_SNAPSHOT_RETRIES: usize = 3;

/// Builder for [`Metrics`].
#[derive(Clone, Debug)]
#[must_use]
pub struct MetricsBuilder {
    pub(crate) enabled: bool,
    pub(crate) default_context: String,
    pub(crate) global_tags: Tags,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) default_reservoir: ReservoirConfig,
    pub(crate) snapshot_retries: usize,
}

impl Default for MetricsBuilder {
    fn default() -> Self {
        Self {
            enabled: true,
            default_context: DEFAULT_CONTEXT.to_owned(),
            global_tags: Tags::new(),
            clock: Arc::new(SystemClock::new()),
            default_reservoir: ReservoirConfig::default(),
            snapshot_retries: DEFAULT_SNAPSHOT_RETRIES,
        }
    }
}

impl MetricsBuilder {
    /// Creates a new [`MetricsBuilder`] with default values.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets whether or not metrics are recorded at all.
    ///
    /// Defaults to `true`.
    ///
    /// When disabled, every handle is a no-op and reading data always yields an empty tree.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the context metrics are registered in when their options do not name one.
    ///
    /// Defaults to `"application"`.
    pub fn default_context<C: Into<String>>(mut self, context: C) -> Self {
        self.default_context = context.into();
        self
    }

    /// Adds a tag to every metric.
    ///
    /// Tags set on a metric itself take precedence over global tags with the same key.
    pub fn global_tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.global_tags.insert(key, value);
        self
    }

    /// Replaces the set of tags added to every metric.
    pub fn global_tags(mut self, tags: Tags) -> Self {
        self.global_tags = tags;
        self
    }

    /// Sets the clock used for rates, durations and timestamps.
    ///
    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the reservoir used by histograms and timers that do not configure their own.
    ///
    /// Defaults to an exponentially decaying reservoir of 1028 samples with an alpha of 0.015.
    pub fn default_reservoir(mut self, reservoir: ReservoirConfig) -> Self {
        self.default_reservoir = reservoir;
        self
    }

    /// Sets how many times a snapshot that raced with writers is retried.
    ///
    /// Defaults to 3.
    pub fn snapshot_retries(mut self, retries: usize) -> Self {
        self.snapshot_retries = retries;
        self
    }

    /// Creates a [`Metrics`] based on this configuration.
    pub fn build(self) -> Result<Metrics, ConfigError> {
        if self.default_context.is_empty() {
            return Err(ConfigError::EmptyIdentityField("context"));
        }
        self.global_tags.validate()?;

        let config = Configuration::from_builder(&self);
        Ok(Metrics::from_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::MetricsBuilder;
    use telemetric_util::ConfigError;

    #[test]
    fn test_build_validates() {
        assert_eq!(
            MetricsBuilder::new().default_context("").build().unwrap_err(),
            ConfigError::EmptyIdentityField("context")
        );
        assert_eq!(
            MetricsBuilder::new().global_tag("", "x").build().unwrap_err(),
            ConfigError::EmptyIdentityField("tag key")
        );
        assert!(MetricsBuilder::new().build().is_ok());
    }

    #[test]
    fn test_disabled() {
        let metrics = MetricsBuilder::new().enabled(false).build().unwrap();
        assert!(!metrics.is_enabled());
    }
}
