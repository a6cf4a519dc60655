use std::sync::Arc;

use telemetric_util::{Clock, ReservoirConfig};

use crate::{MetricsBuilder, Tags};

/// Holds the configuration shared by every instrument of a registry.
#[derive(Clone, Debug)]
pub(crate) struct Configuration {
    pub enabled: bool,
    pub default_context: String,
    pub global_tags: Tags,
    pub default_reservoir: ReservoirConfig,
    pub snapshot_retries: usize,
    pub clock: Arc<dyn Clock>,
}

impl Configuration {
    pub fn from_builder(builder: &MetricsBuilder) -> Self {
        Self {
            enabled: builder.enabled,
            default_context: builder.default_context.clone(),
            global_tags: builder.global_tags.clone(),
            default_reservoir: builder.default_reservoir.clone(),
            snapshot_retries: builder.snapshot_retries,
            clock: builder.clock.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn mock(clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled: true,
            default_context: crate::DEFAULT_CONTEXT.to_owned(),
            global_tags: Tags::new(),
            default_reservoir: ReservoirConfig::default(),
            snapshot_retries: 3,
            clock,
        }
    }
}
