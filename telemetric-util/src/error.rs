use thiserror::Error as ThisError;

/// Errors raised when an instrument, reservoir or identity is constructed with an invalid
/// configuration.
///
/// These are always surfaced at construction time.  Once an instrument exists, recording into it
/// cannot fail.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum ConfigError {
    /// A reservoir or apdex sample size was zero.
    #[error("sample size must be greater than zero")]
    InvalidSampleSize,

    /// An apdex threshold was zero, negative or not finite.
    #[error("apdex threshold must be a positive duration, got {0:?}")]
    InvalidApdexThreshold(std::time::Duration),

    /// HDR precision was outside of `0..=5` significant digits.
    #[error("significant digits must be between 0 and 5, got {0}")]
    InvalidSignificantDigits(u8),

    /// HDR trackable range was unusable.
    #[error("invalid trackable range: lowest {lowest}, highest {highest}")]
    InvalidTrackableRange {
        /// Lowest discernible value that was requested.
        lowest: u64,
        /// Highest trackable value that was requested.
        highest: u64,
    },

    /// Decay factor was not a positive, finite number.
    #[error("decay alpha must be positive and finite, got {0}")]
    InvalidAlpha(f64),

    /// Rescale interval for a decaying reservoir was zero.
    #[error("rescale interval must be non-zero")]
    InvalidRescaleInterval,

    /// A percentile/quantile was outside of `0.0..=1.0`.
    #[error("quantile must be between 0.0 and 1.0, got {0}")]
    InvalidQuantile(f64),

    /// A required identity field (context, name or tag key) was empty.
    #[error("metric identity field `{0}` must not be empty")]
    EmptyIdentityField(&'static str),

    /// A filter pattern could not be compiled.
    #[error("failed to build filter: {0}")]
    InvalidFilter(String),
}

/// Errors raised while taking a snapshot of a reservoir.
///
/// Snapshot errors are local to a single read and never leave the reservoir in a bad state: the
/// caller may simply try again.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SnapshotError {
    /// The reservoir was modified while its buckets were being walked.
    #[error("reservoir modified during snapshot: expected {expected} samples, observed {observed}")]
    ConcurrentModification {
        /// Total count read before walking the buckets.
        expected: u64,
        /// Count observed after walking the buckets.
        observed: u64,
    },
}

impl SnapshotError {
    /// Whether or not retrying the snapshot may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SnapshotError::ConcurrentModification { .. })
    }
}
