use std::{fmt, ops::BitOr};

/// Metric kind.
///
/// Defines the kind, or type, of an instrument:
/// - counters
/// - gauges
/// - meters
/// - histograms
/// - timers
/// - apdex scores
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MetricKind {
    /// Counter type.
    Counter,
    /// Gauge type.
    Gauge,
    /// Meter type.
    Meter,
    /// Histogram type.
    Histogram,
    /// Timer type.
    Timer,
    /// Apdex type.
    Apdex,
}

impl MetricKind {
    /// All metric kinds, in reporting order.
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Counter,
        MetricKind::Gauge,
        MetricKind::Meter,
        MetricKind::Histogram,
        MetricKind::Timer,
        MetricKind::Apdex,
    ];

    /// Lowercase name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Meter => "meter",
            MetricKind::Histogram => "histogram",
            MetricKind::Timer => "timer",
            MetricKind::Apdex => "apdex",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric kind mask.
///
/// Useful for matching against a kind, or kinds, of metrics.
///
/// Multiple kinds are combined with bitwise OR, and inclusion of a specific kind is checked with
/// [`matches`](MetricKindMask::matches):
///
/// ```rust
/// # use telemetric_util::{MetricKind, MetricKindMask};
/// let mask = MetricKindMask::COUNTER | MetricKindMask::TIMER;
///
/// assert!(mask.matches(MetricKind::Counter));
/// assert!(mask.matches(MetricKind::Timer));
/// assert!(!mask.matches(MetricKind::Meter));
///
/// assert!(!MetricKindMask::NONE.matches(MetricKind::Counter));
/// assert!(MetricKindMask::ALL.matches(MetricKind::Apdex));
/// ```
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy, Ord, PartialOrd)]
pub struct MetricKindMask(u8);

impl MetricKindMask {
    /// No metric kinds.
    pub const NONE: MetricKindMask = MetricKindMask(0);

    /// The counter kind.
    pub const COUNTER: MetricKindMask = MetricKindMask(1);

    /// The gauge kind.
    pub const GAUGE: MetricKindMask = MetricKindMask(1 << 1);

    /// The meter kind.
    pub const METER: MetricKindMask = MetricKindMask(1 << 2);

    /// The histogram kind.
    pub const HISTOGRAM: MetricKindMask = MetricKindMask(1 << 3);

    /// The timer kind.
    pub const TIMER: MetricKindMask = MetricKindMask(1 << 4);

    /// The apdex kind.
    pub const APDEX: MetricKindMask = MetricKindMask(1 << 5);

    /// All metric kinds.
    pub const ALL: MetricKindMask = MetricKindMask(0b11_1111);

    /// Whether or not this mask contains the specified kind.
    pub fn matches(&self, kind: MetricKind) -> bool {
        self.0 & MetricKindMask::from(kind).0 != 0
    }
}

impl From<MetricKind> for MetricKindMask {
    fn from(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => MetricKindMask::COUNTER,
            MetricKind::Gauge => MetricKindMask::GAUGE,
            MetricKind::Meter => MetricKindMask::METER,
            MetricKind::Histogram => MetricKindMask::HISTOGRAM,
            MetricKind::Timer => MetricKindMask::TIMER,
            MetricKind::Apdex => MetricKindMask::APDEX,
        }
    }
}

impl BitOr for MetricKindMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl Default for MetricKindMask {
    fn default() -> Self {
        MetricKindMask::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::MetricKindMask;
    use crate::MetricKind;

    #[test]
    fn test_matching() {
        for kind in MetricKind::ALL {
            let mask = MetricKindMask::from(kind);
            for other in MetricKind::ALL {
                assert_eq!(mask.matches(other), kind == other, "{} vs {}", kind, other);
            }

            assert!(MetricKindMask::ALL.matches(kind));
            assert!(!MetricKindMask::NONE.matches(kind));
        }
    }

    #[test]
    fn test_combined_masks() {
        let mask = MetricKindMask::HISTOGRAM | MetricKindMask::APDEX;
        assert!(mask.matches(MetricKind::Histogram));
        assert!(mask.matches(MetricKind::Apdex));
        assert!(!mask.matches(MetricKind::Timer));
        assert_eq!(MetricKindMask::default(), MetricKindMask::ALL);
    }
}
