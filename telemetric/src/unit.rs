use std::{borrow::Cow, fmt, time::Duration};

/// Units for a given metric.
///
/// Units are carried through to every value source so that downstream formatters can label the
/// values they render.  They never change how values are recorded.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Unit {
    /// No particular unit.
    #[default]
    None,
    /// Calls.
    Calls,
    /// Requests.
    Requests,
    /// Errors.
    Errors,
    /// Items.
    Items,
    /// Events.
    Events,
    /// Bytes.
    Bytes,
    /// Kibibytes.
    KiloBytes,
    /// Mebibytes.
    MegaBytes,
    /// Percentage.
    Percent,
    /// Results.
    Results,
    /// Commands.
    Commands,
    /// Threads.
    Threads,
    /// Connections.
    Connections,
    /// A unit not covered by any of the other variants.
    Custom(Cow<'static, str>),
}

impl Unit {
    /// Gets the string form of this `Unit`.
    pub fn as_str(&self) -> &str {
        match self {
            Unit::None => "none",
            Unit::Calls => "calls",
            Unit::Requests => "requests",
            Unit::Errors => "errors",
            Unit::Items => "items",
            Unit::Events => "events",
            Unit::Bytes => "bytes",
            Unit::KiloBytes => "kibibytes",
            Unit::MegaBytes => "mebibytes",
            Unit::Percent => "percent",
            Unit::Results => "results",
            Unit::Commands => "commands",
            Unit::Threads => "threads",
            Unit::Connections => "connections",
            Unit::Custom(name) => name,
        }
    }

    /// Creates a custom unit.
    pub fn custom<N: Into<Cow<'static, str>>>(name: N) -> Self {
        Unit::Custom(name.into())
    }

    /// Converts the string representation of a unit back into `Unit`.
    ///
    /// Strings that do not match any of the built-in units become [`Unit::Custom`].
    pub fn from_string(s: &str) -> Unit {
        match s {
            "none" | "" => Unit::None,
            "calls" => Unit::Calls,
            "requests" => Unit::Requests,
            "errors" => Unit::Errors,
            "items" => Unit::Items,
            "events" => Unit::Events,
            "bytes" => Unit::Bytes,
            "kibibytes" => Unit::KiloBytes,
            "mebibytes" => Unit::MegaBytes,
            "percent" => Unit::Percent,
            "results" => Unit::Results,
            "commands" => Unit::Commands,
            "threads" => Unit::Threads,
            "connections" => Unit::Connections,
            other => Unit::Custom(Cow::Owned(other.to_owned())),
        }
    }

    /// Whether or not this unit measures data size.
    pub fn is_data_based(&self) -> bool {
        matches!(self, Unit::Bytes | Unit::KiloBytes | Unit::MegaBytes)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of time used for rates and durations.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum TimeUnit {
    /// Nanoseconds.
    Nanoseconds,
    /// Microseconds.
    Microseconds,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// Gets the string form of this `TimeUnit`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }

    /// Length of one of this unit, in nanoseconds.
    pub fn nanos(&self) -> u64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 60 * 60 * 1_000_000_000,
            TimeUnit::Days => 24 * 60 * 60 * 1_000_000_000,
        }
    }

    /// Converts a number of nanoseconds into this unit.
    pub fn convert_nanos(&self, nanos: f64) -> f64 {
        nanos / self.nanos() as f64
    }

    /// Converts a duration into this unit.
    pub fn convert(&self, duration: Duration) -> f64 {
        self.convert_nanos(duration.as_nanos() as f64)
    }

    /// Scales a per-second rate to a rate per one of this unit.
    pub fn scale_rate(&self, per_second: f64) -> f64 {
        per_second * (self.nanos() as f64 / 1_000_000_000.0)
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{TimeUnit, Unit};
    use approx::assert_relative_eq;
    use std::time::Duration;

    #[test]
    fn test_unit_conversions() {
        let units = [
            Unit::None,
            Unit::Calls,
            Unit::Requests,
            Unit::Errors,
            Unit::Items,
            Unit::Events,
            Unit::Bytes,
            Unit::KiloBytes,
            Unit::MegaBytes,
            Unit::Percent,
            Unit::Results,
            Unit::Commands,
            Unit::Threads,
            Unit::Connections,
            Unit::custom("widgets"),
        ];

        for unit in units {
            assert_eq!(Unit::from_string(unit.as_str()), unit);
        }
    }

    #[test]
    fn test_unit_kinds() {
        assert!(Unit::KiloBytes.is_data_based());
        assert!(!Unit::Requests.is_data_based());
        assert_eq!(Unit::default(), Unit::None);
        assert_eq!(Unit::custom("jobs").to_string(), "jobs");
    }

    #[test]
    fn test_time_unit_scaling() {
        assert_relative_eq!(TimeUnit::Milliseconds.convert(Duration::from_secs(2)), 2_000.0);
        assert_relative_eq!(TimeUnit::Seconds.convert_nanos(500_000_000.0), 0.5);
        assert_relative_eq!(TimeUnit::Minutes.scale_rate(2.0), 120.0);
        assert_relative_eq!(TimeUnit::Milliseconds.scale_rate(1_000.0), 1.0);
        assert_eq!(TimeUnit::Days.nanos(), 86_400_000_000_000);
    }
}
