use crate::ConfigError;

/// The percentiles reported for every histogram-backed metric.
pub const DEFAULT_QUANTILES: [f64; 6] = [0.5, 0.75, 0.95, 0.98, 0.99, 0.999];

/// A quantile that has both the raw value and a human-friendly display label.
///
/// Quantiles are stored as fractions for precision, but are usually displayed as abbreviated
/// percentiles: a quantile of `0.99` is labeled `p99`, and `0.999` is labeled `p999`.  `0.0` and
/// `1.0` are labeled `min` and `max`, respectively.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantile(f64, String);

impl Quantile {
    /// Creates a new [`Quantile`] from a floating-point value.
    ///
    /// All values are clamped between 0.0 and 1.0.
    pub fn new(quantile: f64) -> Quantile {
        let clamped = if quantile.is_nan() { 0.0 } else { quantile.clamp(0.0, 1.0) };
        Quantile(clamped, label_for(clamped))
    }

    /// Creates a new [`Quantile`], rejecting values outside of `0.0..=1.0`.
    pub fn try_new(quantile: f64) -> Result<Quantile, ConfigError> {
        if !(0.0..=1.0).contains(&quantile) {
            return Err(ConfigError::InvalidQuantile(quantile));
        }

        Ok(Quantile::new(quantile))
    }

    /// Gets the human-friendly display label.
    pub fn label(&self) -> &str {
        self.1.as_str()
    }

    /// Gets the raw quantile value.
    pub fn value(&self) -> f64 {
        self.0
    }
}

fn label_for(quantile: f64) -> String {
    match format!("{}", quantile).as_str() {
        "0" => "min".to_string(),
        "1" => "max".to_string(),
        _ => format!("p{}", quantile * 100.0).replace('.', ""),
    }
}

/// Parses a slice of floating-point values into a vector of [`Quantile`]s.
pub fn parse_quantiles(quantiles: &[f64]) -> Vec<Quantile> {
    quantiles.iter().map(|f| Quantile::new(*f)).collect()
}

/// The default quantiles, labeled.
pub fn default_quantiles() -> Vec<Quantile> {
    parse_quantiles(&DEFAULT_QUANTILES)
}

#[cfg(test)]
mod tests {
    use super::{default_quantiles, parse_quantiles, Quantile};
    use crate::ConfigError;

    #[test]
    fn test_quantile_labels() {
        assert_eq!(Quantile::new(0.0).label(), "min");
        assert_eq!(Quantile::new(1.0).label(), "max");
        assert_eq!(Quantile::new(0.5).label(), "p50");
        assert_eq!(Quantile::new(0.99).label(), "p99");
        assert_eq!(Quantile::new(0.999).label(), "p999");
    }

    #[test]
    fn test_quantile_clamping() {
        let under = Quantile::new(-1.0);
        assert_eq!(under.value(), 0.0);
        assert_eq!(under.label(), "min");

        let over = Quantile::new(1.2);
        assert_eq!(over.value(), 1.0);
        assert_eq!(over.label(), "max");

        assert_eq!(Quantile::new(f64::NAN).value(), 0.0);
    }

    #[test]
    fn test_quantile_validation() {
        assert!(Quantile::try_new(0.95).is_ok());
        assert_eq!(Quantile::try_new(1.5), Err(ConfigError::InvalidQuantile(1.5)));
        assert!(Quantile::try_new(f64::NAN).is_err());
    }

    #[test]
    fn test_default_quantiles() {
        let labels = default_quantiles().iter().map(|q| q.label().to_string()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["p50", "p75", "p95", "p98", "p99", "p999"]);

        assert!(parse_quantiles(&[]).is_empty());
    }
}
