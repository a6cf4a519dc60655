use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use telemetric_util::SnapshotError;

use crate::{GaugeFn, ValueProvider};

/// A gauge holding an arbitrary floating-point value.
#[derive(Debug)]
pub struct ValueGauge {
    value: AtomicU64,
}

impl ValueGauge {
    /// Creates a new `ValueGauge` starting at zero.
    pub fn new() -> Self {
        Self { value: AtomicU64::new(0f64.to_bits()) }
    }

    /// Current value of the gauge.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Acquire))
    }

    fn apply<F: Fn(f64) -> f64>(&self, f: F) {
        let _ = self.value.fetch_update(Ordering::AcqRel, Ordering::Relaxed, |curr| {
            Some(f(f64::from_bits(curr)).to_bits())
        });
    }
}

impl Default for ValueGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugeFn for ValueGauge {
    fn increment(&self, value: f64) {
        self.apply(|curr| curr + value);
    }

    fn decrement(&self, value: f64) {
        self.apply(|curr| curr - value);
    }

    fn set(&self, value: f64) {
        self.value.store(value.to_bits(), Ordering::Release);
    }
}

impl ValueProvider<f64> for ValueGauge {
    fn value(&self, reset: bool) -> Result<f64, SnapshotError> {
        if reset {
            Ok(f64::from_bits(self.value.swap(0f64.to_bits(), Ordering::AcqRel)))
        } else {
            Ok(self.get())
        }
    }
}

/// A gauge whose value is computed by a function each time it is read.
///
/// Updates through the gauge handle are ignored, and resetting has no effect.
pub struct FunctionGauge<F> {
    f: F,
}

impl<F> FunctionGauge<F>
where
    F: Fn() -> f64 + Send + Sync,
{
    /// Creates a new `FunctionGauge` reading its value from `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FunctionGauge<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionGauge").finish_non_exhaustive()
    }
}

impl<F> GaugeFn for FunctionGauge<F>
where
    F: Fn() -> f64 + Send + Sync,
{
    fn increment(&self, _value: f64) {}

    fn decrement(&self, _value: f64) {}

    fn set(&self, _value: f64) {}
}

impl<F> ValueProvider<f64> for FunctionGauge<F>
where
    F: Fn() -> f64 + Send + Sync,
{
    fn value(&self, _reset: bool) -> Result<f64, SnapshotError> {
        Ok((self.f)())
    }
}

/// A gauge reporting the ratio of two functions.
///
/// Reads as `NaN` when the denominator is zero or either side is not finite.
pub struct RatioGauge<N, D> {
    numerator: N,
    denominator: D,
}

impl<N, D> RatioGauge<N, D>
where
    N: Fn() -> f64 + Send + Sync,
    D: Fn() -> f64 + Send + Sync,
{
    /// Creates a new `RatioGauge`.
    pub fn new(numerator: N, denominator: D) -> Self {
        Self { numerator, denominator }
    }

    /// Current ratio.
    pub fn ratio(&self) -> f64 {
        let numerator = (self.numerator)();
        let denominator = (self.denominator)();
        if denominator == 0.0 || !numerator.is_finite() || !denominator.is_finite() {
            return f64::NAN;
        }
        numerator / denominator
    }
}

impl<N, D> fmt::Debug for RatioGauge<N, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatioGauge").finish_non_exhaustive()
    }
}

impl<N, D> GaugeFn for RatioGauge<N, D>
where
    N: Fn() -> f64 + Send + Sync,
    D: Fn() -> f64 + Send + Sync,
{
    fn increment(&self, _value: f64) {}

    fn decrement(&self, _value: f64) {}

    fn set(&self, _value: f64) {}
}

impl<N, D> ValueProvider<f64> for RatioGauge<N, D>
where
    N: Fn() -> f64 + Send + Sync,
    D: Fn() -> f64 + Send + Sync,
{
    fn value(&self, _reset: bool) -> Result<f64, SnapshotError> {
        Ok(self.ratio())
    }
}
