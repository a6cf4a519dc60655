//! Sampling reservoirs.
//!
//! A reservoir keeps a bounded, statistically representative view of an unbounded stream of
//! values.  Four strategies are provided:
//!
//! - [`UniformReservoir`]: every value ever recorded has an equal chance of being held.
//! - [`ExponentiallyDecayingReservoir`]: recent values are exponentially more likely to be held.
//! - [`HdrReservoir`]: every value is counted into fixed-precision buckets.
//! - [`SlidingWindowReservoir`]: exactly the most recent values are held.
use std::{cell::UnsafeCell, fmt, sync::Arc, time::Duration};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::{Clock, ConfigError, Snapshot, SnapshotError};

mod decaying;
pub use decaying::ExponentiallyDecayingReservoir;

mod hdr;
pub use hdr::HdrReservoir;

mod sliding;
pub use sliding::SlidingWindowReservoir;

mod uniform;
pub use uniform::UniformReservoir;

/// Number of samples held by the default reservoir.
pub const DEFAULT_SAMPLE_SIZE: usize = 1028;

/// Decay factor of the default reservoir.
///
/// Heavily biases the reservoir to the past five minutes of measurements.
pub const DEFAULT_ALPHA: f64 = 0.015;

/// How often a decaying reservoir moves its landmark forward.
pub const DEFAULT_RESCALE_INTERVAL: Duration = Duration::from_secs(60 * 60);

thread_local! {
    static FAST_RNG: UnsafeCell<Xoshiro256StarStar> =
        UnsafeCell::new(Xoshiro256StarStar::from_rng(&mut rand::rng()));
}

fn with_rng<T>(f: impl FnOnce(&mut Xoshiro256StarStar) -> T) -> T {
    FAST_RNG.with(|rng| {
        // SAFETY: The RNG is thread-local and the reference never escapes the closure, which does
        // not call back into this function.
        let rng = unsafe { &mut *rng.get() };
        f(rng)
    })
}

/// Uniformly random integer in `0..upper`.
pub(crate) fn fastrand(upper: u64) -> u64 {
    with_rng(|rng| rng.random_range(0..upper))
}

/// Uniformly random float in `(0.0, 1.0]`.
pub(crate) fn random_unit() -> f64 {
    with_rng(|rng| 1.0 - rng.random::<f64>())
}

/// A bounded store of sampled values.
///
/// Recording never fails.  Taking a snapshot may fail transiently for reservoirs that detect
/// concurrent modification, in which case the caller can retry.
pub trait Reservoir: Send + Sync + fmt::Debug {
    /// Records a value.
    fn update(&self, value: i64) {
        self.update_with_tag(value, None);
    }

    /// Records a value along with an optional user tag.
    fn update_with_tag(&self, value: i64, tag: Option<&str>);

    /// Takes a snapshot of the current state, optionally clearing the reservoir in the same step.
    fn snapshot(&self, reset: bool) -> Result<Snapshot, SnapshotError>;

    /// Clears all held values and counts.
    fn reset(&self);

    /// Number of values currently held.
    fn size(&self) -> usize;
}

#[derive(Clone, Debug, PartialEq)]
enum Strategy {
    Uniform { size: usize },
    ExponentiallyDecaying { size: usize, alpha: f64, rescale_interval: Duration },
    Hdr(hdr::Layout),
    SlidingWindow { size: usize },
}

/// A validated description of a reservoir.
///
/// Configurations can only be created through their validating constructors, so building the
/// described reservoir never fails.
#[derive(Clone, Debug, PartialEq)]
pub struct ReservoirConfig(Strategy);

impl ReservoirConfig {
    /// A uniform reservoir holding `size` samples.
    pub fn uniform(size: usize) -> Result<Self, ConfigError> {
        validate_size(size)?;
        Ok(Self(Strategy::Uniform { size }))
    }

    /// An exponentially decaying reservoir holding `size` samples, decaying by `alpha`.
    ///
    /// The landmark is moved forward every [`DEFAULT_RESCALE_INTERVAL`]; use
    /// [`with_rescale_interval`](Self::with_rescale_interval) to change it.
    pub fn exponentially_decaying(size: usize, alpha: f64) -> Result<Self, ConfigError> {
        validate_size(size)?;
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(ConfigError::InvalidAlpha(alpha));
        }

        Ok(Self(Strategy::ExponentiallyDecaying {
            size,
            alpha,
            rescale_interval: DEFAULT_RESCALE_INTERVAL,
        }))
    }

    /// An HDR reservoir covering `lowest..=highest` with `digits` significant decimal digits.
    pub fn hdr(lowest: u64, highest: u64, digits: u8) -> Result<Self, ConfigError> {
        let layout = hdr::Layout::new(lowest, highest, digits)?;
        Ok(Self(Strategy::Hdr(layout)))
    }

    /// A sliding window reservoir holding the last `size` values.
    pub fn sliding_window(size: usize) -> Result<Self, ConfigError> {
        validate_size(size)?;
        Ok(Self(Strategy::SlidingWindow { size }))
    }

    /// Changes how often a decaying reservoir rescales.
    ///
    /// Has no effect on other kinds of reservoirs.
    pub fn with_rescale_interval(self, interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidRescaleInterval);
        }

        match self.0 {
            Strategy::ExponentiallyDecaying { size, alpha, .. } => Ok(Self(
                Strategy::ExponentiallyDecaying { size, alpha, rescale_interval: interval },
            )),
            other => Ok(Self(other)),
        }
    }

    /// Builds the described reservoir.
    pub fn build(&self, clock: Arc<dyn Clock>) -> Arc<dyn Reservoir> {
        match &self.0 {
            Strategy::Uniform { size } => Arc::new(UniformReservoir::new(*size, clock)),
            Strategy::ExponentiallyDecaying { size, alpha, rescale_interval } => Arc::new(
                ExponentiallyDecayingReservoir::new(*size, *alpha, *rescale_interval, clock),
            ),
            Strategy::Hdr(layout) => Arc::new(HdrReservoir::from_layout(*layout)),
            Strategy::SlidingWindow { size } => {
                Arc::new(SlidingWindowReservoir::new(*size, clock))
            }
        }
    }
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        Self(Strategy::ExponentiallyDecaying {
            size: DEFAULT_SAMPLE_SIZE,
            alpha: DEFAULT_ALPHA,
            rescale_interval: DEFAULT_RESCALE_INTERVAL,
        })
    }
}

fn validate_size(size: usize) -> Result<(), ConfigError> {
    if size == 0 {
        return Err(ConfigError::InvalidSampleSize);
    }
    Ok(())
}
