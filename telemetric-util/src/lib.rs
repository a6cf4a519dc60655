//! Measurement primitives used by `telemetric`.
//!
//! Contains the lock-free counting cells, the sampling reservoirs and the snapshots they produce,
//! along with the clock abstraction every time-dependent structure is driven by.
#![deny(missing_docs)]

mod atomics;
pub use atomics::{PaddedAtomic, StripedAdder};

mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

mod error;
pub use error::{ConfigError, SnapshotError};

mod kind;
pub use kind::{MetricKind, MetricKindMask};

mod quantile;
pub use quantile::{default_quantiles, parse_quantiles, Quantile, DEFAULT_QUANTILES};

pub mod reservoir;
pub use reservoir::{Reservoir, ReservoirConfig};

mod snapshot;
pub use snapshot::{Sample, Snapshot};
