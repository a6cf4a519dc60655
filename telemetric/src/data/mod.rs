//! Concrete instruments.
mod apdex;
pub use apdex::DefaultApdex;

mod counter;
pub use counter::DefaultCounter;

mod ewma;

mod gauge;
pub use gauge::{FunctionGauge, RatioGauge, ValueGauge};

mod histogram;
pub use histogram::DefaultHistogram;

mod meter;
pub use meter::DefaultMeter;

mod timer;
pub use timer::DefaultTimer;
