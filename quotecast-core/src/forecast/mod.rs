//! Moving-average overlays and linear-trend extrapolation.

pub mod engine;
pub mod trend;

pub use engine::{ForecastEngine, ForecastOutput, DEFAULT_MA_WINDOWS, DEFAULT_MIN_FIT_POINTS};
pub use trend::fit_line;
