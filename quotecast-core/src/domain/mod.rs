//! Domain types for Quotecast

pub mod bar;
pub mod currency;
pub mod forecast;
pub mod interval;

pub use bar::{Bar, BarSeries};
pub use currency::Currency;
pub use forecast::{Forecast, ForecastPoint, TrendLine};
pub use interval::Interval;

use thiserror::Error;

/// Violations of domain invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("bar {index} has a missing or non-finite price")]
    VoidBar { index: usize },

    #[error("timestamps not strictly increasing at bar {index}")]
    UnorderedTimestamps { index: usize },

    #[error("invalid currency code '{0}' (expected three ASCII letters)")]
    InvalidCurrency(String),

    #[error("unsupported interval '{0}' (expected one of 1m, 2m, 5m, 15m, 30m, 60m, 90m, 1h, 1d)")]
    InvalidInterval(String),
}
