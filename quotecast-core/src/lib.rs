//! Quotecast Core: intraday bar cleaning, currency normalization, forecasting.
//!
//! This crate contains the pipeline and its collaborators:
//! - Domain types (bars, series, currencies, intervals, forecasts)
//! - Quote providers (Yahoo Finance, synthetic) and CSV ingest
//! - SeriesCleaner: raw frame to validated series
//! - Exchange-rate cache and currency normalizer
//! - Moving-average indicators and least-squares trend extrapolation
//! - `Pipeline` composing the above

pub mod data;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod fx;
pub mod indicators;
pub mod pipeline;

pub use error::{ErrorKind, PipelineError};
pub use pipeline::{Pipeline, PipelineConfig, PipelineResult};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything the runner shares across threads is
    /// Send + Sync. Multi-ticker runs fan out over a thread pool.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::BarSeries>();
        require_sync::<domain::BarSeries>();
        require_send::<domain::Forecast>();
        require_sync::<domain::Forecast>();

        // Shared state
        require_send::<fx::ExchangeRateProvider>();
        require_sync::<fx::ExchangeRateProvider>();
        require_send::<fx::CurrencyNormalizer>();
        require_sync::<fx::CurrencyNormalizer>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();

        // Pipeline
        require_send::<Pipeline>();
        require_sync::<Pipeline>();
        require_send::<PipelineResult>();
        require_sync::<PipelineResult>();

        // Providers
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::SyntheticProvider>();
        require_sync::<data::SyntheticProvider>();
    }
}
