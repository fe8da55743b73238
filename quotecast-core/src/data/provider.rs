//! Quote provider trait and structured error types.
//!
//! The QuoteProvider trait abstracts over bar sources (Yahoo Finance, CSV
//! import, synthetic data) so the pipeline and the exchange-rate cache can be
//! driven by mocks in tests.

use crate::domain::Interval;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error types for provider operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("{provider} is unavailable (rate-limited or blocked)")]
    ProviderUnavailable { provider: String },

    #[error("empty quote for {symbol}")]
    EmptyQuote { symbol: String },

    #[error("ingest failed: {0}")]
    IngestFailed(String),

    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    #[error("data error: {0}")]
    Other(String),
}

/// Where a raw frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    CsvImport,
    Synthetic,
}

/// A raw, uncleaned bar frame as returned by a provider.
///
/// The frame is indexed by a timestamp column and carries
/// `Open, High, Low, Close, Volume` columns, possibly layered
/// (`Close|AAPL`). SeriesCleaner is the only consumer that interprets it.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub frame: DataFrame,
    pub source: DataSource,
}

impl FetchResult {
    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }
}

/// Trait for quote providers.
///
/// Implementations block the caller for the duration of the request.
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch raw intraday bars covering the last `lookback_days` days.
    ///
    /// An empty frame is a valid answer (market closed, nothing traded).
    fn fetch_bars(
        &self,
        symbol: &str,
        lookback_days: u32,
        interval: Interval,
    ) -> Result<FetchResult, DataError>;

    /// Most recent close for `symbol` (used for currency pairs like `USDINR=X`).
    fn latest_close(&self, symbol: &str) -> Result<f64, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}
