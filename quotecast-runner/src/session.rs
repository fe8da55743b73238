//! Session: fetch (through the frame cache) → pipeline, for one or many tickers.
//!
//! A session owns the long-lived state of a process: the quote provider, the
//! raw-frame cache, and the pipeline with its exchange-rate cache. It is
//! `Sync`, so `forecast_many` fans tickers out over the rayon pool.

use crate::cache::{FrameCache, FrameKey};
use crate::config::QuotecastConfig;
use quotecast_core::data::{DataError, FetchResult, QuoteProvider};
use quotecast_core::domain::Interval;
use quotecast_core::fx::{CurrencyNormalizer, ExchangeRate, ExchangeRateProvider};
use quotecast_core::{ErrorKind, Pipeline, PipelineError, PipelineResult};
use polars::prelude::DataFrame;
use rayon::prelude::*;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("fetch failed for '{symbol}': {source}")]
    Fetch {
        symbol: String,
        #[source]
        source: DataError,
    },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch { .. } => ErrorKind::Unexpected,
            Self::Pipeline(e) => e.kind(),
        }
    }

    /// Provider failures that mean "nothing to show" become `NoData`.
    fn from_fetch(symbol: &str, source: DataError) -> Self {
        match source {
            DataError::SymbolNotFound { .. } | DataError::EmptyQuote { .. } => {
                Self::Pipeline(PipelineError::NoData {
                    symbol: symbol.to_string(),
                })
            }
            source => Self::Fetch {
                symbol: symbol.to_string(),
                source,
            },
        }
    }
}

/// One forecast request. Unset fields take the session's configured values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastRequest {
    pub ticker: String,
    pub lookback_days: Option<u32>,
    pub interval: Option<Interval>,
    pub horizon: Option<usize>,
}

impl ForecastRequest {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            lookback_days: None,
            interval: None,
            horizon: None,
        }
    }

    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = Some(days);
        self
    }
}

pub struct Session {
    config: QuotecastConfig,
    provider: Arc<dyn QuoteProvider>,
    cache: FrameCache,
    pipeline: Pipeline,
}

impl Session {
    /// Build a session whose bars and FX quote both come from `provider`.
    pub fn new(config: QuotecastConfig, provider: Arc<dyn QuoteProvider>) -> Result<Self, SessionError> {
        let rates = Arc::new(ExchangeRateProvider::from_config(Arc::clone(&provider), &config.fx));
        Self::with_rates(config, provider, rates)
    }

    /// Build a session with a separately sourced exchange-rate provider.
    pub fn with_rates(
        config: QuotecastConfig,
        provider: Arc<dyn QuoteProvider>,
        rates: Arc<ExchangeRateProvider>,
    ) -> Result<Self, SessionError> {
        config.fx.validate()?;
        let normalizer = CurrencyNormalizer::from_config(rates, &config.fx);
        let pipeline = Pipeline::new(config.pipeline.clone(), normalizer)?;
        Ok(Self {
            cache: FrameCache::new(config.fetch.cache_ttl()),
            config,
            provider,
            pipeline,
        })
    }

    pub fn config(&self) -> &QuotecastConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn QuoteProvider {
        self.provider.as_ref()
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    /// Current exchange rate (cached, or fetched, or fallback).
    pub fn rate(&self) -> ExchangeRate {
        self.pipeline.normalizer().rates().get_rate()
    }

    /// Force a new exchange-rate lookup.
    pub fn refresh_rate(&self) -> ExchangeRate {
        self.pipeline.normalizer().rates().refresh()
    }

    /// Raw frame for `request`, from the cache when fresh. A fresh entry is
    /// served even while the provider reports itself unavailable.
    pub fn fetch(&self, request: &ForecastRequest) -> Result<FetchResult, SessionError> {
        let interval = request.interval.unwrap_or(self.config.fetch.interval);
        let lookback = request.lookback_days.unwrap_or(self.config.fetch.lookback_days);
        let key = FrameKey::new(&request.ticker, interval, lookback);

        self.cache
            .get_or_fetch(&key, || {
                if !self.provider.is_available() {
                    return Err(DataError::ProviderUnavailable {
                        provider: self.provider.name().to_string(),
                    });
                }
                log::info!(
                    "{}: fetching {lookback}d of {interval} bars from {}",
                    request.ticker,
                    self.provider.name()
                );
                self.provider.fetch_bars(&request.ticker, lookback, interval)
            })
            .map_err(|e| SessionError::from_fetch(&request.ticker, e))
    }

    /// Fetch and run. Predictions are spaced by the interval the bars were
    /// requested at.
    pub fn forecast(&self, request: &ForecastRequest) -> Result<PipelineResult, SessionError> {
        let fetched = self.fetch(request)?;
        let interval = request.interval.unwrap_or(self.config.fetch.interval);
        self.run_frame(&fetched.frame, &request.ticker, request.horizon, Some(interval))
    }

    /// Run the pipeline over a frame obtained elsewhere (e.g. a CSV file).
    /// With no `interval`, the configured or observed spacing is used.
    pub fn run_frame(
        &self,
        frame: &DataFrame,
        ticker: &str,
        horizon: Option<usize>,
        interval: Option<Interval>,
    ) -> Result<PipelineResult, SessionError> {
        let horizon = horizon.unwrap_or(self.config.pipeline.horizon);
        Ok(self.pipeline.run_with(frame, ticker, horizon, interval)?)
    }

    pub fn forecast_ticker(&self, ticker: &str) -> Result<PipelineResult, SessionError> {
        self.forecast(&ForecastRequest::new(ticker))
    }

    /// Run every request in parallel. Results keep request order.
    pub fn forecast_many(
        &self,
        requests: &[ForecastRequest],
    ) -> Vec<(String, Result<PipelineResult, SessionError>)> {
        requests
            .par_iter()
            .map(|request| (request.ticker.clone(), self.forecast(request)))
            .collect()
    }
}
