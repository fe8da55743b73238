//! Yahoo Finance quote provider.
//!
//! Fetches intraday OHLCV bars and latest closes from Yahoo's v8 chart API.
//! Handles rate limiting, retries with exponential backoff, response parsing,
//! and the circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. Minute bars are only served for roughly the last seven days.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataSource, FetchResult, QuoteProvider};
use crate::domain::Interval;
use polars::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// Yahoo Finance quote provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Chart URL for an explicit window ending now.
    fn bars_url(symbol: &str, lookback_days: u32, interval: Interval) -> String {
        let end = chrono::Utc::now().timestamp();
        let start = end - i64::from(lookback_days) * 86_400;
        format!(
            "{BASE_URL}/{symbol}?period1={start}&period2={end}&interval={}&includePrePost=false",
            interval.as_str()
        )
    }

    /// Chart URL for the last few daily bars; the last close is the quote.
    fn latest_url(symbol: &str) -> String {
        format!("{BASE_URL}/{symbol}?range=5d&interval=1d")
    }

    /// Unwrap the single chart result, mapping Yahoo's error envelope.
    fn chart_data(symbol: &str, resp: ChartResponse) -> Result<ChartData, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))
    }

    /// Build the raw frame: one row per timestamp, nulls where Yahoo sent
    /// nulls. Cleaning is SeriesCleaner's job, not the adapter's.
    fn frame_from_chart(data: ChartData) -> Result<DataFrame, DataError> {
        let timestamps = data.timestamp.unwrap_or_default();
        let n = timestamps.len();
        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

        let column = |values: &[Option<f64>]| -> Vec<Option<f64>> {
            (0..n).map(|i| values.get(i).copied().flatten()).collect()
        };
        let millis: Vec<i64> = timestamps.iter().map(|ts| ts * 1_000).collect();
        let volumes: Vec<Option<u64>> = (0..n)
            .map(|i| quote.volume.get(i).copied().flatten())
            .collect();

        let frame_err = |e: PolarsError| DataError::ResponseFormatChanged(format!("frame: {e}"));
        DataFrame::new(vec![
            Column::new("Datetime".into(), millis)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, Some("UTC".into())))
                .map_err(frame_err)?,
            Column::new("Open".into(), column(&quote.open)),
            Column::new("High".into(), column(&quote.high)),
            Column::new("Low".into(), column(&quote.low)),
            Column::new("Close".into(), column(&quote.close)),
            Column::new("Volume".into(), volumes),
        ])
        .map_err(frame_err)
    }

    fn last_close(symbol: &str, data: ChartData) -> Result<f64, DataError> {
        data.indicators
            .quote
            .into_iter()
            .next()
            .and_then(|q| q.close.into_iter().rev().flatten().next())
            .filter(|c| c.is_finite() && *c > 0.0)
            .ok_or_else(|| DataError::EmptyQuote {
                symbol: symbol.to_string(),
            })
    }

    /// Execute a GET with retry and circuit breaker logic.
    fn get_with_retry(&self, symbol: &str, url: &str) -> Result<ChartResponse, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        // IP ban: stop immediately
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(DataError::AuthenticationRequired(
                            "Yahoo Finance requires authentication".into(),
                        ));
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::SymbolNotFound {
                            symbol: symbol.to_string(),
                        });
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;
                    self.circuit_breaker.record_success();
                    return Ok(chart);
                }
                Err(e) => {
                    self.circuit_breaker.record_failure();
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl QuoteProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        lookback_days: u32,
        interval: Interval,
    ) -> Result<FetchResult, DataError> {
        let url = Self::bars_url(symbol, lookback_days, interval);
        let chart = self.get_with_retry(symbol, &url)?;
        let frame = Self::frame_from_chart(Self::chart_data(symbol, chart)?)?;
        log::debug!("{symbol}: fetched {} raw rows from Yahoo", frame.height());
        Ok(FetchResult {
            symbol: symbol.to_string(),
            frame,
            source: DataSource::YahooFinance,
        })
    }

    fn latest_close(&self, symbol: &str) -> Result<f64, DataError> {
        let chart = self.get_with_retry(symbol, &Self::latest_url(symbol))?;
        Self::last_close(symbol, Self::chart_data(symbol, chart)?)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
