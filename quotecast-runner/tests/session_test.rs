//! Integration tests for sessions: cache reuse, error mapping, parallel runs,
//! and the refresh loop, against a deterministic in-memory provider.

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use polars::prelude::*;
use quotecast_core::data::{DataError, FetchResult, QuoteProvider, SyntheticProvider};
use quotecast_core::domain::{Currency, Interval};
use quotecast_core::fx::{Conversion, RateProvenance};
use quotecast_core::ErrorKind;
use quotecast_runner::{watch, ForecastRequest, FrameKey, QuotecastConfig, Session, WatchOptions};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Synthetic bars plus scripted failures, counting every upstream call.
struct ScriptedProvider {
    bars: SyntheticProvider,
    fx_quote: Option<f64>,
    available: AtomicBool,
    bar_fetches: AtomicUsize,
    fx_fetches: AtomicUsize,
}

impl ScriptedProvider {
    fn new(fx_quote: Option<f64>) -> Arc<Self> {
        let anchor = Utc.with_ymd_and_hms(2024, 3, 8, 21, 0, 0).unwrap();
        Arc::new(Self {
            bars: SyntheticProvider::new().with_anchor(anchor).with_missing_ratio(0.0),
            fx_quote,
            available: AtomicBool::new(true),
            bar_fetches: AtomicUsize::new(0),
            fx_fetches: AtomicUsize::new(0),
        })
    }

    fn bar_fetches(&self) -> usize {
        self.bar_fetches.load(Ordering::SeqCst)
    }
}

/// Ten whole-minute bars followed by an in-progress bar 23 s after the last.
fn frame_with_partial_bar() -> DataFrame {
    let start = Utc.with_ymd_and_hms(2024, 3, 8, 14, 30, 0).unwrap();
    let mut stamps: Vec<_> = (0..10).map(|m| start + ChronoDuration::minutes(m)).collect();
    stamps.push(start + ChronoDuration::minutes(9) + ChronoDuration::seconds(23));
    let millis: Vec<i64> = stamps.iter().map(|t| t.timestamp_millis()).collect();
    let closes: Vec<f64> = (0..millis.len()).map(|i| 100.0 + i as f64 * 0.5).collect();

    let ts = Column::new("Datetime".into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .unwrap();
    DataFrame::new(vec![
        ts,
        Column::new("Open".into(), closes.clone()),
        Column::new("High".into(), closes.iter().map(|c| c + 1.0).collect::<Vec<_>>()),
        Column::new("Low".into(), closes.iter().map(|c| c - 1.0).collect::<Vec<_>>()),
        Column::new("Close".into(), closes.clone()),
        Column::new("Volume".into(), vec![500u64; closes.len()]),
    ])
    .unwrap()
}

impl QuoteProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        lookback_days: u32,
        interval: Interval,
    ) -> Result<FetchResult, DataError> {
        self.bar_fetches.fetch_add(1, Ordering::SeqCst);
        match symbol {
            "DELISTED" => Err(DataError::SymbolNotFound {
                symbol: symbol.into(),
            }),
            "CLOSED" => Ok(FetchResult {
                symbol: symbol.into(),
                frame: DataFrame::empty(),
                source: quotecast_core::data::DataSource::Synthetic,
            }),
            "DOWN" => Err(DataError::NetworkUnreachable("connection refused".into())),
            "PARTIAL.NS" => Ok(FetchResult {
                symbol: symbol.into(),
                frame: frame_with_partial_bar(),
                source: quotecast_core::data::DataSource::Synthetic,
            }),
            _ => self.bars.fetch_bars(symbol, lookback_days, interval),
        }
    }

    fn latest_close(&self, symbol: &str) -> Result<f64, DataError> {
        self.fx_fetches.fetch_add(1, Ordering::SeqCst);
        self.fx_quote.ok_or_else(|| DataError::EmptyQuote {
            symbol: symbol.into(),
        })
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

fn session(provider: Arc<ScriptedProvider>) -> Session {
    Session::new(QuotecastConfig::default(), provider).unwrap()
}

#[test]
fn home_ticker_forecast() {
    let provider = ScriptedProvider::new(Some(84.0));
    let result = session(provider.clone()).forecast_ticker("INFY.NS").unwrap();

    assert_eq!(result.series.currency(), &Currency::inr());
    assert_eq!(result.conversion, Conversion::Unchanged);
    assert_eq!(result.forecast.len(), 10);
    assert_eq!(provider.fx_fetches.load(Ordering::SeqCst), 0);
}

#[test]
fn foreign_ticker_uses_live_rate() {
    let provider = ScriptedProvider::new(Some(84.0));
    let session = session(provider.clone());
    let result = session.forecast_ticker("AAPL").unwrap();

    let rate = result.conversion.rate().unwrap();
    assert_eq!(rate.rate, 84.0);
    assert_eq!(rate.provenance, RateProvenance::Fetched);
    assert_eq!(session.rate().rate, 84.0);
    assert_eq!(provider.fx_fetches.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_fx_quote_falls_back() {
    let session = session(ScriptedProvider::new(None));
    let result = session.forecast_ticker("MSFT").unwrap();
    let rate = result.conversion.rate().unwrap();
    assert_eq!(rate.rate, 83.0);
    assert!(rate.is_fallback());
}

#[test]
fn frames_are_cached_between_runs() {
    let provider = ScriptedProvider::new(Some(84.0));
    let session = session(provider.clone());

    let first = session.forecast_ticker("AAPL").unwrap();
    let second = session.forecast_ticker("aapl").unwrap();
    assert_eq!(provider.bar_fetches(), 1);
    // Same raw frame, converted once per run: identical series.
    assert_eq!(first.series.bars(), second.series.bars());

    session.forecast(&ForecastRequest::new("AAPL").with_interval(Interval::FiveMinutes)).unwrap();
    assert_eq!(provider.bar_fetches(), 2);
}

#[test]
fn provider_failures_are_classified() {
    let session = session(ScriptedProvider::new(Some(84.0)));

    let delisted = session.forecast_ticker("DELISTED").unwrap_err();
    assert_eq!(delisted.kind(), ErrorKind::NoData);

    let closed = session.forecast_ticker("CLOSED").unwrap_err();
    assert_eq!(closed.kind(), ErrorKind::NoData);

    let down = session.forecast_ticker("DOWN").unwrap_err();
    assert_eq!(down.kind(), ErrorKind::Unexpected);
    // Failed fetches are not cached; empty answers are.
    assert!(session.cache().get(&FrameKey::new("DOWN", Interval::OneMinute, 7)).is_none());
    assert!(session.cache().get(&FrameKey::new("CLOSED", Interval::OneMinute, 7)).is_some());
}

#[test]
fn predictions_follow_the_requested_interval() {
    let session = session(ScriptedProvider::new(Some(84.0)));
    let result = session
        .forecast(&ForecastRequest::new("PARTIAL.NS").with_interval(Interval::OneMinute))
        .unwrap();

    let last_ts = result.series.last().unwrap().timestamp;
    let stamps: Vec<_> = result.forecast.points.iter().take(3).map(|p| p.timestamp).collect();
    assert_eq!(result.forecast.step_secs, 60);
    assert_eq!(
        stamps,
        vec![
            last_ts + ChronoDuration::minutes(1),
            last_ts + ChronoDuration::minutes(2),
            last_ts + ChronoDuration::minutes(3),
        ]
    );
}

#[test]
fn unavailable_provider_is_not_called() {
    let provider = ScriptedProvider::new(Some(84.0));
    let session = session(provider.clone());
    session.forecast_ticker("AAPL").unwrap();

    provider.available.store(false, Ordering::SeqCst);
    // Fresh cache entries are still served.
    assert!(session.forecast_ticker("AAPL").is_ok());

    let err = session.forecast_ticker("MSFT").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unexpected);
    assert!(err.to_string().contains("MSFT"));
    assert_eq!(provider.bar_fetches(), 1);
}

#[test]
fn request_overrides_horizon() {
    let session = session(ScriptedProvider::new(Some(84.0)));
    let result = session
        .forecast(&ForecastRequest::new("TCS.NS").with_horizon(3))
        .unwrap();
    assert_eq!(result.forecast.len(), 3);
}

#[test]
fn forecast_many_keeps_order() {
    let session = session(ScriptedProvider::new(Some(84.0)));
    let requests: Vec<ForecastRequest> = ["AAPL", "DELISTED", "RELIANCE.NS", "MSFT"]
        .into_iter()
        .map(ForecastRequest::new)
        .collect();

    let results = session.forecast_many(&requests);
    let tickers: Vec<&str> = results.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(tickers, vec!["AAPL", "DELISTED", "RELIANCE.NS", "MSFT"]);
    assert!(results[0].1.is_ok());
    assert!(results[1].1.is_err());
    assert!(results[2].1.is_ok());
    assert!(results[3].1.is_ok());
}

#[test]
fn watch_runs_bounded_rounds() {
    let provider = ScriptedProvider::new(Some(84.0));
    let session = session(provider.clone());
    let requests = vec![ForecastRequest::new("AAPL"), ForecastRequest::new("INFY.NS")];
    let options = WatchOptions::new(Duration::from_millis(1)).with_max_rounds(3);

    let mut seen = Vec::new();
    let rounds = watch(&session, &requests, &options, |tick| {
        seen.push((tick.round, tick.successes()));
        ControlFlow::Continue(())
    });

    assert_eq!(rounds, 3);
    assert_eq!(seen, vec![(0, 2), (1, 2), (2, 2)]);
    // The 60 s frame cache serves every round after the first.
    assert_eq!(provider.bar_fetches(), 2);
}

#[test]
fn watch_stops_on_break() {
    let session = session(ScriptedProvider::new(Some(84.0)));
    let requests = vec![ForecastRequest::new("AAPL")];
    let options = WatchOptions::new(Duration::from_millis(1));

    let rounds = watch(&session, &requests, &options, |_| ControlFlow::Break(()));
    assert_eq!(rounds, 1);
}
