//! Deterministic synthetic bar provider.
//!
//! Produces a seeded random walk per symbol so the full pipeline can run
//! offline. Output is clearly fake and tagged `DataSource::Synthetic`.

use super::provider::{DataError, DataSource, FetchResult, QuoteProvider};
use crate::domain::Interval;
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Regular session length in minutes (US cash session).
const SESSION_MINUTES: i64 = 390;
/// Probability that a generated bar has a hole in one price field.
const DEFAULT_MISSING_RATIO: f64 = 0.002;

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    /// Fixed "now" for reproducible frames; wall clock when unset.
    anchor: Option<DateTime<Utc>>,
    missing_ratio: f64,
    start_price: f64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            anchor: None,
            missing_ratio: DEFAULT_MISSING_RATIO,
            start_price: 100.0,
        }
    }
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_missing_ratio(mut self, ratio: f64) -> Self {
        self.missing_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    fn session_open(day: chrono::NaiveDate) -> DateTime<Utc> {
        let open = day.and_time(NaiveTime::from_hms_opt(14, 30, 0).unwrap_or_default());
        Utc.from_utc_datetime(&open)
    }

    /// Bar open times for the weekdays in `(end - lookback_days, end]`.
    fn timestamps(end: DateTime<Utc>, lookback_days: u32, interval: Interval) -> Vec<DateTime<Utc>> {
        let step = interval.duration();
        let first_day = (end - Duration::days(i64::from(lookback_days))).date_naive();
        let mut out = Vec::new();

        for day in first_day.iter_days().take_while(|d| *d <= end.date_naive()) {
            if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            let open = Self::session_open(day);
            if interval == Interval::OneDay {
                if open <= end {
                    out.push(open);
                }
                continue;
            }
            let close = open + Duration::minutes(SESSION_MINUTES);
            let mut ts = open;
            while ts < close && ts <= end {
                out.push(ts);
                ts += step;
            }
        }
        out
    }

    fn generate(&self, symbol: &str, lookback_days: u32, interval: Interval) -> Result<DataFrame, PolarsError> {
        let end = self.anchor.unwrap_or_else(Utc::now);
        let stamps = Self::timestamps(end, lookback_days, interval);

        // Deterministic seed from symbol name
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);

        let n = stamps.len();
        let mut open = Vec::with_capacity(n);
        let mut high = Vec::with_capacity(n);
        let mut low = Vec::with_capacity(n);
        let mut close = Vec::with_capacity(n);
        let mut volume = Vec::with_capacity(n);
        let mut price = self.start_price;

        for _ in 0..n {
            let step_return: f64 = rng.gen_range(-0.002..0.002);
            let o = price;
            let c = price * (1.0 + step_return);
            let h = o.max(c) * (1.0 + rng.gen_range(0.0..0.001));
            let l = o.min(c) * (1.0 - rng.gen_range(0.0..0.001));
            let v = rng.gen_range(1_000..50_000u64);
            price = c;

            let hole = rng.gen_bool(self.missing_ratio);
            open.push(Some(o));
            high.push(Some(h));
            low.push(Some(l));
            close.push(if hole { None } else { Some(c) });
            volume.push(Some(v));
        }

        let millis: Vec<i64> = stamps.iter().map(DateTime::timestamp_millis).collect();
        DataFrame::new(vec![
            Column::new("Datetime".into(), millis)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, Some("UTC".into())))?,
            Column::new("Open".into(), open),
            Column::new("High".into(), high),
            Column::new("Low".into(), low),
            Column::new("Close".into(), close),
            Column::new("Volume".into(), volume),
        ])
    }
}

impl QuoteProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        lookback_days: u32,
        interval: Interval,
    ) -> Result<FetchResult, DataError> {
        log::warn!("generating synthetic bars for {symbol}; results are not market data");
        let frame = self
            .generate(symbol, lookback_days, interval)
            .map_err(|e| DataError::Other(format!("synthetic frame: {e}")))?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            frame,
            source: DataSource::Synthetic,
        })
    }

    /// There is no synthetic FX market; rate lookups fall back.
    fn latest_close(&self, _symbol: &str) -> Result<f64, DataError> {
        Err(DataError::Unsupported {
            provider: self.name().to_string(),
            operation: "latest_close",
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}
