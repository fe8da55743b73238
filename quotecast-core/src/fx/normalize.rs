//! CurrencyNormalizer: one display currency per pipeline run.
//!
//! Home-market instruments (ticker suffix `.NS`, `.BO` by default) are already
//! quoted in the home currency and pass through untouched. Everything else is
//! assumed to be quoted in the foreign currency and has its prices multiplied
//! by the current rate. Volume is never rescaled.

use super::{ExchangeRate, ExchangeRateProvider, FxConfig};
use crate::domain::{BarSeries, Currency};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What normalization did to a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conversion {
    Unchanged,
    Converted {
        from: Currency,
        to: Currency,
        rate: ExchangeRate,
    },
}

impl Conversion {
    pub fn rate(&self) -> Option<&ExchangeRate> {
        match self {
            Self::Unchanged => None,
            Self::Converted { rate, .. } => Some(rate),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub series: BarSeries,
    pub conversion: Conversion,
}

#[derive(Debug, Clone)]
pub struct CurrencyNormalizer {
    rates: Arc<ExchangeRateProvider>,
    /// Upper-cased for case-insensitive matching.
    home_suffixes: Vec<String>,
    home_currency: Currency,
    foreign_currency: Currency,
}

impl CurrencyNormalizer {
    /// INR home market with `.NS` / `.BO` suffixes and USD as the foreign quote.
    pub fn new(rates: Arc<ExchangeRateProvider>) -> Self {
        Self::from_config(rates, &FxConfig::default())
    }

    pub fn from_config(rates: Arc<ExchangeRateProvider>, config: &FxConfig) -> Self {
        Self {
            rates,
            home_suffixes: config
                .home_suffixes
                .iter()
                .map(|s| s.trim().to_ascii_uppercase())
                .collect(),
            home_currency: config.home_currency.clone(),
            foreign_currency: config.foreign_currency.clone(),
        }
    }

    pub fn rates(&self) -> &Arc<ExchangeRateProvider> {
        &self.rates
    }

    pub fn home_currency(&self) -> &Currency {
        &self.home_currency
    }

    pub fn is_home_symbol(&self, symbol: &str) -> bool {
        let symbol = symbol.trim().to_ascii_uppercase();
        self.home_suffixes.iter().any(|suffix| symbol.ends_with(suffix.as_str()))
    }

    /// Currency a raw series for `symbol` is quoted in.
    pub fn quote_currency(&self, symbol: &str) -> Currency {
        if self.is_home_symbol(symbol) {
            self.home_currency.clone()
        } else {
            self.foreign_currency.clone()
        }
    }

    /// Rewrite `series` into the home currency.
    ///
    /// Series that are home-market or already tagged with the home currency
    /// are returned as-is, so normalizing twice never converts twice.
    pub fn normalize(&self, series: BarSeries) -> Normalized {
        if self.is_home_symbol(series.symbol()) || *series.currency() == self.home_currency {
            return Normalized {
                series,
                conversion: Conversion::Unchanged,
            };
        }

        let rate = self.rates.get_rate();
        log::debug!(
            "{}: converting {} bars {} -> {} at {}",
            series.symbol(),
            series.len(),
            series.currency(),
            self.home_currency,
            rate.rate
        );
        let from = series.currency().clone();
        Normalized {
            series: series.rescaled(rate.rate, self.home_currency.clone()),
            conversion: Conversion::Converted {
                from,
                to: self.home_currency.clone(),
                rate,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataError, FetchResult, QuoteProvider};
    use crate::domain::{Bar, Interval};
    use chrono::{Duration, TimeZone, Utc};

    struct FixedQuote(Option<f64>);

    impl QuoteProvider for FixedQuote {
        fn name(&self) -> &str {
            "fixed"
        }

        fn fetch_bars(&self, _: &str, _: u32, _: Interval) -> Result<FetchResult, DataError> {
            Err(DataError::Other("not used".into()))
        }

        fn latest_close(&self, _: &str) -> Result<f64, DataError> {
            self.0.ok_or_else(|| DataError::Other("offline".into()))
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn normalizer(quote: Option<f64>) -> CurrencyNormalizer {
        let rates = ExchangeRateProvider::new(Arc::new(FixedQuote(quote)));
        CurrencyNormalizer::new(Arc::new(rates))
    }

    fn series(symbol: &str, currency: Currency) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
        let bars = (0..3)
            .map(|i| Bar {
                timestamp: start + Duration::minutes(i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.5,
                volume: 500,
            })
            .collect();
        BarSeries::new(symbol, currency, bars).unwrap()
    }

    #[test]
    fn home_suffix_matching_is_case_insensitive() {
        let n = normalizer(Some(84.0));
        assert!(n.is_home_symbol("RELIANCE.NS"));
        assert!(n.is_home_symbol("tcs.bo"));
        assert!(!n.is_home_symbol("AAPL"));
        assert!(!n.is_home_symbol("NSE.L"));
        assert_eq!(n.quote_currency("INFY.NS"), Currency::inr());
        assert_eq!(n.quote_currency("MSFT"), Currency::usd());
    }

    #[test]
    fn home_series_passes_through() {
        let input = series("INFY.NS", Currency::inr());
        let out = normalizer(Some(84.0)).normalize(input.clone());
        assert_eq!(out.series, input);
        assert_eq!(out.conversion, Conversion::Unchanged);
    }

    #[test]
    fn foreign_series_is_scaled_volume_untouched() {
        let out = normalizer(Some(84.0)).normalize(series("AAPL", Currency::usd()));
        assert_eq!(out.series.currency(), &Currency::inr());
        for bar in out.series.bars() {
            assert_eq!(bar.open, 8400.0);
            assert_eq!(bar.high, 101.0 * 84.0);
            assert_eq!(bar.close, 100.5 * 84.0);
            assert_eq!(bar.volume, 500);
        }
        assert_eq!(out.conversion.rate().map(|r| r.rate), Some(84.0));
    }

    #[test]
    fn converted_series_is_not_converted_again() {
        let n = normalizer(Some(84.0));
        let once = n.normalize(series("AAPL", Currency::usd()));
        let twice = n.normalize(once.series.clone());
        assert_eq!(twice.series, once.series);
        assert_eq!(twice.conversion, Conversion::Unchanged);
    }

    #[test]
    fn offline_quote_uses_fallback() {
        let out = normalizer(None).normalize(series("AAPL", Currency::usd()));
        assert_eq!(out.series.bars()[0].open, 8300.0);
        assert!(out.conversion.rate().is_some_and(ExchangeRate::is_fallback));
    }
}
