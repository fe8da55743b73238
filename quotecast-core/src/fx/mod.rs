//! Currency handling: the cached USD→home exchange rate and the normalizer
//! that rewrites foreign-quoted series into the home currency.

pub mod normalize;
pub mod rate;

pub use normalize::{Conversion, CurrencyNormalizer, Normalized};
pub use rate::ExchangeRateProvider;

use crate::domain::Currency;
use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAIR_SYMBOL: &str = "USDINR=X";
pub const DEFAULT_FALLBACK_RATE: f64 = 83.0;
pub const DEFAULT_RATE_TTL_SECS: u64 = 3600;

/// Whether a rate came from the live quote or the configured constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateProvenance {
    Fetched,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub rate: f64,
    pub fetched_at: DateTime<Utc>,
    pub provenance: RateProvenance,
}

impl ExchangeRate {
    pub fn is_fallback(&self) -> bool {
        self.provenance == RateProvenance::Fallback
    }
}

/// `[fx]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxConfig {
    /// Ticker suffixes of instruments already quoted in the home currency.
    pub home_suffixes: Vec<String>,
    pub home_currency: Currency,
    pub foreign_currency: Currency,
    /// Quote symbol whose last close is the foreign→home rate.
    pub pair_symbol: String,
    pub fallback_rate: f64,
    /// Rate cache lifetime. `None` keeps the first rate for the process lifetime.
    pub rate_ttl_secs: Option<u64>,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            home_suffixes: vec![".NS".into(), ".BO".into()],
            home_currency: Currency::inr(),
            foreign_currency: Currency::usd(),
            pair_symbol: DEFAULT_PAIR_SYMBOL.into(),
            fallback_rate: DEFAULT_FALLBACK_RATE,
            rate_ttl_secs: Some(DEFAULT_RATE_TTL_SECS),
        }
    }
}

impl FxConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.home_suffixes.is_empty() || self.home_suffixes.iter().any(|s| s.trim().is_empty()) {
            return Err(PipelineError::Config(
                "fx.home_suffixes must list at least one non-empty suffix".into(),
            ));
        }
        if !(self.fallback_rate.is_finite() && self.fallback_rate > 0.0) {
            return Err(PipelineError::Config(format!(
                "fx.fallback_rate must be finite and positive, got {}",
                self.fallback_rate
            )));
        }
        if self.pair_symbol.trim().is_empty() {
            return Err(PipelineError::Config("fx.pair_symbol is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = FxConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pair_symbol, "USDINR=X");
        assert_eq!(config.fallback_rate, 83.0);
    }

    #[test]
    fn rejects_bad_fallback() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = FxConfig {
                fallback_rate: rate,
                ..FxConfig::default()
            };
            assert!(config.validate().is_err(), "accepted {rate}");
        }
    }

    #[test]
    fn rejects_empty_suffixes() {
        let config = FxConfig {
            home_suffixes: vec![],
            ..FxConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }
}
