//! Cached foreign→home exchange rate.
//!
//! The rate is fetched lazily from the quote source's latest close for the
//! pair symbol and reused until its TTL lapses or it is invalidated. Lookup
//! never fails: any upstream problem yields the fallback rate, which is cached
//! under the same TTL.

use super::{ExchangeRate, FxConfig, RateProvenance, DEFAULT_FALLBACK_RATE, DEFAULT_PAIR_SYMBOL};
use crate::data::QuoteProvider;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: ExchangeRate,
    stored_at: Instant,
}

pub struct ExchangeRateProvider {
    source: Arc<dyn QuoteProvider>,
    pair: String,
    fallback_rate: f64,
    ttl: Option<Duration>,
    cache: Mutex<Option<CachedRate>>,
}

impl std::fmt::Debug for ExchangeRateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRateProvider")
            .field("source", &self.source.name())
            .field("pair", &self.pair)
            .field("fallback_rate", &self.fallback_rate)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl ExchangeRateProvider {
    /// Provider for `USDINR=X` with an 83.0 fallback and no expiry.
    pub fn new(source: Arc<dyn QuoteProvider>) -> Self {
        Self {
            source,
            pair: DEFAULT_PAIR_SYMBOL.to_string(),
            fallback_rate: DEFAULT_FALLBACK_RATE,
            ttl: None,
            cache: Mutex::new(None),
        }
    }

    pub fn from_config(source: Arc<dyn QuoteProvider>, config: &FxConfig) -> Self {
        Self::new(source)
            .with_pair(config.pair_symbol.clone())
            .with_fallback_rate(config.fallback_rate)
            .with_ttl(config.rate_ttl_secs.map(Duration::from_secs))
    }

    pub fn with_pair(mut self, pair: impl Into<String>) -> Self {
        self.pair = pair.into();
        self
    }

    pub fn with_fallback_rate(mut self, rate: f64) -> Self {
        self.fallback_rate = rate;
        self
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn fallback_rate(&self) -> f64 {
        self.fallback_rate
    }

    fn lock(&self) -> MutexGuard<'_, Option<CachedRate>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, cached: &CachedRate) -> bool {
        self.ttl.map_or(true, |ttl| cached.stored_at.elapsed() < ttl)
    }

    /// Current rate, fetching on first use or after expiry.
    ///
    /// The cache lock is held across the fetch, so concurrent callers racing
    /// on an empty cache trigger one upstream request.
    pub fn get_rate(&self) -> ExchangeRate {
        let mut cache = self.lock();
        if let Some(cached) = cache.as_ref().filter(|c| self.is_fresh(c)) {
            return cached.rate;
        }
        self.store(&mut cache)
    }

    /// Fetch a new rate regardless of the cached one.
    pub fn refresh(&self) -> ExchangeRate {
        let mut cache = self.lock();
        self.store(&mut cache)
    }

    /// Drop the cached rate; the next lookup fetches.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    /// The cached rate if present and unexpired, without fetching.
    pub fn cached(&self) -> Option<ExchangeRate> {
        self.lock()
            .as_ref()
            .filter(|c| self.is_fresh(c))
            .map(|c| c.rate)
    }

    fn store(&self, cache: &mut Option<CachedRate>) -> ExchangeRate {
        let rate = self.fetch();
        *cache = Some(CachedRate {
            rate,
            stored_at: Instant::now(),
        });
        rate
    }

    fn fetch(&self) -> ExchangeRate {
        let outcome = self.source.latest_close(&self.pair);
        let fetched_at = Utc::now();
        match outcome {
            Ok(rate) if rate.is_finite() && rate > 0.0 => {
                log::info!("{} = {rate:.4} (via {})", self.pair, self.source.name());
                ExchangeRate {
                    rate,
                    fetched_at,
                    provenance: RateProvenance::Fetched,
                }
            }
            Ok(rate) => {
                log::warn!(
                    "{} quote {rate} is unusable; using fallback rate {}",
                    self.pair,
                    self.fallback_rate
                );
                self.fallback(fetched_at)
            }
            Err(e) => {
                log::warn!(
                    "failed to fetch {}: {e}; using fallback rate {}",
                    self.pair,
                    self.fallback_rate
                );
                self.fallback(fetched_at)
            }
        }
    }

    fn fallback(&self, at: chrono::DateTime<Utc>) -> ExchangeRate {
        ExchangeRate {
            rate: self.fallback_rate,
            fetched_at: at,
            provenance: RateProvenance::Fallback,
        }
    }
}
