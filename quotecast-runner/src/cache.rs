//! In-memory TTL cache of raw provider frames.
//!
//! Entries are keyed by request (ticker, interval, lookback) and expire after
//! a fixed TTL. Only raw frames are cached: every pipeline run cleans and
//! converts afresh, so a cached frame is never converted twice.
//!
//! Concurrent misses on the same key are serialized: one caller fetches,
//! the rest wait and read its entry.

use quotecast_core::data::FetchResult;
use quotecast_core::domain::Interval;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub ticker: String,
    pub interval: Interval,
    pub lookback_days: u32,
}

impl FrameKey {
    pub fn new(ticker: &str, interval: Interval, lookback_days: u32) -> Self {
        Self {
            ticker: ticker.trim().to_ascii_uppercase(),
            interval,
            lookback_days,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedFrame {
    fetched: FetchResult,
    expires_at: Instant,
}

/// Thread-safe raw-frame cache.
#[derive(Debug)]
pub struct FrameCache {
    ttl: Duration,
    entries: RwLock<HashMap<FrameKey, CachedFrame>>,
    /// Per-key fetch gates for keys with a fetch in progress.
    inflight: Mutex<HashMap<FrameKey, Arc<Mutex<()>>>>,
}

impl FrameCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Unexpired frame for `key`, if any.
    pub fn get(&self, key: &FrameKey) -> Option<FetchResult> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.fetched.clone())
    }

    pub fn insert(&self, key: FrameKey, fetched: FetchResult) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key,
            CachedFrame {
                fetched,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Cached frame for `key`, or the result of `fetch`, which is cached on
    /// success. Errors are never cached.
    ///
    /// At most one `fetch` per key runs at a time. Callers that missed while
    /// it ran block until it finishes, then take the fresh entry (or, if it
    /// failed, fetch themselves).
    pub fn get_or_fetch<E>(
        &self,
        key: &FrameKey,
        fetch: impl FnOnce() -> Result<FetchResult, E>,
    ) -> Result<FetchResult, E> {
        if let Some(hit) = self.cached(key) {
            return Ok(hit);
        }

        let gate = self.gate(key);
        let result = {
            let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);
            match self.cached(key) {
                Some(hit) => Ok(hit),
                None => {
                    let result = fetch();
                    if let Ok(fetched) = &result {
                        self.insert(key.clone(), fetched.clone());
                    }
                    result
                }
            }
        };
        self.release(key, &gate);
        result
    }

    fn cached(&self, key: &FrameKey) -> Option<FetchResult> {
        let hit = self.get(key)?;
        log::info!("{}: using cached frame ({} rows)", key.ticker, hit.frame.height());
        Some(hit)
    }

    fn gate(&self, key: &FrameKey) -> Arc<Mutex<()>> {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(inflight.entry(key.clone()).or_default())
    }

    /// Forget the gate once no other caller holds it.
    fn release(&self, key: &FrameKey, gate: &Arc<Mutex<()>>) {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one held by the caller.
        if Arc::strong_count(gate) <= 2 {
            inflight.remove(key);
        }
    }

    pub fn invalidate(&self, key: &FrameKey) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
