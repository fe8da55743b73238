//! Property tests for the raw-frame cache.

use polars::prelude::*;
use proptest::prelude::*;
use quotecast_core::data::{DataSource, FetchResult};
use quotecast_core::domain::Interval;
use quotecast_runner::{FrameCache, FrameKey};
use std::collections::HashSet;
use std::time::Duration;

fn frame_for(symbol: &str) -> FetchResult {
    FetchResult {
        symbol: symbol.to_string(),
        frame: df!("Close" => &[1.0, 2.0]).unwrap(),
        source: DataSource::Synthetic,
    }
}

proptest! {
    /// Within the TTL, each distinct ticker is fetched exactly once no matter
    /// how requests interleave or how the ticker is cased.
    #[test]
    fn one_fetch_per_distinct_ticker(
        tickers in prop::collection::vec(prop::sample::select(vec!["aapl", "AAPL", "msft", "Tcs.NS", "TCS.NS", "infy.ns"]), 1..50),
    ) {
        let cache = FrameCache::new(Duration::from_secs(3600));
        let mut fetched: Vec<String> = Vec::new();

        for ticker in &tickers {
            let key = FrameKey::new(ticker, Interval::OneMinute, 7);
            let hit: Result<FetchResult, ()> = cache.get_or_fetch(&key, || {
                fetched.push(ticker.to_ascii_uppercase());
                Ok(frame_for(ticker))
            });
            prop_assert!(hit.is_ok());
        }

        let distinct: HashSet<String> = tickers.iter().map(|t| t.to_ascii_uppercase()).collect();
        prop_assert_eq!(fetched.len(), distinct.len());
        prop_assert_eq!(cache.len(), distinct.len());
    }
}
