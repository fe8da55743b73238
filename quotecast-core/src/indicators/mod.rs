//! Indicator trait and the named indicator container.
//!
//! Indicators are pure functions: bar history in, one value per bar out.
//! They are computed once per pipeline run over the cleaned, normalized
//! series. Positions before an indicator's window fills are `None` and
//! serialize as `null`.

pub mod sma;

pub use sma::Sma;

use crate::domain::Bar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trait for indicators.
///
/// `compute` returns a vector the same length as `bars`. No value at bar t may
/// depend on bars after t.
pub trait Indicator: Send + Sync {
    /// Name the output is stored under (e.g. "sma_20").
    fn name(&self) -> &str;

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>>;
}

/// Named indicator overlays aligned index-for-index with a series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorSet {
    series: BTreeMap<String, Vec<Option<f64>>>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute every indicator over `bars`.
    pub fn compute(indicators: &[Box<dyn Indicator>], bars: &[Bar]) -> Self {
        let mut set = Self::new();
        for indicator in indicators {
            set.insert(indicator.name(), indicator.compute(bars));
        }
        set
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) {
        self.series.insert(name.into(), values);
    }

    /// Value at `index`; `None` when the name is unknown, the index is out of
    /// range, or the window had not filled yet.
    pub fn get(&self, name: &str, index: usize) -> Option<f64> {
        self.series.get(name).and_then(|v| v.get(index).copied().flatten())
    }

    pub fn get_series(&self, name: &str) -> Option<&[Option<f64>]> {
        self.series.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.series.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Bars from close prices, one minute apart, for indicator tests.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::TimeZone;
    let start = chrono::Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: start + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "expected {expected}, got {actual} (diff = {})",
        (actual - expected).abs()
    );
}
