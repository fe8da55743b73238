//! Bar and BarSeries, the fundamental market data units.

use super::{Currency, DomainError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single instrument over one sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Returns true if any price field is NaN or infinite (void bar).
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Finite, strictly positive prices on all four price fields.
    pub fn has_valid_prices(&self) -> bool {
        !self.is_void() && self.open > 0.0 && self.high > 0.0 && self.low > 0.0 && self.close > 0.0
    }

    /// Multiply every price field by `factor`. Volume is a share count and is
    /// never rescaled.
    pub fn scale_prices(&self, factor: f64) -> Bar {
        Bar {
            open: self.open * factor,
            high: self.high * factor,
            low: self.low * factor,
            close: self.close * factor,
            ..*self
        }
    }
}

/// An ordered, validated sequence of bars for one instrument in one currency.
///
/// Invariants (checked by [`BarSeries::new`]):
/// - timestamps are strictly increasing
/// - no bar is void
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    symbol: String,
    currency: Currency,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(
        symbol: impl Into<String>,
        currency: Currency,
        bars: Vec<Bar>,
    ) -> Result<Self, DomainError> {
        if let Some(i) = bars.iter().position(Bar::is_void) {
            return Err(DomainError::VoidBar { index: i });
        }
        if let Some(i) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(DomainError::UnorderedTimestamps { index: i + 1 });
        }
        Ok(Self {
            symbol: symbol.into(),
            currency,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Median spacing between consecutive bars.
    ///
    /// Most gaps in an intraday feed are one sampling step; overnight gaps
    /// and a trailing in-progress bar are outliers on either side. `None` for
    /// fewer than two bars.
    pub fn observed_interval(&self) -> Option<Duration> {
        let mut gaps: Vec<Duration> = self
            .bars
            .windows(2)
            .map(|w| w[1].timestamp - w[0].timestamp)
            .filter(|d| *d > Duration::zero())
            .collect();
        if gaps.is_empty() {
            return None;
        }
        gaps.sort_unstable();
        Some(gaps[(gaps.len() - 1) / 2])
    }

    /// Copy of this series with every price multiplied by `factor`, retagged
    /// in `currency`. Ordering and volumes are preserved, so the invariants
    /// carry over as long as `factor` is finite and positive.
    pub fn rescaled(&self, factor: f64, currency: Currency) -> BarSeries {
        BarSeries {
            symbol: self.symbol.clone(),
            currency,
            bars: self.bars.iter().map(|b| b.scale_prices(factor)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_at(minute: i64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 9, 15, 0).unwrap()
                + Duration::minutes(minute),
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = bar_at(0, 100.0);
        assert!(!bar.is_void());
        bar.high = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.has_valid_prices());
    }

    #[test]
    fn bar_rejects_non_positive_prices() {
        let mut bar = bar_at(0, 100.0);
        bar.low = 0.0;
        assert!(!bar.has_valid_prices());
    }

    #[test]
    fn scale_prices_leaves_volume() {
        let scaled = bar_at(0, 100.0).scale_prices(2.0);
        assert_eq!(scaled.close, 200.0);
        assert_eq!(scaled.open, 199.0);
        assert_eq!(scaled.volume, 1_000);
    }

    #[test]
    fn series_rejects_unordered_timestamps() {
        let bars = vec![bar_at(0, 1.0), bar_at(2, 2.0), bar_at(1, 3.0)];
        let err = BarSeries::new("AAPL", Currency::usd(), bars).unwrap_err();
        assert!(matches!(err, DomainError::UnorderedTimestamps { index: 2 }));
    }

    #[test]
    fn series_rejects_duplicate_timestamps() {
        let bars = vec![bar_at(0, 1.0), bar_at(0, 2.0)];
        assert!(BarSeries::new("AAPL", Currency::usd(), bars).is_err());
    }

    #[test]
    fn observed_interval_ignores_session_gaps() {
        let bars = vec![bar_at(0, 1.0), bar_at(5, 2.0), bar_at(10, 3.0), bar_at(600, 4.0)];
        let series = BarSeries::new("AAPL", Currency::usd(), bars).unwrap();
        assert_eq!(series.observed_interval(), Some(Duration::minutes(5)));
    }

    #[test]
    fn observed_interval_single_bar() {
        let series = BarSeries::new("AAPL", Currency::usd(), vec![bar_at(0, 1.0)]).unwrap();
        assert_eq!(series.observed_interval(), None);
    }

    #[test]
    fn observed_interval_ignores_partial_last_bar() {
        let mut bars: Vec<Bar> = (0..10).map(|m| bar_at(m, 1.0)).collect();
        let mut partial = bar_at(9, 1.0);
        partial.timestamp += Duration::seconds(23);
        bars.push(partial);
        let series = BarSeries::new("AAPL", Currency::usd(), bars).unwrap();
        assert_eq!(series.observed_interval(), Some(Duration::minutes(1)));
    }
}
