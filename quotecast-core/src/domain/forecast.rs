use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One extrapolated price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Least-squares line `close = intercept + slope * bar_index`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination over the fitted bars. 1.0 for a flat
    /// series, where the line explains everything there is to explain.
    pub r_squared: f64,
}

impl TrendLine {
    pub fn value_at(&self, index: usize) -> f64 {
        self.intercept + self.slope * index as f64
    }
}

/// Short-horizon price projection.
///
/// `points` is empty when the series was too short to fit a trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub trend: Option<TrendLine>,
    /// Spacing between consecutive points, in seconds.
    pub step_secs: i64,
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&ForecastPoint> {
        self.points.last()
    }
}
