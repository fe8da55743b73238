//! ForecastEngine: indicators plus a linear-trend projection over a cleaned,
//! normalized series.

use super::trend::fit_line;
use crate::domain::{BarSeries, Forecast, ForecastPoint, Interval, TrendLine};
use crate::error::PipelineError;
use crate::indicators::{Indicator, IndicatorSet, Sma};
use chrono::Duration;
use serde::Serialize;

pub const DEFAULT_MA_WINDOWS: [usize; 2] = [5, 20];
pub const DEFAULT_MIN_FIT_POINTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastOutput {
    pub indicators: IndicatorSet,
    pub forecast: Forecast,
}

pub struct ForecastEngine {
    indicators: Vec<Box<dyn Indicator>>,
    min_fit_points: usize,
    interval: Option<Interval>,
}

impl std::fmt::Debug for ForecastEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.indicators.iter().map(|i| i.name()).collect();
        f.debug_struct("ForecastEngine")
            .field("indicators", &names)
            .field("min_fit_points", &self.min_fit_points)
            .field("interval", &self.interval)
            .finish()
    }
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new(&DEFAULT_MA_WINDOWS, DEFAULT_MIN_FIT_POINTS)
    }
}

impl ForecastEngine {
    /// Engine with one SMA per window. Windows and `min_fit_points` are
    /// validated by `PipelineConfig`; zero windows are skipped here.
    pub fn new(ma_windows: &[usize], min_fit_points: usize) -> Self {
        let indicators = ma_windows
            .iter()
            .filter_map(|&w| Sma::try_new(w))
            .map(|sma| Box::new(sma) as Box<dyn Indicator>)
            .collect();
        Self {
            indicators,
            min_fit_points: min_fit_points.max(2),
            interval: None,
        }
    }

    /// Spacing for series whose sampling interval is not known, instead of
    /// inferring it from the timestamps.
    pub fn with_interval(mut self, interval: Option<Interval>) -> Self {
        self.interval = interval;
        self
    }

    pub fn min_fit_points(&self) -> usize {
        self.min_fit_points
    }

    pub fn indicators(&self, series: &BarSeries) -> IndicatorSet {
        IndicatorSet::compute(&self.indicators, series.bars())
    }

    /// Least-squares trend of close against bar index.
    pub fn fit_trend(&self, series: &BarSeries) -> Result<TrendLine, PipelineError> {
        let insufficient = || PipelineError::InsufficientData {
            symbol: series.symbol().to_string(),
            rows: series.len(),
            required: self.min_fit_points,
        };
        if series.len() < self.min_fit_points {
            return Err(insufficient());
        }
        fit_line(&series.closes()).ok_or_else(insufficient)
    }

    /// Spacing between predictions for a series of unknown sampling interval:
    /// configured interval, else the series' observed interval, else one minute.
    pub fn step(&self, series: &BarSeries) -> Duration {
        self.step_for(series, None)
    }

    /// Spacing between predictions. The interval the bars were sampled at
    /// takes precedence over the configured and observed ones.
    pub fn step_for(&self, series: &BarSeries, sampling: Option<Interval>) -> Duration {
        sampling
            .or(self.interval)
            .map(Interval::duration)
            .or_else(|| series.observed_interval())
            .unwrap_or_else(|| Duration::minutes(1))
    }

    /// Indicators plus `horizon` extrapolated closes.
    ///
    /// A series too short to fit yields the indicators with no predictions.
    pub fn forecast(&self, series: &BarSeries, horizon: usize) -> ForecastOutput {
        self.forecast_sampled(series, horizon, None)
    }

    /// Like [`forecast`](Self::forecast), for bars sampled at a known interval.
    pub fn forecast_sampled(
        &self,
        series: &BarSeries,
        horizon: usize,
        sampling: Option<Interval>,
    ) -> ForecastOutput {
        let indicators = self.indicators(series);
        let step = self.step_for(series, sampling);

        let (trend, points) = match (self.fit_trend(series), series.last()) {
            (Ok(trend), Some(last)) => {
                let n = series.len();
                let points = (1..=horizon)
                    .map(|k| ForecastPoint {
                        timestamp: last.timestamp + step * k as i32,
                        price: trend.value_at(n + k - 1),
                    })
                    .collect();
                (Some(trend), points)
            }
            (Err(e), _) => {
                log::debug!("{}: no forecast: {e}", series.symbol());
                (None, Vec::new())
            }
            (Ok(_), None) => (None, Vec::new()),
        };

        ForecastOutput {
            indicators,
            forecast: Forecast {
                trend,
                step_secs: step.num_seconds(),
                points,
            },
        }
    }
}
