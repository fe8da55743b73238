//! PipelineOrchestrator: raw frame → cleaned series → normalized series →
//! (indicators, forecast).
//!
//! Stateless apart from the exchange-rate cache reachable through the
//! normalizer. Each stage short-circuits the run on failure.

use crate::data::SeriesCleaner;
use crate::data::clean::DEFAULT_MIN_ROWS;
use crate::domain::{BarSeries, Forecast, Interval};
use crate::error::PipelineError;
use crate::forecast::{ForecastEngine, DEFAULT_MA_WINDOWS, DEFAULT_MIN_FIT_POINTS};
use crate::fx::{Conversion, CurrencyNormalizer};
use crate::indicators::IndicatorSet;
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HORIZON: usize = 10;

/// `[pipeline]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum bars that must survive cleaning.
    pub min_rows: usize,
    /// Number of predicted points.
    pub horizon: usize,
    pub ma_windows: Vec<usize>,
    /// Minimum bars for a trend fit.
    pub min_fit_points: usize,
    /// Prediction spacing for runs that do not say what interval their bars
    /// were sampled at (CSV files). Inferred from the series when unset.
    pub interval: Option<Interval>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_rows: DEFAULT_MIN_ROWS,
            horizon: DEFAULT_HORIZON,
            ma_windows: DEFAULT_MA_WINDOWS.to_vec(),
            min_fit_points: DEFAULT_MIN_FIT_POINTS,
            interval: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.min_rows == 0 {
            return Err(PipelineError::Config("pipeline.min_rows must be >= 1".into()));
        }
        if self.horizon == 0 {
            return Err(PipelineError::Config("pipeline.horizon must be >= 1".into()));
        }
        if self.ma_windows.iter().any(|&w| w == 0) {
            return Err(PipelineError::Config(format!(
                "pipeline.ma_windows must all be >= 1, got {:?}",
                self.ma_windows
            )));
        }
        if self.min_fit_points < 2 {
            return Err(PipelineError::Config(
                "pipeline.min_fit_points must be >= 2 (a line needs two points)".into(),
            ));
        }
        Ok(())
    }
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub ticker: String,
    pub series: BarSeries,
    pub indicators: IndicatorSet,
    pub forecast: Forecast,
    pub conversion: Conversion,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    cleaner: SeriesCleaner,
    normalizer: CurrencyNormalizer,
    engine: ForecastEngine,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, normalizer: CurrencyNormalizer) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            cleaner: SeriesCleaner::try_new(config.min_rows)?,
            engine: ForecastEngine::new(&config.ma_windows, config.min_fit_points)
                .with_interval(config.interval),
            normalizer,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &CurrencyNormalizer {
        &self.normalizer
    }

    /// Run with the configured horizon.
    pub fn run(&self, frame: &DataFrame, ticker: &str) -> Result<PipelineResult, PipelineError> {
        self.run_with_horizon(frame, ticker, self.config.horizon)
    }

    pub fn run_with_horizon(
        &self,
        frame: &DataFrame,
        ticker: &str,
        horizon: usize,
    ) -> Result<PipelineResult, PipelineError> {
        self.run_with(frame, ticker, horizon, None)
    }

    /// Run over bars sampled at `sampling`, which then sets the prediction
    /// spacing. `None` falls back to the configured or observed interval.
    pub fn run_with(
        &self,
        frame: &DataFrame,
        ticker: &str,
        horizon: usize,
        sampling: Option<Interval>,
    ) -> Result<PipelineResult, PipelineError> {
        if frame.height() == 0 {
            return Err(PipelineError::NoData {
                symbol: ticker.to_string(),
            });
        }

        let quoted_in = self.normalizer.quote_currency(ticker);
        let series = self.cleaner.clean(ticker, quoted_in, frame)?;
        let normalized = self.normalizer.normalize(series);
        let output = self.engine.forecast_sampled(&normalized.series, horizon, sampling);

        log::info!(
            "{ticker}: {} bars, {} predictions, {}",
            normalized.series.len(),
            output.forecast.len(),
            match &normalized.conversion {
                Conversion::Unchanged => "no conversion".to_string(),
                Conversion::Converted { from, to, rate } => format!("{from}->{to} @ {:.4}", rate.rate),
            }
        );

        Ok(PipelineResult {
            ticker: ticker.to_string(),
            series: normalized.series,
            indicators: output.indicators,
            forecast: output.forecast,
            conversion: normalized.conversion,
            last_updated: Utc::now(),
        })
    }
}
