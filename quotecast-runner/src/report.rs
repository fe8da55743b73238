//! Display-ready view of a pipeline result.
//!
//! Timestamps are rendered as `%Y-%m-%d %H:%M:%S` (UTC) so the JSON can be fed
//! straight to a chart without further parsing.

use chrono::{DateTime, Utc};
use quotecast_core::fx::Conversion;
use quotecast_core::indicators::IndicatorSet;
use quotecast_core::PipelineResult;
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarRow {
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub timestamp: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub ticker: String,
    pub currency: String,
    pub data: Vec<BarRow>,
    pub indicators: IndicatorSet,
    pub predictions: Vec<PredictionRow>,
    pub conversion: Conversion,
    pub last_updated: String,
}

impl From<&PipelineResult> for ForecastReport {
    fn from(result: &PipelineResult) -> Self {
        Self {
            ticker: result.ticker.clone(),
            currency: result.series.currency().to_string(),
            data: result
                .series
                .bars()
                .iter()
                .map(|bar| BarRow {
                    timestamp: format_timestamp(&bar.timestamp),
                    open: bar.open,
                    high: bar.high,
                    low: bar.low,
                    close: bar.close,
                    volume: bar.volume,
                })
                .collect(),
            indicators: result.indicators.clone(),
            predictions: result
                .forecast
                .points
                .iter()
                .map(|p| PredictionRow {
                    timestamp: format_timestamp(&p.timestamp),
                    price: p.price,
                })
                .collect(),
            conversion: result.conversion.clone(),
            last_updated: format_timestamp(&result.last_updated),
        }
    }
}

impl ForecastReport {
    /// One-paragraph terminal summary.
    pub fn summary(&self) -> String {
        let last = self.data.last();
        let mut out = format!(
            "{} ({}): {} bars",
            self.ticker,
            self.currency,
            self.data.len()
        );
        if let Some(bar) = last {
            out.push_str(&format!(", last close {:.2} at {}", bar.close, bar.timestamp));
        }
        match (self.predictions.first(), self.predictions.last()) {
            (Some(first), Some(end)) => out.push_str(&format!(
                "\n  forecast {:.2} at {} .. {:.2} at {}",
                first.price, first.timestamp, end.price, end.timestamp
            )),
            _ => out.push_str("\n  no forecast (too few bars)"),
        }
        for (name, values) in self.indicators.iter() {
            if let Some(value) = values.last().copied().flatten() {
                out.push_str(&format!("\n  {name}: {value:.2}"));
            }
        }
        if let Some(rate) = self.conversion.rate() {
            out.push_str(&format!(
                "\n  converted at {:.4} ({:?})",
                rate.rate, rate.provenance
            ));
        }
        out.push_str(&format!("\n  updated {}", self.last_updated));
        out
    }
}
