//! Export: JSON report and CSV tables for a pipeline result.
//!
//! - **JSON**: the display report (`ForecastReport`)
//! - **CSV**: the cleaned, normalized series (with indicator columns) and the
//!   predictions, for spreadsheets and plotting tools

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quotecast_core::domain::{BarSeries, Forecast};
use quotecast_core::indicators::IndicatorSet;
use quotecast_core::PipelineResult;

use crate::report::{format_timestamp, ForecastReport};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(result: &PipelineResult) -> Result<String> {
    serde_json::to_string_pretty(&ForecastReport::from(result))
        .context("failed to serialize forecast report to JSON")
}

pub fn import_json(json: &str) -> Result<ForecastReport> {
    serde_json::from_str(json).context("failed to deserialize forecast report from JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Series as CSV: timestamp, open, high, low, close, volume, then one column
/// per indicator (empty until the window fills).
pub fn export_series_csv(series: &BarSeries, indicators: &IndicatorSet) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let names: Vec<&str> = indicators.names().collect();
    let mut header = vec!["timestamp", "open", "high", "low", "close", "volume"];
    header.extend(names.iter().copied());
    wtr.write_record(&header)?;

    for (i, bar) in series.bars().iter().enumerate() {
        let mut row = vec![
            format_timestamp(&bar.timestamp),
            format!("{:.6}", bar.open),
            format!("{:.6}", bar.high),
            format!("{:.6}", bar.low),
            format!("{:.6}", bar.close),
            bar.volume.to_string(),
        ];
        row.extend(
            names
                .iter()
                .map(|name| indicators.get(name, i).map(|v| format!("{v:.6}")).unwrap_or_default()),
        );
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_predictions_csv(forecast: &Forecast) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["step", "timestamp", "price"])?;
    for (k, point) in forecast.points.iter().enumerate() {
        wtr.write_record([
            &(k + 1).to_string(),
            &format_timestamp(&point.timestamp),
            &format!("{:.6}", point.price),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `report.json`, `series.csv`, and `predictions.csv` under
/// `{output_dir}/{ticker}_{timestamp}/` and return that directory.
pub fn save_artifacts(result: &PipelineResult, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        result.ticker.replace(['/', '\\', '=', '^'], "_"),
        result.last_updated.format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(result)?)?;
    std::fs::write(
        run_dir.join("series.csv"),
        export_series_csv(&result.series, &result.indicators)?,
    )?;
    std::fs::write(
        run_dir.join("predictions.csv"),
        export_predictions_csv(&result.forecast)?,
    )?;

    Ok(run_dir)
}

/// Load the report from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<ForecastReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
