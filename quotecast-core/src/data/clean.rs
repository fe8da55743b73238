//! SeriesCleaner: raw bar frame in, validated BarSeries out.
//!
//! Steps, in order:
//! 1. resolve the schema (flattening layered column labels)
//! 2. coerce the timestamp and the five numeric fields; anything that does
//!    not coerce becomes missing
//! 3. drop rows with any missing value, then rows with non-positive prices
//! 4. order by timestamp, keeping the first of duplicated timestamps
//! 5. enforce the minimum row count

use super::schema::{BarSchema, ResolvedSchema, SchemaError};
use crate::domain::{Bar, BarSeries, Currency};
use crate::error::PipelineError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;

pub const DEFAULT_MIN_ROWS: usize = 5;

/// Integer timestamps below this magnitude are read as epoch seconds,
/// anything larger as epoch milliseconds. 1e11 seconds is year 5138.
const EPOCH_SECONDS_LIMIT: i64 = 100_000_000_000;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];

/// Row accounting for a single clean pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub input_rows: usize,
    pub missing: usize,
    pub invalid: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone)]
pub struct SeriesCleaner {
    min_rows: usize,
}

impl Default for SeriesCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_ROWS)
    }
}

impl SeriesCleaner {
    /// # Panics
    ///
    /// Panics if `min_rows` is zero. Use [`try_new`](Self::try_new) for
    /// values read from configuration.
    pub fn new(min_rows: usize) -> Self {
        assert!(min_rows >= 1, "min_rows must be >= 1");
        Self { min_rows }
    }

    pub fn try_new(min_rows: usize) -> Result<Self, PipelineError> {
        if min_rows == 0 {
            return Err(PipelineError::Config("min_rows must be >= 1".into()));
        }
        Ok(Self { min_rows })
    }

    pub fn min_rows(&self) -> usize {
        self.min_rows
    }

    /// Clean `frame` into a series for `symbol`, tagged with `currency`.
    ///
    /// Fails with `InsufficientData` when fewer than `min_rows` bars survive;
    /// no partial series is returned.
    pub fn clean(
        &self,
        symbol: &str,
        currency: Currency,
        frame: &DataFrame,
    ) -> Result<BarSeries, PipelineError> {
        let (bars, stats) = self.clean_bars(frame)?;
        log::debug!(
            "{symbol}: {} raw rows, {} missing, {} invalid, {} duplicate timestamps",
            stats.input_rows,
            stats.missing,
            stats.invalid,
            stats.duplicates
        );

        if bars.len() < self.min_rows {
            log::warn!(
                "{symbol}: only {} usable rows (need {}); market may be closed",
                bars.len(),
                self.min_rows
            );
            return Err(PipelineError::InsufficientData {
                symbol: symbol.to_string(),
                rows: bars.len(),
                required: self.min_rows,
            });
        }

        Ok(BarSeries::new(symbol, currency, bars)?)
    }

    /// Coerce, filter and order the frame's rows. No length check.
    pub fn clean_bars(&self, frame: &DataFrame) -> Result<(Vec<Bar>, CleanStats), PipelineError> {
        let schema = BarSchema::resolve(frame)?;
        let columns = coerce_columns(frame, &schema)?;

        let mut stats = CleanStats {
            input_rows: frame.height(),
            ..CleanStats::default()
        };
        let mut bars = Vec::with_capacity(frame.height());

        for i in 0..frame.height() {
            let row = (
                columns.timestamps[i],
                columns.opens[i],
                columns.highs[i],
                columns.lows[i],
                columns.closes[i],
                columns.volumes[i],
            );
            let (Some(timestamp), Some(open), Some(high), Some(low), Some(close), Some(volume)) =
                row
            else {
                stats.missing += 1;
                continue;
            };

            let bar = Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume: volume.round() as u64,
            };
            if !bar.has_valid_prices() || volume < 0.0 {
                stats.invalid += 1;
                continue;
            }
            bars.push(bar);
        }

        // Stable sort keeps input order among equal timestamps, so dedup
        // retains the first occurrence.
        bars.sort_by_key(|b| b.timestamp);
        let before = bars.len();
        bars.dedup_by_key(|b| b.timestamp);
        stats.duplicates = before - bars.len();

        Ok((bars, stats))
    }
}

struct CoercedColumns {
    timestamps: Vec<Option<DateTime<Utc>>>,
    opens: Vec<Option<f64>>,
    highs: Vec<Option<f64>>,
    lows: Vec<Option<f64>>,
    closes: Vec<Option<f64>>,
    volumes: Vec<Option<f64>>,
}

fn coerce_columns(frame: &DataFrame, schema: &ResolvedSchema) -> Result<CoercedColumns, PipelineError> {
    let volumes = match &schema.volume {
        Some(name) => coerce_f64(frame.column(name)?)?,
        None => vec![Some(0.0); frame.height()],
    };
    Ok(CoercedColumns {
        timestamps: coerce_timestamps(frame.column(&schema.timestamp)?)?,
        opens: coerce_f64(frame.column(&schema.open)?)?,
        highs: coerce_f64(frame.column(&schema.high)?)?,
        lows: coerce_f64(frame.column(&schema.low)?)?,
        closes: coerce_f64(frame.column(&schema.close)?)?,
        volumes,
    })
}

/// Non-strict cast to f64. Unparseable strings become null; NaN and
/// infinities are treated as missing too.
fn coerce_f64(column: &Column) -> PolarsResult<Vec<Option<f64>>> {
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

fn coerce_timestamps(column: &Column) -> Result<Vec<Option<DateTime<Utc>>>, PipelineError> {
    match column.dtype() {
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let physical = column.as_materialized_series().to_physical_repr();
            Ok(physical
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|raw| from_time_unit(raw, unit)))
                .collect())
        }
        DataType::Date => {
            let physical = column.as_materialized_series().to_physical_repr();
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
            Ok(physical
                .i32()?
                .into_iter()
                .map(|v| {
                    v.and_then(|days| epoch.checked_add_signed(chrono::Duration::days(days.into())))
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|dt| dt.and_utc())
                })
                .collect())
        }
        DataType::String => Ok(column
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_timestamp))
            .collect()),
        dtype if dtype.is_integer() => {
            let cast = column.cast(&DataType::Int64)?;
            Ok(cast
                .i64()?
                .into_iter()
                .map(|v| v.and_then(from_epoch_number))
                .collect())
        }
        dtype => Err(SchemaError::UnsupportedType {
            column: column.name().to_string(),
            dtype: dtype.to_string(),
        }
        .into()),
    }
}

fn from_time_unit(raw: i64, unit: TimeUnit) -> Option<DateTime<Utc>> {
    match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(raw),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(raw),
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(raw)),
    }
}

fn from_epoch_number(raw: i64) -> Option<DateTime<Utc>> {
    if raw.abs() < EPOCH_SECONDS_LIMIT {
        DateTime::from_timestamp(raw, 0)
    } else {
        DateTime::from_timestamp_millis(raw)
    }
}

/// Parse the textual timestamp forms seen in provider exports. Naive values
/// are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{Duration, TimeZone};

    fn minute_millis(n: usize) -> Vec<i64> {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
        (0..n)
            .map(|i| (start + Duration::minutes(i as i64)).timestamp_millis())
            .collect()
    }

    fn frame_with_closes(closes: &[Option<f64>]) -> DataFrame {
        let n = closes.len();
        let ts = Column::new("Datetime".into(), minute_millis(n))
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        let prices: Vec<Option<f64>> = closes.to_vec();
        DataFrame::new(vec![
            ts,
            Column::new("Open".into(), prices.clone()),
            Column::new("High".into(), prices.iter().map(|p| p.map(|v| v + 1.0)).collect::<Vec<_>>()),
            Column::new("Low".into(), prices.iter().map(|p| p.map(|v| v - 1.0)).collect::<Vec<_>>()),
            Column::new("Close".into(), prices),
            Column::new("Volume".into(), vec![100u64; n]),
        ])
        .unwrap()
    }

    #[test]
    fn clean_happy_path() {
        let closes: Vec<Option<f64>> = (0..10).map(|i| Some(100.0 + i as f64)).collect();
        let series = SeriesCleaner::default()
            .clean("TCS.NS", Currency::inr(), &frame_with_closes(&closes))
            .unwrap();

        assert_eq!(series.len(), 10);
        assert_eq!(series.symbol(), "TCS.NS");
        assert_eq!(series.bars()[9].close, 109.0);
        assert_eq!(series.bars()[0].volume, 100);
    }

    #[test]
    fn drops_rows_with_missing_values() {
        let closes = vec![Some(10.0), None, Some(12.0), Some(f64::NAN), Some(14.0), Some(15.0), Some(16.0)];
        let (bars, stats) = SeriesCleaner::default()
            .clean_bars(&frame_with_closes(&closes))
            .unwrap();

        assert_eq!(bars.len(), 5);
        assert_eq!(stats.missing, 2);
        assert!(bars.iter().all(|b| !b.is_void()));
    }

    #[test]
    fn insufficient_rows_is_typed_error() {
        let closes = vec![Some(10.0), Some(11.0), Some(12.0)];
        let err = SeriesCleaner::default()
            .clean("AAPL", Currency::usd(), &frame_with_closes(&closes))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert!(matches!(
            err,
            PipelineError::InsufficientData { rows: 3, required: 5, .. }
        ));
    }

    #[test]
    fn coerces_string_columns() {
        let df = df!(
            "timestamp" => &["2024-03-04 09:15:00", "2024-03-04 09:16:00", "not a time", "2024-03-04 09:18:00"],
            "open" => &["100.5", "101", "102", "abc"],
            "high" => &["101", "102", "103", "104"],
            "low" => &["99", "100", "101", "102"],
            "close" => &["100", "101.5", "102", "103"],
            "volume" => &["10", "20", "30", "40"],
        )
        .unwrap();

        let (bars, stats) = SeriesCleaner::new(1).clean_bars(&df).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(stats.missing, 2);
        assert_eq!(bars[0].open, 100.5);
        assert_eq!(bars[1].close, 101.5);
        assert_eq!(bars[1].volume, 20);
    }

    #[test]
    fn flattens_layered_columns() {
        let df = df!(
            "Datetime" => &minute_millis(5),
            "Close|AAPL" => &[1.0, 2.0, 3.0, 4.0, 5.0],
            "High|AAPL" => &[2.0, 3.0, 4.0, 5.0, 6.0],
            "Low|AAPL" => &[0.5, 1.5, 2.5, 3.5, 4.5],
            "Open|AAPL" => &[1.0, 2.0, 3.0, 4.0, 5.0],
            "Volume|AAPL" => &[10.0, 10.0, 10.0, 10.0, 10.0],
        )
        .unwrap();

        let series = SeriesCleaner::default()
            .clean("AAPL", Currency::usd(), &df)
            .unwrap();
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn missing_volume_reads_as_zero() {
        let df = df!(
            "date" => &["2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05", "2024-01-08"],
            "open" => &[1.0, 2.0, 3.0, 4.0, 5.0],
            "high" => &[1.0, 2.0, 3.0, 4.0, 5.0],
            "low" => &[1.0, 2.0, 3.0, 4.0, 5.0],
            "close" => &[1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();

        let series = SeriesCleaner::default()
            .clean("SPY", Currency::usd(), &df)
            .unwrap();
        assert!(series.bars().iter().all(|b| b.volume == 0));
    }

    #[test]
    fn sorts_and_dedupes_timestamps() {
        let df = df!(
            "timestamp" => &[1_700_000_120i64, 1_700_000_000, 1_700_000_060, 1_700_000_060],
            "open" => &[3.0, 1.0, 2.0, 9.0],
            "high" => &[3.0, 1.0, 2.0, 9.0],
            "low" => &[3.0, 1.0, 2.0, 9.0],
            "close" => &[3.0, 1.0, 2.0, 9.0],
        )
        .unwrap();

        let (bars, stats) = SeriesCleaner::new(1).clean_bars(&df).unwrap();
        assert_eq!(stats.duplicates, 1);
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn drops_non_positive_prices() {
        let closes = vec![Some(10.0), Some(-1.0), Some(0.0), Some(11.0)];
        let (bars, stats) = SeriesCleaner::new(1)
            .clean_bars(&frame_with_closes(&closes))
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(stats.invalid, 2);
    }

    #[test]
    fn missing_close_column_is_schema_error() {
        let df = df!(
            "timestamp" => &[1i64],
            "open" => &[1.0],
            "high" => &[1.0],
            "low" => &[1.0],
        )
        .unwrap();

        let err = SeriesCleaner::default()
            .clean("AAPL", Currency::usd(), &df)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn parses_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-04 14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-04T14:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-04 20:00:00+05:30"), Some(expected));
        assert_eq!(parse_timestamp("garbage"), None);
    }

    #[test]
    fn zero_min_rows_is_a_config_error() {
        let err = SeriesCleaner::try_new(0).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert_eq!(SeriesCleaner::try_new(3).unwrap().min_rows(), 3);
    }

    #[test]
    #[should_panic(expected = "min_rows must be >= 1")]
    fn new_panics_on_zero_min_rows() {
        SeriesCleaner::new(0);
    }
}
