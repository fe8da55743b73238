//! CSV ingest for raw bar frames saved to disk.
//!
//! Accepts plain single-header files as well as the three-row layered header
//! that multi-index downloads write:
//!
//! ```text
//! Price,Close,High,Low,Open,Volume
//! Ticker,AAPL,AAPL,AAPL,AAPL,AAPL
//! Datetime,,,,,
//! 2024-03-04 14:30:00+00:00,175.2,175.5,174.8,175.0,1200
//! ```
//!
//! The layered header is folded into `Close|AAPL` style labels so the schema
//! resolver sees the same shape a live provider returns.

use super::provider::{DataError, DataSource, FetchResult};
use super::schema::LEVEL_SEPARATOR;
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;

/// Reads raw bar frames from CSV files.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataIngestor;

impl DataIngestor {
    pub fn new() -> Self {
        Self
    }

    /// Read a CSV file of `symbol` bars, tagged as a CSV import.
    pub fn load(&self, symbol: &str, path: &Path) -> Result<FetchResult, DataError> {
        let frame = self.read_csv(path)?;
        log::debug!("{symbol}: read {} raw rows from {}", frame.height(), path.display());
        Ok(FetchResult {
            symbol: symbol.to_string(),
            frame,
            source: DataSource::CsvImport,
        })
    }

    /// Read a CSV file into a raw, uncleaned frame.
    pub fn read_csv(&self, path: &Path) -> Result<DataFrame, DataError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DataError::IngestFailed(format!("{}: {e}", path.display())))?;
        self.parse_csv(&text)
            .map_err(|e| DataError::IngestFailed(format!("{}: {e}", path.display())))
    }

    /// Parse CSV text into a raw frame. Every column is read as written;
    /// type coercion happens in the cleaner.
    pub fn parse_csv(&self, text: &str) -> Result<DataFrame, PolarsError> {
        let normalized = fold_layered_header(text);
        CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(normalized.into_bytes()))
            .finish()
    }
}

/// Rewrite a `Price / Ticker / Datetime` header block into one header row.
/// Text without that block is returned unchanged.
fn fold_layered_header(text: &str) -> String {
    let mut lines = text.lines();
    let (Some(fields), Some(tickers), Some(index)) = (lines.next(), lines.next(), lines.next())
    else {
        return text.to_string();
    };

    let fields: Vec<&str> = fields.split(',').map(str::trim).collect();
    let tickers: Vec<&str> = tickers.split(',').map(str::trim).collect();
    let index: Vec<&str> = index.split(',').map(str::trim).collect();

    let is_layered = fields.first().is_some_and(|f| f.eq_ignore_ascii_case("price"))
        && tickers.first().is_some_and(|t| t.eq_ignore_ascii_case("ticker"))
        && index.iter().skip(1).all(|cell| cell.is_empty());
    if !is_layered {
        return text.to_string();
    }

    let index_name = index.first().copied().filter(|s| !s.is_empty()).unwrap_or("Datetime");
    let mut header = vec![index_name.to_string()];
    for (i, field) in fields.iter().enumerate().skip(1) {
        match tickers.get(i).filter(|t| !t.is_empty()) {
            Some(ticker) => header.push(format!("{field}{LEVEL_SEPARATOR}{ticker}")),
            None => header.push((*field).to_string()),
        }
    }

    let mut out = header.join(",");
    for line in lines {
        out.push('\n');
        out.push_str(line);
    }
    out.push('\n');
    out
}
