//! Raw bar frame schema: column flattening and field resolution.
//!
//! Upstream frames may label columns with a secondary dimension, e.g. the
//! ticker in a multi-symbol download. Two encodings are recognised:
//!
//! - `Close|AAPL` (level separator)
//! - `('Close', 'AAPL')` (tuple label, as written by pandas)
//!
//! Both collapse to their first level (`Close`). Field names are matched
//! case-insensitively.

use polars::prelude::*;
use thiserror::Error;

pub const LEVEL_SEPARATOR: char = '|';

/// The fields SeriesCleaner understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarField {
    Timestamp,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl BarField {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
        }
    }

    /// Map a flattened column label to a field.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "timestamp" | "datetime" | "date" => Some(Self::Timestamp),
            "open" => Some(Self::Open),
            "high" => Some(Self::High),
            "low" => Some(Self::Low),
            "close" => Some(Self::Close),
            "volume" => Some(Self::Volume),
            _ => None,
        }
    }
}

/// Collapse a layered column label to its first level.
pub fn flatten_label(label: &str) -> &str {
    let trimmed = label.trim();
    if let Some(inner) = trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let first = inner.split(',').next().unwrap_or(inner).trim();
        return first.trim_matches(|c| c == '\'' || c == '"');
    }
    match trimmed.split_once(LEVEL_SEPARATOR) {
        Some((first, _)) => first.trim(),
        None => trimmed,
    }
}

/// Column names in a concrete frame, resolved per field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    pub timestamp: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    /// Absent volume is allowed and reads as zero.
    pub volume: Option<String>,
}

/// Expected schema for raw bar frames
pub struct BarSchema;

impl BarSchema {
    /// Resolve which column backs each field. When several columns collapse
    /// onto the same field the first one wins.
    pub fn resolve(df: &DataFrame) -> Result<ResolvedSchema, SchemaError> {
        let mut found: Vec<(BarField, String)> = Vec::new();
        for name in df.get_column_names() {
            let Some(field) = BarField::from_label(flatten_label(name.as_str())) else {
                continue;
            };
            if found.iter().any(|(f, _)| *f == field) {
                log::debug!("ignoring duplicate {} column '{}'", field.name(), name);
                continue;
            }
            found.push((field, name.to_string()));
        }

        let take = |field: BarField| -> Option<String> {
            found
                .iter()
                .find(|(f, _)| *f == field)
                .map(|(_, name)| name.clone())
        };
        let require =
            |field: BarField| take(field).ok_or(SchemaError::MissingColumn(field.name()));

        Ok(ResolvedSchema {
            timestamp: require(BarField::Timestamp)?,
            open: require(BarField::Open)?,
            high: require(BarField::High)?,
            low: require(BarField::Low)?,
            close: require(BarField::Close)?,
            volume: take(BarField::Volume),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),

    #[error("unsupported type {dtype} for column '{column}'")]
    UnsupportedType { column: String, dtype: String },
}
