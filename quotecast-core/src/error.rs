//! Pipeline error taxonomy.
//!
//! `NoData` and `InsufficientData` are expected outcomes (bad symbol, market
//! closed, window too narrow) that callers branch on. Everything else is an
//! unexpected processing failure and is reported opaquely.

use crate::data::schema::SchemaError;
use crate::domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no data returned for '{symbol}'")]
    NoData { symbol: String },

    #[error(
        "insufficient data for '{symbol}': {rows} usable rows, need at least {required} \
         (market may be closed or the lookback window is too narrow)"
    )]
    InsufficientData {
        symbol: String,
        rows: usize,
        required: usize,
    },

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("processing failed: {0}")]
    Processing(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification for the boundary layer (status codes, exit codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoData,
    InsufficientData,
    Unexpected,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoData { .. } => ErrorKind::NoData,
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::Schema(_) | Self::Processing(_) | Self::Config(_) => ErrorKind::Unexpected,
        }
    }

    /// True for the expected, caller-recoverable outcomes.
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Unexpected
    }
}

impl From<DomainError> for PipelineError {
    fn from(e: DomainError) -> Self {
        Self::Processing(e.to_string())
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(e: polars::error::PolarsError) -> Self {
        Self::Processing(e.to_string())
    }
}
