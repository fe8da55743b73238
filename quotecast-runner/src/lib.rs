//! Quotecast Runner: sessions, raw-frame caching, refresh loop, export.
//!
//! This crate builds on `quotecast-core` to provide:
//! - TOML configuration (`quotecast.toml`)
//! - A TTL cache of raw provider frames with get-or-fetch semantics
//! - Sessions that fetch and run the pipeline, one ticker or many in parallel
//! - A periodic refresh loop
//! - JSON report and CSV export

pub mod cache;
pub mod config;
pub mod export;
pub mod report;
pub mod session;
pub mod watch;

pub use cache::{FrameCache, FrameKey};
pub use config::{ConfigError, FetchConfig, QuotecastConfig};
pub use export::{export_json, export_predictions_csv, export_series_csv, save_artifacts};
pub use report::ForecastReport;
pub use session::{ForecastRequest, Session, SessionError};
pub use watch::{watch, WatchOptions, WatchTick};
