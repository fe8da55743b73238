//! Raw bar acquisition and cleaning.
//!
//! Providers return uncleaned frames; [`SeriesCleaner`] is the single place
//! where a frame becomes a validated [`crate::domain::BarSeries`].

pub mod circuit_breaker;
pub mod clean;
pub mod ingest;
pub mod provider;
pub mod schema;
pub mod synthetic;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use clean::{CleanStats, SeriesCleaner, DEFAULT_MIN_ROWS};
pub use ingest::DataIngestor;
pub use provider::{DataError, DataSource, FetchResult, QuoteProvider};
pub use schema::{BarSchema, SchemaError};
pub use synthetic::SyntheticProvider;
pub use yahoo::YahooProvider;
