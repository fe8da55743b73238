//! `quotecast.toml` configuration.
//!
//! Every field is optional; a missing file, section, or key takes the
//! built-in default. Validation runs once at load time.

use quotecast_core::domain::Interval;
use quotecast_core::fx::FxConfig;
use quotecast_core::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "quotecast.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// `[fetch]` section: what to ask the quote provider for and how long to keep it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub lookback_days: u32,
    pub interval: Interval,
    /// Raw frames are reused for this long before refetching.
    pub cache_ttl_secs: u64,
    /// Watch-loop period.
    pub refresh_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            interval: Interval::OneMinute,
            cache_ttl_secs: 60,
            refresh_secs: 60,
        }
    }
}

impl FetchConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback_days == 0 {
            return Err(ConfigError::Invalid("fetch.lookback_days must be >= 1".into()));
        }
        if self.refresh_secs == 0 {
            return Err(ConfigError::Invalid("fetch.refresh_secs must be >= 1".into()));
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotecastConfig {
    pub pipeline: PipelineConfig,
    pub fx: FxConfig,
    pub fetch: FetchConfig,
}

impl QuotecastConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load `path` if given, else `./quotecast.toml` if present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("using {DEFAULT_CONFIG_FILE}");
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.fx
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.fetch.validate()
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
