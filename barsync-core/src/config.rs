//! Sync configuration.
//!
//! Every field has a default, so an empty TOML file (or no file at all) is a
//! valid configuration. CLI flags are layered on top by the binary.

use crate::data::provider::FetchRange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TICKERS_PATH: &str = "S&P500Tickers.csv";
pub const DEFAULT_OUTPUT_PATH: &str = "OHLC_yfinance_data.csv";
pub const DEFAULT_PACING_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("start and end must be given together")]
    HalfOpenRange,

    #[error("start {start} must be before end {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },
}

/// Inputs of one sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// CSV file with a `Symbol` column.
    pub tickers_path: PathBuf,

    /// CSV file the merged table is written to.
    pub output_path: PathBuf,

    /// Delay between consecutive provider requests, in milliseconds.
    pub pacing_ms: u64,

    /// Explicit fetch window start (inclusive). Overrides state detection.
    pub start: Option<NaiveDate>,

    /// Explicit fetch window end (exclusive).
    pub end: Option<NaiveDate>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tickers_path: PathBuf::from(DEFAULT_TICKERS_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            pacing_ms: DEFAULT_PACING_MS,
            start: None,
            end: None,
        }
    }
}

impl SyncConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.range_override().map(|_| ())
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// The configured fetch window, if any.
    pub fn range_override(&self) -> Result<Option<FetchRange>, ConfigError> {
        match (self.start, self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) if start < end => Ok(Some(FetchRange::Window { start, end })),
            (Some(start), Some(end)) => Err(ConfigError::EmptyRange { start, end }),
            _ => Err(ConfigError::HalfOpenRange),
        }
    }
}
