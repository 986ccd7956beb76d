//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over the market-data source so the
//! fetcher can be driven by Yahoo Finance in production and by a scripted
//! provider in tests.

use crate::domain::DailyBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Raw daily bar from a data provider, before split/dividend adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: Option<f64>,
}

impl RawBar {
    /// Restate the bar in adjusted terms and tag it with its symbol.
    ///
    /// `ratio = adj_close / close` scales open, high and low; close becomes
    /// the adjusted close. Volume is taken as-is. Without a usable adjusted
    /// close the raw prices are kept.
    pub fn into_adjusted(self, symbol: &str) -> DailyBar {
        let ratio = match self.adj_close {
            Some(adj) if adj.is_finite() && self.close.is_finite() && self.close > 0.0 => {
                adj / self.close
            }
            _ => 1.0,
        };

        DailyBar {
            date: self.date,
            symbol: symbol.to_string(),
            open: self.open * ratio,
            high: self.high * ratio,
            low: self.low * ratio,
            close: self.close * ratio,
            volume: self.volume,
        }
    }

    /// True when any price field is missing (NaN).
    pub fn has_missing_price(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }
}

/// What window of history to request for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchRange {
    /// Everything the provider has, from listing date to today.
    Max,
    /// `start` inclusive, `end` exclusive.
    Window { start: NaiveDate, end: NaiveDate },
}

impl FetchRange {
    /// Whether a bar dated `date` belongs to this range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            FetchRange::Max => true,
            FetchRange::Window { start, end } => start <= date && date < end,
        }
    }
}

impl std::fmt::Display for FetchRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchRange::Max => write!(f, "max"),
            FetchRange::Window { start, end } => write!(f, "[{start}, {end})"),
        }
    }
}

/// Structured error types for data operations.
///
/// Provider variants are recorded per symbol and never abort a run;
/// file and state variants are fatal.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status} for {symbol}")]
    Http { symbol: String, status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("provider returned no bars for {symbol}")]
    EmptyResponse { symbol: String },

    #[error("ticker source error: {0}")]
    TickerSource(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("state mismatch: {0}")]
    StateMismatch(String),
}

/// Trait for data providers.
///
/// Implementations handle the specifics of talking to one source. The
/// fetcher sits above this trait and owns pacing and failure isolation.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for a symbol over the given range.
    fn fetch(&self, symbol: &str, range: FetchRange) -> Result<Vec<RawBar>, DataError>;
}

/// Progress callback for multi-symbol fetches.
pub trait FetchProgress {
    /// Called when starting to fetch a symbol.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol fetch completes; `Ok` carries the row count.
    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: Result<usize, &DataError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that writes to the `tracing` log.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        info!("[{}/{}] fetching {symbol}", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: Result<usize, &DataError>,
    ) {
        match result {
            Ok(rows) => info!(symbol, rows, "fetched"),
            Err(e) => warn!(symbol, error = %e, "skipping symbol"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        info!("fetch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}
