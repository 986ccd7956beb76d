//! Bar — one trading day's prices for one symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Adjusted OHLCV bar for a single symbol on a single day.
///
/// Prices are already restated for splits and dividends by the fetcher,
/// so there is no separate adjusted-close field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl DailyBar {
    /// The composite key the persisted table is unique on.
    pub fn key(&self) -> BarKey {
        BarKey {
            date: self.date,
            symbol: self.symbol.clone(),
        }
    }
}

/// (date, symbol) identity of a bar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BarKey {
    pub date: NaiveDate,
    pub symbol: String,
}

impl BarKey {
    pub fn new(date: NaiveDate, symbol: impl Into<String>) -> Self {
        Self {
            date,
            symbol: symbol.into(),
        }
    }
}
