//! Fetching, merging, and persisting daily bars

pub mod fetcher;
pub mod provider;
pub mod store;
pub mod table;
pub mod tickers;
pub mod yahoo;

pub use fetcher::{fetch_bars, FetchOutcome};
pub use provider::{DataError, DataProvider, FetchProgress, FetchRange, LogProgress, RawBar};
pub use store::{CsvStore, StoreMeta, StoredTable, SyncState};
pub use table::{merge, BarTable, MergeResult};
pub use tickers::TickerList;
pub use yahoo::YahooProvider;
