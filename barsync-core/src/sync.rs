//! The sync pipeline: load tickers → detect state → fetch → merge → persist.
//!
//! Fatal errors (ticker list, stored table, write) stop the run before the
//! output is touched. Per-symbol fetch failures are collected in the report.

use crate::config::{ConfigError, SyncConfig};
use crate::data::fetcher::fetch_bars;
use crate::data::provider::{DataError, DataProvider, FetchProgress, FetchRange};
use crate::data::store::{CsvStore, StoreMeta, SyncState};
use crate::data::table::merge;
use crate::data::tickers::TickerList;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("no bars fetched for any of {attempted} symbols and no stored table exists")]
    NothingFetched { attempted: usize },
}

/// How the fetch window was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// No prior data: full history per symbol.
    FullLoad,
    /// Prior data: from its last date through today.
    Incremental,
    /// Window taken from configuration.
    Override,
}

/// Outcome of one sync run.
#[derive(Debug)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub range: FetchRange,
    pub symbols: usize,
    pub fetched_rows: usize,
    pub added_rows: usize,
    pub total_rows: usize,
    pub failures: Vec<(String, DataError)>,
    /// Marker of the persisted table; `None` when nothing changed on disk.
    pub written: Option<StoreMeta>,
}

impl SyncReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Pick the fetch window for this run.
///
/// With prior data the window starts at the stored last date (the seam date
/// is fetched again and resolved by the merge) and ends after `today`.
pub fn plan_range(
    override_range: Option<FetchRange>,
    last_date: Option<NaiveDate>,
    today: NaiveDate,
) -> (SyncMode, FetchRange) {
    if let Some(range) = override_range {
        return (SyncMode::Override, range);
    }
    match last_date {
        Some(start) => {
            let end = today.succ_opt().unwrap_or(today);
            // A stored table dated after today still gets a non-empty window
            let end = end.max(start.succ_opt().unwrap_or(start));
            (SyncMode::Incremental, FetchRange::Window { start, end })
        }
        None => (SyncMode::FullLoad, FetchRange::Max),
    }
}

/// Run one sync against `provider`, treating `today` as the current date.
pub fn run_sync(
    config: &SyncConfig,
    provider: &dyn DataProvider,
    progress: &dyn FetchProgress,
    today: NaiveDate,
) -> Result<SyncReport, SyncError> {
    let override_range = config.range_override()?;

    let tickers = TickerList::from_csv(&config.tickers_path)?;
    info!(
        count = tickers.len(),
        file = %config.tickers_path.display(),
        "loaded tickers"
    );

    let store = CsvStore::new(&config.output_path);
    // A file is only left alone when it is exactly what we last wrote
    let (existing, current_on_disk) = match store.detect_state()? {
        SyncState::Uninitialized => (None, false),
        SyncState::Initialized { meta } => {
            let current = meta.as_ref().is_some_and(|m| store.matches_marker(m));
            (store.load()?, current)
        }
    };
    let last_date = existing.as_ref().and_then(|s| s.last_date);

    let (mode, range) = plan_range(override_range, last_date, today);
    info!(?mode, %range, provider = provider.name(), "fetching");

    let outcome = fetch_bars(provider, tickers.symbols(), range, config.pacing(), progress);
    let fetched_rows = outcome.bars.len();

    if existing.is_none() && fetched_rows == 0 {
        return Err(SyncError::NothingFetched {
            attempted: tickers.len(),
        });
    }

    let merged = merge(existing.map(|s| s.table), outcome.bars);
    info!(
        fetched = fetched_rows,
        added = merged.added,
        total = merged.table.len(),
        "merged"
    );

    let written = if current_on_disk && merged.added == 0 {
        info!("no new rows, leaving stored table untouched");
        None
    } else {
        Some(store.write(&merged.table, provider.name())?)
    };

    Ok(SyncReport {
        mode,
        range,
        symbols: tickers.len(),
        fetched_rows,
        added_rows: merged.added,
        total_rows: merged.table.len(),
        failures: outcome.failures,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, day).unwrap()
    }

    #[test]
    fn first_run_requests_max_history() {
        assert_eq!(plan_range(None, None, d(10)), (SyncMode::FullLoad, FetchRange::Max));
    }

    #[test]
    fn incremental_window_covers_seam_through_today() {
        assert_eq!(
            plan_range(None, Some(d(3)), d(4)),
            (
                SyncMode::Incremental,
                FetchRange::Window { start: d(3), end: d(5) }
            )
        );
    }

    #[test]
    fn override_wins_over_stored_state() {
        let window = FetchRange::Window { start: d(1), end: d(2) };
        assert_eq!(
            plan_range(Some(window), Some(d(3)), d(4)),
            (SyncMode::Override, window)
        );
    }

    #[test]
    fn future_last_date_still_yields_valid_window() {
        let (_, range) = plan_range(None, Some(d(20)), d(4));
        assert_eq!(range, FetchRange::Window { start: d(20), end: d(21) });
    }
}
