//! Fetch orchestrator — walks the ticker list one symbol at a time.
//!
//! Each symbol gets exactly one provider request. A fixed pacing delay is
//! slept between consecutive requests. A failing symbol is recorded and
//! skipped; it never aborts the batch.

use super::provider::{DataError, DataProvider, FetchProgress, FetchRange};
use crate::domain::DailyBar;
use std::time::Duration;
use tracing::debug;

/// Fetch bars for every symbol in `symbols` over `range`.
///
/// Results are collected per symbol and concatenated once, in ticker order.
pub fn fetch_bars(
    provider: &dyn DataProvider,
    symbols: &[String],
    range: FetchRange,
    pacing: Duration,
    progress: &dyn FetchProgress,
) -> FetchOutcome {
    let total = symbols.len();
    let mut per_symbol: Vec<Vec<DailyBar>> = Vec::with_capacity(total);
    let mut failures: Vec<(String, DataError)> = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
        if i > 0 && !pacing.is_zero() {
            std::thread::sleep(pacing);
        }

        progress.on_start(symbol, i, total);

        let result = fetch_single(provider, symbol, range);
        progress.on_complete(symbol, i, total, result.as_ref().map(Vec::len));

        match result {
            Ok(bars) => per_symbol.push(bars),
            Err(e) => failures.push((symbol.clone(), e)),
        }
    }

    let succeeded = per_symbol.len();
    progress.on_batch_complete(succeeded, failures.len(), total);

    FetchOutcome {
        total,
        succeeded,
        bars: per_symbol.concat(),
        failures,
    }
}

/// Fetch one symbol: request → keep in-range, priced bars → adjust.
fn fetch_single(
    provider: &dyn DataProvider,
    symbol: &str,
    range: FetchRange,
) -> Result<Vec<DailyBar>, DataError> {
    let raw = provider.fetch(symbol, range)?;
    let received = raw.len();

    let bars: Vec<DailyBar> = raw
        .into_iter()
        .filter(|b| range.contains(b.date) && !b.has_missing_price())
        .map(|b| b.into_adjusted(symbol))
        .collect();

    if bars.len() != received {
        debug!(
            symbol,
            dropped = received - bars.len(),
            "dropped out-of-range or unpriced bars"
        );
    }

    if bars.is_empty() {
        return Err(DataError::EmptyResponse {
            symbol: symbol.to_string(),
        });
    }

    Ok(bars)
}

/// Summary of a batch fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub total: usize,
    pub succeeded: usize,
    /// All fetched bars, grouped by symbol in ticker order.
    pub bars: Vec<DailyBar>,
    pub failures: Vec<(String, DataError)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::RawBar;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, day).unwrap()
    }

    fn raw(date: NaiveDate, close: f64) -> RawBar {
        RawBar {
            date,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100,
            adj_close: Some(close),
        }
    }

    /// Provider that serves canned bars and records every request.
    struct CannedProvider {
        bars: HashMap<String, Vec<RawBar>>,
        calls: Mutex<Vec<(String, FetchRange)>>,
    }

    impl DataProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        fn fetch(&self, symbol: &str, range: FetchRange) -> Result<Vec<RawBar>, DataError> {
            self.calls.lock().unwrap().push((symbol.to_string(), range));
            self.bars
                .get(symbol)
                .cloned()
                .ok_or_else(|| DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                })
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: RefCell<Vec<String>>,
    }

    impl FetchProgress for RecordingProgress {
        fn on_start(&self, symbol: &str, _index: usize, _total: usize) {
            self.events.borrow_mut().push(format!("start {symbol}"));
        }

        fn on_complete(
            &self,
            symbol: &str,
            _index: usize,
            _total: usize,
            result: Result<usize, &DataError>,
        ) {
            let tag = if result.is_ok() { "ok" } else { "fail" };
            self.events.borrow_mut().push(format!("{tag} {symbol}"));
        }

        fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
            self.events
                .borrow_mut()
                .push(format!("done {succeeded}/{failed}/{total}"));
        }
    }

    fn provider() -> CannedProvider {
        let mut bars = HashMap::new();
        bars.insert("AAA".to_string(), vec![raw(d(2), 10.0), raw(d(3), 11.0), raw(d(4), 12.0)]);
        bars.insert("BBB".to_string(), vec![raw(d(3), 20.0), raw(d(5), 21.0)]);
        CannedProvider {
            bars,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn failing_symbol_is_recorded_and_skipped() {
        let provider = provider();
        let progress = RecordingProgress::default();

        let outcome = fetch_bars(
            &provider,
            &symbols(&["AAA", "NOPE", "BBB"]),
            FetchRange::Max,
            Duration::ZERO,
            &progress,
        );

        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, "NOPE");
        assert_eq!(outcome.bars.len(), 5);
        assert_eq!(
            progress.events.borrow().as_slice(),
            [
                "start AAA", "ok AAA", "start NOPE", "fail NOPE", "start BBB", "ok BBB",
                "done 2/1/3"
            ]
        );
    }

    #[test]
    fn bars_are_grouped_in_ticker_order() {
        let provider = provider();
        let outcome = fetch_bars(
            &provider,
            &symbols(&["BBB", "AAA"]),
            FetchRange::Max,
            Duration::ZERO,
            &RecordingProgress::default(),
        );

        let order: Vec<&str> = outcome.bars.iter().map(|b| b.symbol.as_str()).collect();
        assert_eq!(order, ["BBB", "BBB", "AAA", "AAA", "AAA"]);
    }

    #[test]
    fn window_drops_bars_outside_range() {
        let provider = provider();
        let range = FetchRange::Window { start: d(3), end: d(4) };
        let outcome = fetch_bars(
            &provider,
            &symbols(&["AAA"]),
            range,
            Duration::ZERO,
            &RecordingProgress::default(),
        );

        assert_eq!(outcome.bars.len(), 1);
        assert_eq!(outcome.bars[0].date, d(3));
        assert_eq!(provider.calls.lock().unwrap()[0], ("AAA".to_string(), range));
    }

    #[test]
    fn symbol_with_nothing_in_range_counts_as_failure() {
        let provider = provider();
        let outcome = fetch_bars(
            &provider,
            &symbols(&["BBB"]),
            FetchRange::Window { start: d(10), end: d(12) },
            Duration::ZERO,
            &RecordingProgress::default(),
        );

        assert!(outcome.bars.is_empty());
        assert!(matches!(outcome.failures[0].1, DataError::EmptyResponse { .. }));
    }

    #[test]
    fn one_request_per_symbol() {
        let provider = provider();
        fetch_bars(
            &provider,
            &symbols(&["AAA", "BBB"]),
            FetchRange::Max,
            Duration::from_millis(1),
            &RecordingProgress::default(),
        );
        assert_eq!(provider.calls.lock().unwrap().len(), 2);
    }

    /// Provider that only records when each request arrived.
    struct TimedProvider {
        hits: Mutex<Vec<Instant>>,
    }

    impl DataProvider for TimedProvider {
        fn name(&self) -> &str {
            "timed"
        }

        fn fetch(&self, _symbol: &str, _range: FetchRange) -> Result<Vec<RawBar>, DataError> {
            self.hits.lock().unwrap().push(Instant::now());
            Ok(vec![raw(d(3), 10.0)])
        }
    }

    #[test]
    fn pacing_is_slept_only_between_requests() {
        let pacing = Duration::from_millis(50);
        let provider = TimedProvider {
            hits: Mutex::new(Vec::new()),
        };

        let started = Instant::now();
        fetch_bars(
            &provider,
            &symbols(&["AAA", "BBB", "CCC"]),
            FetchRange::Max,
            pacing,
            &RecordingProgress::default(),
        );
        let finished = Instant::now();

        let hits = provider.hits.lock().unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits[0] - started < pacing, "slept before the first request");
        for pair in hits.windows(2) {
            assert!(pair[1] - pair[0] >= pacing, "requests closer than the pacing delay");
        }
        assert!(finished - hits[2] < pacing, "slept after the last request");
    }
}
