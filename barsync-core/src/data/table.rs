//! Keyed bar table and the merge rule.
//!
//! A `BarTable` holds at most one row per (date, symbol). Construction
//! keeps the first row seen for a key and drops later ones, so merging is
//! "existing rows, then fresh rows, then dedupe".

use crate::domain::{BarKey, DailyBar};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

/// Ordered, key-unique collection of daily bars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarTable {
    rows: Vec<DailyBar>,
    index: HashMap<BarKey, usize>,
}

impl BarTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rows in order, keeping the first row per key.
    pub fn from_rows(rows: impl IntoIterator<Item = DailyBar>) -> Self {
        let mut table = Self::new();
        table.extend(rows);
        table
    }

    /// Append a row unless its key is already present.
    ///
    /// Returns `true` if the row was added.
    pub fn insert(&mut self, bar: DailyBar) -> bool {
        let key = bar.key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.rows.len());
        self.rows.push(bar);
        true
    }

    /// Append rows in order; returns how many were new keys.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = DailyBar>) -> usize {
        let mut added = 0;
        for bar in rows {
            if self.insert(bar) {
                added += 1;
            }
        }
        added
    }

    pub fn get(&self, key: &BarKey) -> Option<&DailyBar> {
        self.index.get(key).map(|&i| &self.rows[i])
    }

    pub fn rows(&self) -> &[DailyBar] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Latest date present in the table.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|b| b.date).max()
    }

    /// Earliest date present in the table.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|b| b.date).min()
    }

    /// Distinct symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|b| b.symbol.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(String::from)
            .collect()
    }
}

/// Result of merging fresh bars into an existing table.
#[derive(Debug)]
pub struct MergeResult {
    pub table: BarTable,
    /// Fresh rows whose key was not already present.
    pub added: usize,
}

/// Merge freshly fetched bars into the existing table.
///
/// Existing rows win on (date, symbol) conflicts and keep their position;
/// new keys are appended in fetch order. `existing = None` means there was
/// no prior run.
pub fn merge(existing: Option<BarTable>, fresh: impl IntoIterator<Item = DailyBar>) -> MergeResult {
    let mut table = existing.unwrap_or_default();
    let added = table.extend(fresh);
    MergeResult { table, added }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, symbol: &str, close: f64) -> DailyBar {
        DailyBar {
            date: NaiveDate::from_ymd_opt(2023, 1, day).unwrap(),
            symbol: symbol.into(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn from_rows_keeps_first_duplicate() {
        let table = BarTable::from_rows(vec![
            bar(3, "AAA", 10.0),
            bar(3, "AAA", 99.0),
            bar(4, "AAA", 11.0),
        ]);

        assert_eq!(table.len(), 2);
        let key = BarKey::new(NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(), "AAA");
        assert_eq!(table.get(&key).unwrap().close, 10.0);
    }

    #[test]
    fn same_date_different_symbol_is_not_duplicate() {
        let table = BarTable::from_rows(vec![bar(3, "AAA", 10.0), bar(3, "BBB", 20.0)]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.symbols(), vec!["AAA".to_string(), "BBB".to_string()]);
    }

    #[test]
    fn merge_prefers_existing_rows() {
        let existing = BarTable::from_rows(vec![bar(3, "AAA", 10.5)]);
        let result = merge(Some(existing), vec![bar(3, "AAA", 12.0), bar(4, "AAA", 11.0)]);

        assert_eq!(result.added, 1);
        assert_eq!(result.table.len(), 2);
        assert_eq!(result.table.rows()[0].close, 10.5);
        assert_eq!(result.table.rows()[1].close, 11.0);
    }

    #[test]
    fn merge_without_prior_table_is_dedup_of_fresh() {
        let result = merge(None, vec![bar(3, "AAA", 1.0), bar(3, "AAA", 2.0)]);
        assert_eq!(result.added, 1);
        assert_eq!(result.table.rows()[0].close, 1.0);
    }

    #[test]
    fn merge_with_itself_is_identity() {
        let table = BarTable::from_rows(vec![bar(3, "AAA", 1.0), bar(4, "BBB", 2.0)]);
        let result = merge(Some(table.clone()), table.rows().to_vec());
        assert_eq!(result.added, 0);
        assert_eq!(result.table, table);
    }

    #[test]
    fn date_bounds() {
        let table = BarTable::from_rows(vec![bar(5, "AAA", 1.0), bar(3, "BBB", 1.0)]);
        assert_eq!(table.first_date(), NaiveDate::from_ymd_opt(2023, 1, 3));
        assert_eq!(table.last_date(), NaiveDate::from_ymd_opt(2023, 1, 5));
        assert_eq!(BarTable::new().last_date(), None);
    }
}
