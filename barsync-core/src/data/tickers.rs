//! Ticker source — the list of symbols to sync.
//!
//! Symbols come from a CSV table with a `Symbol` column (other columns,
//! such as company name or sector, are ignored).

use super::provider::DataError;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

const SYMBOL_COLUMN: &str = "Symbol";

/// Ordered, de-duplicated list of ticker symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerList {
    symbols: Vec<String>,
}

impl TickerList {
    /// Load tickers from a CSV file.
    pub fn from_csv(path: &Path) -> Result<Self, DataError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| DataError::TickerSource(format!("open {}: {e}", path.display())))?;
        Self::from_reader(reader)
            .map_err(|e| DataError::TickerSource(format!("{}: {e}", path.display())))
    }

    /// Parse tickers from CSV text.
    pub fn from_csv_str(content: &str) -> Result<Self, DataError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        Self::from_reader(reader).map_err(DataError::TickerSource)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, String> {
        let column = reader
            .headers()
            .map_err(|e| format!("read header: {e}"))?
            .iter()
            .position(|h| h == SYMBOL_COLUMN)
            .ok_or_else(|| format!("missing '{SYMBOL_COLUMN}' column"))?;

        let mut values = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| format!("read row: {e}"))?;
            if let Some(value) = record.get(column) {
                values.push(value.to_string());
            }
        }

        let list = Self::from_symbols(values);
        if list.is_empty() {
            return Err("no symbols listed".into());
        }
        Ok(list)
    }

    /// Build a list from raw values: trims, skips blanks, keeps the first of duplicates.
    pub fn from_symbols<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut symbols = Vec::new();

        for value in values {
            let symbol = value.as_ref().trim();
            if symbol.is_empty() {
                continue;
            }
            if seen.insert(symbol.to_string()) {
                symbols.push(symbol.to_string());
            } else {
                warn!(symbol, "duplicate ticker ignored");
            }
        }

        Self { symbols }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
