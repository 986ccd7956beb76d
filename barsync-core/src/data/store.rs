//! CSV store for the persisted bar table.
//!
//! Layout: `{output}` holds the rows, `{output}.meta.json` is the state
//! marker written after every successful persist.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Date normalisation on load (datetime strings collapse to calendar dates)
//! - Required-column check on load; extra columns such as `Adj Close` are ignored
//! - Metadata sidecar (hash, date range, symbols, source)

use super::provider::DataError;
use super::table::BarTable;
use crate::domain::DailyBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Columns every persisted file must carry, in output order.
pub const REQUIRED_COLUMNS: [&str; 7] = ["Date", "Symbol", "Open", "High", "Low", "Close", "Volume"];

/// Metadata sidecar for the persisted table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub symbols: Vec<String>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub row_count: usize,
    pub data_hash: String,
    pub source: String,
    pub written_at: chrono::NaiveDateTime,
}

/// Whether a previous run has persisted data.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    /// No data file and no marker: the next run is a full-history load.
    Uninitialized,
    /// A data file exists. `meta` is `None` for a file written without a marker.
    Initialized { meta: Option<StoreMeta> },
}

/// Table loaded from disk together with its latest date.
#[derive(Debug, Clone)]
pub struct StoredTable {
    pub last_date: Option<NaiveDate>,
    pub table: BarTable,
}

/// Row layout on disk (read side). Volume is read as a float because
/// dataframe tools often write integer columns as `1000.0`. Numeric cells
/// are optional: dataframe tools write missing values as empty cells.
#[derive(Debug, Deserialize)]
struct StoredRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Symbol")]
    symbol: String,
    #[serde(rename = "Open")]
    open: Option<f64>,
    #[serde(rename = "High")]
    high: Option<f64>,
    #[serde(rename = "Low")]
    low: Option<f64>,
    #[serde(rename = "Close")]
    close: Option<f64>,
    #[serde(rename = "Volume")]
    volume: Option<f64>,
}

/// Row layout on disk (write side).
#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Symbol")]
    symbol: &'a str,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume")]
    volume: u64,
}

/// The CSV store.
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the marker sidecar: `{output}.meta.json`.
    pub fn meta_path(&self) -> PathBuf {
        sibling(&self.path, "meta.json")
    }

    /// Work out whether a previous run left data behind.
    pub fn detect_state(&self) -> Result<SyncState, DataError> {
        let has_data = self.path.is_file();
        let has_meta = self.meta_path().is_file();

        match (has_data, has_meta) {
            (false, false) => Ok(SyncState::Uninitialized),
            (false, true) => Err(DataError::StateMismatch(format!(
                "marker {} exists but data file {} is missing",
                self.meta_path().display(),
                self.path.display()
            ))),
            (true, true) => match self.get_meta() {
                Some(meta) => Ok(SyncState::Initialized { meta: Some(meta) }),
                None => {
                    warn!(
                        marker = %self.meta_path().display(),
                        "unreadable state marker, it will be rewritten on the next persist"
                    );
                    Ok(SyncState::Initialized { meta: None })
                }
            },
            (true, false) => {
                warn!(
                    file = %self.path.display(),
                    "adopting data file without a state marker"
                );
                Ok(SyncState::Initialized { meta: None })
            }
        }
    }

    /// Read the marker sidecar, if present and well formed.
    pub fn get_meta(&self) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Whether the data file on disk is byte-for-byte the one `meta` describes.
    pub fn matches_marker(&self, meta: &StoreMeta) -> bool {
        fs::read(&self.path)
            .is_ok_and(|bytes| blake3::hash(&bytes).to_hex().to_string() == meta.data_hash)
    }

    /// Load the persisted table. `Ok(None)` when the data file does not exist.
    pub fn load(&self) -> Result<Option<StoredTable>, DataError> {
        if !self.path.is_file() {
            return Ok(None);
        }

        let table = read_table(&self.path)?;
        let last_date = table.last_date();
        info!(
            file = %self.path.display(),
            rows = table.len(),
            last_date = ?last_date,
            "loaded stored table"
        );

        Ok(Some(StoredTable { last_date, table }))
    }

    /// Replace the data file with `table` and refresh the marker.
    ///
    /// Both files are written to `.tmp` siblings and renamed into place, so
    /// an interrupted write leaves the previous files intact.
    pub fn write(&self, table: &BarTable, source: &str) -> Result<StoreMeta, DataError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| DataError::Store(format!("failed to create dir: {e}")))?;
        }

        let bytes = table_to_csv(table)?;
        write_atomic(&self.path, &bytes)?;

        let meta = StoreMeta {
            symbols: table.symbols(),
            first_date: table.first_date(),
            last_date: table.last_date(),
            row_count: table.len(),
            data_hash: blake3::hash(&bytes).to_hex().to_string(),
            source: source.to_string(),
            written_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| DataError::Store(format!("meta serialization: {e}")))?;
        write_atomic(&self.meta_path(), &meta_json)?;

        info!(file = %self.path.display(), rows = meta.row_count, "persisted table");
        Ok(meta)
    }
}

// ── CSV helpers ─────────────────────────────────────────────────────

/// Parse a stored date cell into a calendar date.
///
/// Accepts `YYYY-MM-DD` and any datetime that starts with it
/// (`YYYY-MM-DD HH:MM:SS`, RFC 3339, with or without an offset).
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    let (date_part, _time) = raw.split_once(['T', ' '])?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn read_table(path: &Path) -> Result<BarTable, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::Csv(format!("open {}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| DataError::Csv(format!("read header: {e}")))?
        .clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(DataError::Schema(format!(
                "{} is missing column '{column}'",
                path.display()
            )));
        }
    }

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<StoredRow>().enumerate() {
        // Header is line 1
        let line = i + 2;
        let row = record.map_err(|e| DataError::Csv(format!("line {line}: {e}")))?;
        match stored_row_to_bar(row, line)? {
            Some(bar) => rows.push(bar),
            None => warn!(file = %path.display(), line, "skipping row with missing values"),
        }
    }

    let total = rows.len();
    let table = BarTable::from_rows(rows);
    if table.len() != total {
        warn!(
            file = %path.display(),
            dropped = total - table.len(),
            "stored table had duplicate (date, symbol) rows; kept the first of each"
        );
    }
    Ok(table)
}

/// Convert one stored row. `Ok(None)` for a row with a missing or
/// non-finite price or volume.
fn stored_row_to_bar(row: StoredRow, line: usize) -> Result<Option<DailyBar>, DataError> {
    let date = parse_calendar_date(&row.date)
        .ok_or_else(|| DataError::Schema(format!("line {line}: invalid date '{}'", row.date)))?;

    let symbol = row.symbol.trim();
    if symbol.is_empty() {
        return Err(DataError::Schema(format!("line {line}: empty symbol")));
    }

    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
    let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
        finite(row.open),
        finite(row.high),
        finite(row.low),
        finite(row.close),
        finite(row.volume),
    ) else {
        return Ok(None);
    };

    if volume < 0.0 {
        return Err(DataError::Schema(format!(
            "line {line}: invalid volume {volume}"
        )));
    }

    Ok(Some(DailyBar {
        date,
        symbol: symbol.to_string(),
        open,
        high,
        low,
        close,
        // Fractional volumes are truncated
        volume: volume.trunc() as u64,
    }))
}

fn table_to_csv(table: &BarTable) -> Result<Vec<u8>, DataError> {
    // Header written explicitly so an empty table still produces one
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);
    wtr.write_record(REQUIRED_COLUMNS)
        .map_err(|e| DataError::Csv(format!("write header: {e}")))?;

    for bar in table.rows() {
        wtr.serialize(OutputRow {
            date: bar.date,
            symbol: &bar.symbol,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        })
        .map_err(|e| DataError::Csv(format!("write row: {e}")))?;
    }

    wtr.into_inner()
        .map_err(|e| DataError::Csv(format!("flush: {e}")))
}

/// Write `bytes` to `path` via a `.tmp` sibling and an atomic rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DataError> {
    let tmp_path = sibling(path, "tmp");

    let result = fs::File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .map_err(|e| DataError::Store(format!("write {}: {e}", tmp_path.display())))
        .and_then(|()| {
            fs::rename(&tmp_path, path)
                .map_err(|e| DataError::Store(format!("atomic rename failed: {e}")))
        });

    if result.is_err() {
        // Clean up temp file on failure
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// `{path}.{suffix}` next to `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
