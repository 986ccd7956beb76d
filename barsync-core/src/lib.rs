//! barsync core — incremental end-of-day bar sync into a flat CSV file.
//!
//! This crate contains the whole pipeline:
//! - Domain types (daily bars and their (date, symbol) key)
//! - Provider trait and the Yahoo Finance chart provider
//! - Sequential, paced fetcher with per-symbol failure isolation
//! - Key-unique bar table and the "existing row wins" merge
//! - CSV store with atomic replace and a state marker sidecar
//! - Ticker list source and TOML configuration

pub mod config;
pub mod data;
pub mod domain;
pub mod sync;

pub use config::{ConfigError, SyncConfig};
pub use sync::{plan_range, run_sync, SyncError, SyncMode, SyncReport};
