//! barsync CLI — keep a CSV of daily bars up to date.
//!
//! Commands:
//! - `sync` (default) — fetch missing bars for every listed ticker and merge them in
//! - `status` — report what the output file and its state marker contain

use anyhow::{Context, Result};
use barsync_core::data::{CsvStore, LogProgress, SyncState, YahooProvider};
use barsync_core::{run_sync, SyncConfig, SyncReport};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "barsync",
    about = "barsync — incremental end-of-day bar download into a CSV file",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    sync: SyncArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch missing bars and merge them into the output file.
    Sync(SyncArgs),
    /// Report the output file's rows, date range, and state marker.
    Status(SyncArgs),
}

#[derive(Args)]
struct SyncArgs {
    /// TOML config file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV file with a `Symbol` column. Defaults to ./S&P500Tickers.csv.
    #[arg(long)]
    tickers: Option<PathBuf>,

    /// Output CSV file. Defaults to ./OHLC_yfinance_data.csv.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Delay between provider requests in milliseconds. Defaults to 500.
    #[arg(long)]
    pacing_ms: Option<u64>,

    /// Fetch window start (YYYY-MM-DD, inclusive). Requires --end.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Fetch window end (YYYY-MM-DD, exclusive). Requires --start.
    #[arg(long)]
    end: Option<NaiveDate>,
}

impl SyncArgs {
    /// Config file (if any) with flags layered on top.
    fn resolve(self) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => SyncConfig::default(),
        };

        if let Some(tickers) = self.tickers {
            config.tickers_path = tickers;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(pacing_ms) = self.pacing_ms {
            config.pacing_ms = pacing_ms;
        }
        if self.start.is_some() || self.end.is_some() {
            config.start = self.start;
            config.end = self.end;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Commands::Sync(args)) => run_sync_cmd(args),
        Some(Commands::Status(args)) => run_status(args),
        None => run_sync_cmd(cli.sync),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_sync_cmd(args: SyncArgs) -> Result<ExitCode> {
    let config = args.resolve()?;
    let provider = YahooProvider::new()?;
    let today = chrono::Local::now().date_naive();

    let report = run_sync(&config, &provider, &LogProgress, today)
        .with_context(|| format!("syncing into {}", config.output_path.display()))?;

    print_report(&report, &config);

    if report.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn run_status(args: SyncArgs) -> Result<ExitCode> {
    let config = args.resolve()?;
    let store = CsvStore::new(&config.output_path);

    match store.detect_state()? {
        SyncState::Uninitialized => {
            println!(
                "Not initialized: {} does not exist",
                config.output_path.display()
            );
        }
        SyncState::Initialized { meta: Some(meta) } => {
            println!("File:        {}", config.output_path.display());
            println!("Rows:        {}", meta.row_count);
            println!("Symbols:     {}", meta.symbols.len());
            println!(
                "Date range:  {} to {}",
                format_date(meta.first_date),
                format_date(meta.last_date)
            );
            println!("Source:      {}", meta.source);
            println!("Written at:  {}", meta.written_at.format("%Y-%m-%d %H:%M:%S"));
            println!("Data hash:   {}", meta.data_hash);
        }
        SyncState::Initialized { meta: None } => {
            let stored = store.load()?.context("output file disappeared")?;
            println!("File:        {}", config.output_path.display());
            println!("Rows:        {}", stored.table.len());
            println!("Symbols:     {}", stored.table.symbols().len());
            println!(
                "Date range:  {} to {}",
                format_date(stored.table.first_date()),
                format_date(stored.last_date)
            );
            println!("Marker:      (none, written on next sync)");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
}

fn print_report(report: &SyncReport, config: &SyncConfig) {
    println!();
    println!("=== Sync Result ===");
    println!("Output:         {}", config.output_path.display());
    println!("Mode:           {:?}", report.mode);
    println!("Range:          {}", report.range);
    println!(
        "Symbols:        {} ({} failed)",
        report.symbols,
        report.failures.len()
    );
    println!("Fetched rows:   {}", report.fetched_rows);
    println!("New rows:       {}", report.added_rows);
    println!("Total rows:     {}", report.total_rows);
    if report.written.is_none() {
        println!("File unchanged (no new rows)");
    }
    for (symbol, err) in &report.failures {
        println!("FAILED: {symbol}: {err}");
    }
    println!();
}
