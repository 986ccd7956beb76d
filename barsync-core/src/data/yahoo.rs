//! Yahoo Finance data provider.
//!
//! Fetches daily bars from Yahoo's v8 chart API, one blocking request per
//! call. There is no retry here: a failed request surfaces as a `DataError`
//! and the fetcher records it against the symbol.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::{DataError, DataProvider, FetchRange, RawBar};
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new() -> Result<Self, DataError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Provider pointed at a different chart endpoint (mirrors, proxies).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build the chart API URL for a symbol and range.
    ///
    /// `period2` is the exclusive end: midnight UTC of the `end` date.
    fn chart_url(&self, symbol: &str, range: FetchRange) -> String {
        let window = match range {
            FetchRange::Max => "range=max".to_string(),
            FetchRange::Window { start, end } => {
                format!("period1={}&period2={}", midnight_utc(start), midnight_utc(end))
            }
        };
        format!(
            "{}/{symbol}?{window}&interval=1d&includeAdjustedClose=true",
            self.base_url
        )
    }

    /// Parse the chart API response into RawBars.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<RawBar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    DataError::SymbolNotFound {
                        symbol: symbol.to_string(),
                    }
                } else {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                DataError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // A listed symbol with no trades in the window comes back without timestamps.
        let Some(timestamps) = data.timestamp else {
            return Err(DataError::EmptyResponse {
                symbol: symbol.to_string(),
            });
        };

        let gmtoffset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            // Exchange-local calendar date of the session
            let date = chrono::DateTime::from_timestamp(ts + gmtoffset, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten());

            // Skip bars where all OHLCV are None (holidays/non-trading days)
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            bars.push(RawBar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
                adj_close,
            });
        }

        if bars.is_empty() {
            return Err(DataError::EmptyResponse {
                symbol: symbol.to_string(),
            });
        }

        Ok(bars)
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, range: FetchRange) -> Result<Vec<RawBar>, DataError> {
        let url = self.chart_url(symbol, range);
        debug!(%url, "requesting chart");

        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_timeout() {
                DataError::NetworkUnreachable(format!("timed out fetching {symbol}: {e}"))
            } else {
                DataError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DataError::AuthenticationRequired(
                "Yahoo Finance requires authentication".into(),
            ));
        }

        if !status.is_success() {
            return Err(DataError::Http {
                symbol: symbol.to_string(),
                status: status.as_u16(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        Self::parse_response(symbol, chart)
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
}
