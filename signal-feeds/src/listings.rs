//! NASDAQ Trader symbol directory client
//!
//! Downloads the two pipe-delimited directories that together cover US
//! listed equities and writes them out as a ticker snapshot:
//! - `nasdaqlisted.txt`: NASDAQ listings, symbol in the `Symbol` column
//! - `otherlisted.txt`: NYSE, NYSE American, Arca, Cboe and IEX listings,
//!   symbol in the `ACT Symbol` column with a one-letter exchange code

use std::collections::BTreeMap;
use std::path::Path;

use reqwest::Client;
use signal_core::TickerEntry;
use tracing::{debug, info, instrument, warn};

use crate::error::FeedError;

const DEFAULT_BASE_URL: &str = "https://www.nasdaqtrader.com/dynamic/SymDir";
const NASDAQ_LISTED: &str = "nasdaqlisted.txt";
const OTHER_LISTED: &str = "otherlisted.txt";
const FOOTER_PREFIX: &str = "File Creation Time";

/// Share-class noise trimmed from security names
const NAME_SUFFIXES: &[&str] = &[
    " Common Stock",
    " Ordinary Shares",
    " American Depositary Shares",
    " Common Shares",
];

pub struct ListingsClient {
    client: Client,
    base_url: String,
}

impl Default for ListingsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingsClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[instrument(skip(self))]
    async fn fetch_directory(&self, file: &str) -> Result<String, FeedError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, file))
            .send()
            .await
            .map_err(|e| FeedError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .text()
            .await
            .map_err(|e| FeedError::RequestFailed(e.to_string()))
    }

    /// Download both directories and merge them, sorted by symbol
    ///
    /// A directory that fails to download is skipped with a warning; the
    /// call only fails when neither produced any listing.
    pub async fn fetch_all(&self) -> Result<Vec<TickerEntry>, FeedError> {
        let mut merged: BTreeMap<String, TickerEntry> = BTreeMap::new();
        let mut last_error = None;

        for (file, exchange) in [(NASDAQ_LISTED, Some("NASDAQ")), (OTHER_LISTED, None)] {
            let parsed = match self.fetch_directory(file).await {
                Ok(text) => parse_directory(&text, exchange),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(entries) => {
                    info!(file, count = entries.len(), "Loaded symbol directory");
                    for entry in entries {
                        merged.entry(entry.symbol.clone()).or_insert(entry);
                    }
                }
                Err(e) => {
                    warn!(file, error = %e, "Skipping symbol directory");
                    last_error = Some(e);
                }
            }
        }

        match (merged.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            (true, None) => Err(FeedError::ParseError("symbol directories were empty".into())),
            _ => Ok(merged.into_values().collect()),
        }
    }

    /// Download the directories and write a fresh snapshot to `path`
    pub async fn refresh_snapshot(&self, path: &Path) -> Result<usize, FeedError> {
        let entries = self.fetch_all().await?;
        write_snapshot(path, &entries).await?;
        info!(path = %path.display(), count = entries.len(), "Cached ticker snapshot");
        Ok(entries.len())
    }
}

/// Parse one pipe-delimited directory file
///
/// `default_exchange` names the exchange for files without an `Exchange`
/// column. Test issues and the trailing creation-time footer are skipped.
pub fn parse_directory(
    text: &str,
    default_exchange: Option<&str>,
) -> Result<Vec<TickerEntry>, FeedError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| FeedError::ParseError("empty directory file".into()))?
        .split('|')
        .map(str::trim)
        .collect();

    let column = |name: &str| header.iter().position(|h| *h == name);
    let symbol_col = column("Symbol")
        .or_else(|| column("ACT Symbol"))
        .ok_or_else(|| FeedError::ParseError("no symbol column in header".into()))?;
    let name_col = column("Security Name");
    let exchange_col = column("Exchange");
    let test_col = column("Test Issue");

    let mut entries = Vec::new();
    for line in lines {
        if line.starts_with(FOOTER_PREFIX) {
            continue;
        }
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        let field = |idx: Option<usize>| idx.and_then(|i| fields.get(i).copied());

        let Some(symbol) = field(Some(symbol_col)).filter(|s| !s.is_empty()) else {
            continue;
        };
        if field(test_col) == Some("Y") {
            continue;
        }

        let mut entry = TickerEntry::new(symbol);
        if let Some(name) = field(name_col).map(company_name).filter(|n| !n.is_empty()) {
            entry = entry.with_company(name);
        }
        let exchange = match field(exchange_col) {
            Some(code) => exchange_name(code),
            None => default_exchange,
        };
        if let Some(exchange) = exchange {
            entry = entry.with_exchange(exchange);
        }
        entries.push(entry);
    }

    debug!(count = entries.len(), "Parsed symbol directory");
    Ok(entries)
}

fn exchange_name(code: &str) -> Option<&'static str> {
    match code {
        "Q" => Some("NASDAQ"),
        "N" => Some("NYSE"),
        "A" => Some("NYSE American"),
        "P" => Some("NYSE Arca"),
        "Z" => Some("Cboe BZX"),
        "V" => Some("IEX"),
        _ => None,
    }
}

/// "Apple Inc. - Common Stock" -> "Apple Inc."
fn company_name(security_name: &str) -> String {
    let mut name = security_name
        .split(" - ")
        .next()
        .unwrap_or(security_name)
        .trim();
    for suffix in NAME_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.trim_end();
        }
    }
    name.replace('|', " ")
}

/// Render entries as snapshot lines
pub fn render_snapshot(entries: &[TickerEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.to_snapshot_line());
        out.push('\n');
    }
    out
}

/// Write entries to `path`, creating parent directories as needed
pub async fn write_snapshot(path: &Path, entries: &[TickerEntry]) -> Result<(), FeedError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, render_snapshot(entries)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const NASDAQ_FIXTURE: &str = "\
Symbol|Security Name|Market Category|Test Issue|Financial Status|Round Lot Size|ETF|NextShares
AAPL|Apple Inc. - Common Stock|Q|N|N|100|N|N
ZAZZT|Tick Pilot Test Stock Class A Common Stock|G|Y|N|100|N|N
MSFT|Microsoft Corporation - Common Stock|Q|N|N|100|N|N
File Creation Time: 1019202600:01|||||||
";

    const OTHER_FIXTURE: &str = "\
ACT Symbol|Security Name|Exchange|CQS Symbol|ETF|Round Lot Size|Test Issue|NASDAQ Symbol
IBM|International Business Machines Corporation Common Stock|N|IBM|N|100|N|IBM
SPY|SPDR S&P 500 ETF Trust|P|SPY|Y|100|N|SPY
AAPL|Duplicate Listing|N|AAPL|N|100|N|AAPL
File Creation Time: 1019202600:01|||||||
";

    #[test]
    fn test_parse_nasdaq_directory() {
        let entries = parse_directory(NASDAQ_FIXTURE, Some("NASDAQ")).unwrap();
        let symbols: Vec<_> = entries.iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(entries[0].company_name.as_deref(), Some("Apple Inc."));
        assert_eq!(entries[1].exchange.as_deref(), Some("NASDAQ"));
    }

    #[test]
    fn test_parse_other_directory_maps_exchange_codes() {
        let entries = parse_directory(OTHER_FIXTURE, None).unwrap();
        assert_eq!(entries[0].symbol, "IBM");
        assert_eq!(
            entries[0].company_name.as_deref(),
            Some("International Business Machines Corporation")
        );
        assert_eq!(entries[0].exchange.as_deref(), Some("NYSE"));
        assert_eq!(entries[1].exchange.as_deref(), Some("NYSE Arca"));
    }

    #[test]
    fn test_parse_rejects_headerless_file() {
        assert!(parse_directory("", None).is_err());
        assert!(parse_directory("Foo|Bar\n1|2\n", None).is_err());
    }

    #[tokio::test]
    async fn test_refresh_snapshot_merges_directories() {
        let server = MockServer::start();
        let nasdaq = server.mock(|when, then| {
            when.method(GET).path("/nasdaqlisted.txt");
            then.status(200).body(NASDAQ_FIXTURE);
        });
        let other = server.mock(|when, then| {
            when.method(GET).path("/otherlisted.txt");
            then.status(200).body(OTHER_FIXTURE);
        });

        let path = std::env::temp_dir().join(format!(
            "signal-feeds-snapshot-{}/all_tickers.txt",
            std::process::id()
        ));
        let client = ListingsClient::new().with_base_url(server.base_url());
        let count = client.refresh_snapshot(&path).await.unwrap();

        nasdaq.assert();
        other.assert();
        assert_eq!(count, 4);

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines[0], "AAPL|Apple Inc.|NASDAQ");
        assert_eq!(lines[1], "IBM|International Business Machines Corporation|NYSE");
        assert_eq!(lines.len(), 4);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_one_failed_directory_is_tolerated() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/nasdaqlisted.txt");
            then.status(503).body("maintenance");
        });
        server.mock(|when, then| {
            when.method(GET).path("/otherlisted.txt");
            then.status(200).body(OTHER_FIXTURE);
        });

        let client = ListingsClient::new().with_base_url(server.base_url());
        let entries = client.fetch_all().await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].company_name.as_deref(), Some("Duplicate Listing"));
    }

    #[tokio::test]
    async fn test_all_directories_failing_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(500);
        });

        let client = ListingsClient::new().with_base_url(server.base_url());
        let err = client.fetch_all().await.unwrap_err();
        assert!(matches!(err, FeedError::ApiError { status: 500, .. }));
    }
}
