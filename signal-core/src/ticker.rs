//! Exchange ticker definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One listed security as known to the ticker registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerEntry {
    /// Upper-case ticker symbol (e.g., "AAPL")
    pub symbol: String,
    /// Security name from the exchange directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    /// Listing exchange (e.g., "NASDAQ", "NYSE")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    /// Extra names the company is referred to by
    #[serde(default)]
    pub known_aliases: BTreeSet<String>,
}

impl TickerEntry {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().trim().to_uppercase(),
            company_name: None,
            exchange: None,
            known_aliases: BTreeSet::new(),
        }
    }

    pub fn with_company(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = Some(company_name.into());
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.known_aliases.insert(alias.into());
        self
    }

    /// Parse one snapshot line: `SYMBOL[|Company Name[|EXCHANGE[|alias1;alias2]]]`
    ///
    /// Returns `None` for blank lines and `#` comments.
    pub fn from_snapshot_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let mut fields = line.split('|').map(str::trim);
        let symbol = fields.next().filter(|s| !s.is_empty())?;
        let mut entry = TickerEntry::new(symbol);

        if let Some(name) = fields.next().filter(|s| !s.is_empty()) {
            entry = entry.with_company(name);
        }
        if let Some(exchange) = fields.next().filter(|s| !s.is_empty()) {
            entry = entry.with_exchange(exchange);
        }
        if let Some(aliases) = fields.next() {
            for alias in aliases.split(';').map(str::trim).filter(|a| !a.is_empty()) {
                entry = entry.with_alias(alias);
            }
        }
        Some(entry)
    }

    /// Inverse of [`TickerEntry::from_snapshot_line`], dropping empty trailing columns
    pub fn to_snapshot_line(&self) -> String {
        let aliases = self
            .known_aliases
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";");
        let mut columns = vec![
            self.symbol.as_str(),
            self.company_name.as_deref().unwrap_or(""),
            self.exchange.as_deref().unwrap_or(""),
            aliases.as_str(),
        ];
        while columns.len() > 1 && columns.last().is_some_and(|c| c.is_empty()) {
            columns.pop();
        }
        columns.join("|")
    }

    pub fn to_resolved(&self) -> ResolvedTicker {
        ResolvedTicker {
            symbol: self.symbol.clone(),
            exchange: self.exchange.clone(),
            company_name: self.company_name.clone(),
        }
    }
}

/// A company mention that was matched to a registry symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedTicker {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}
