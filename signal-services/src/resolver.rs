//! Maps free-text company mentions onto registry symbols

use std::collections::HashSet;
use std::sync::Arc;

use signal_core::{CompanyMention, ResolvedTicker, TickerEntry};
use tracing::trace;

use crate::registry::TickerRegistry;

/// Longest string still treated as a bare ticker
const MAX_SYMBOL_LEN: usize = 10;

#[derive(Debug, Clone)]
pub struct TickerResolver {
    registry: Arc<TickerRegistry>,
}

impl TickerResolver {
    pub fn new(registry: Arc<TickerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TickerRegistry {
        &self.registry
    }

    /// Resolve mentions in order, dropping unknown ones and repeated symbols
    ///
    /// Each mention is tried as:
    /// 1. a bare symbol, when written like one (`AAPL`, `$AAPL`)
    /// 2. a company name or alias known to the registry
    /// 3. the ticker(s) the model suggested alongside it
    ///
    /// A symbol reached by several mentions appears once, at its first
    /// position. Every occurrence carries the same registry metadata.
    pub fn resolve(&self, mentions: &[CompanyMention]) -> Vec<ResolvedTicker> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        for mention in mentions {
            let entries = self.resolve_mention(mention);
            if entries.is_empty() {
                trace!(mention = %mention.mention_text, "Unresolved mention dropped");
            }
            for entry in entries {
                if seen.insert(entry.symbol.clone()) {
                    resolved.push(entry.to_resolved());
                }
            }
        }
        resolved
    }

    fn resolve_mention(&self, mention: &CompanyMention) -> Vec<&TickerEntry> {
        if let Some(entry) = as_symbol(&mention.mention_text).and_then(|s| self.registry.get(s)) {
            return vec![entry];
        }

        if let Some(entry) = self.registry.resolve_alias(&mention.mention_text) {
            return vec![entry];
        }

        mention
            .ticker_candidate
            .as_deref()
            .map(|candidates| {
                candidates
                    .split([',', '/', ';'])
                    .filter_map(|c| self.registry.get(strip_exchange_prefix(c)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Text written the way tickers are: upper-case or `$`-prefixed, no spaces
fn as_symbol(text: &str) -> Option<&str> {
    let text = text.trim();
    let (body, dollar) = match text.strip_prefix('$') {
        Some(rest) => (rest, true),
        None => (text, false),
    };

    let shaped = !body.is_empty()
        && body.len() <= MAX_SYMBOL_LEN
        && !body.chars().any(char::is_whitespace)
        && body.chars().any(|c| c.is_ascii_alphabetic());
    let upper = !body.chars().any(|c| c.is_lowercase());

    (shaped && (dollar || upper)).then_some(body)
}

/// "NASDAQ:AAPL" -> "AAPL", " $msft " -> "msft"
fn strip_exchange_prefix(candidate: &str) -> &str {
    let candidate = candidate.trim();
    let candidate = candidate
        .rsplit_once(':')
        .map(|(_, symbol)| symbol.trim())
        .unwrap_or(candidate);
    candidate.trim_start_matches('$')
}
