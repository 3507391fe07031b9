//! Read-only registry of valid ticker symbols and company aliases
//!
//! Loaded once from a snapshot file, then shared behind an `Arc` by every
//! worker. Lookups are exact and case-insensitive; there is no fuzzy
//! matching and no refresh during a run.

use std::collections::HashMap;
use std::path::Path;

use signal_core::{SignalError, SignalResult, TickerEntry};
use tracing::{debug, info, instrument};

/// Legal-form words dropped to derive a short company alias
const CORPORATE_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "ltd",
    "limited",
    "plc",
    "llc",
    "lp",
    "holdings",
    "group",
    "sa",
    "ag",
    "nv",
];

#[derive(Debug, Clone, Default)]
pub struct TickerRegistry {
    entries: HashMap<String, TickerEntry>,
    /// Aliases listed explicitly in the snapshot
    explicit_aliases: HashMap<String, String>,
    /// Aliases derived from company names
    name_aliases: HashMap<String, String>,
}

impl TickerRegistry {
    /// Load a snapshot file
    ///
    /// A missing, unreadable or empty snapshot is `RegistryUnavailable`.
    #[instrument]
    pub fn load(path: &Path) -> SignalResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SignalError::registry_unavailable(format!("{}: {}", path.display(), e))
        })?;
        let registry = Self::from_snapshot_str(&text).map_err(|e| match e {
            SignalError::RegistryUnavailable(msg) => {
                SignalError::registry_unavailable(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        info!(
            path = %path.display(),
            symbols = registry.len(),
            aliases = registry.alias_count(),
            "Loaded ticker registry"
        );
        Ok(registry)
    }

    /// Build a registry from snapshot text, one entry per line
    pub fn from_snapshot_str(text: &str) -> SignalResult<Self> {
        Self::from_entries(text.lines().filter_map(TickerEntry::from_snapshot_line))
    }

    pub fn from_entries<I>(entries: I) -> SignalResult<Self>
    where
        I: IntoIterator<Item = TickerEntry>,
    {
        let mut by_symbol: HashMap<String, TickerEntry> = HashMap::new();
        for entry in entries {
            if entry.symbol.is_empty() {
                continue;
            }
            match by_symbol.get_mut(&entry.symbol) {
                Some(existing) => merge_entry(existing, entry),
                None => {
                    by_symbol.insert(entry.symbol.clone(), entry);
                }
            }
        }

        if by_symbol.is_empty() {
            return Err(SignalError::registry_unavailable("snapshot contains no symbols"));
        }

        let mut explicit = AliasIndex::default();
        let mut derived = AliasIndex::default();
        for entry in by_symbol.values() {
            for alias in &entry.known_aliases {
                explicit.add(normalize_alias(alias), &entry.symbol);
            }
            if let Some(name) = &entry.company_name {
                let full = normalize_alias(name);
                let short = strip_corporate_suffix(&full);
                derived.add(full, &entry.symbol);
                derived.add(short, &entry.symbol);
            }
        }

        Ok(Self {
            entries: by_symbol,
            explicit_aliases: explicit.finish(),
            name_aliases: derived.finish(),
        })
    }

    /// Whether `symbol` is a listed ticker
    pub fn is_valid(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    pub fn get(&self, symbol: &str) -> Option<&TickerEntry> {
        self.entries.get(&symbol.trim().to_uppercase())
    }

    /// Look up a company by name or alias
    ///
    /// Explicit snapshot aliases win over names derived from company names.
    /// Aliases shared by several symbols resolve to nothing.
    pub fn resolve_alias(&self, name: &str) -> Option<&TickerEntry> {
        let key = normalize_alias(name);
        if key.is_empty() {
            return None;
        }
        self.explicit_aliases
            .get(&key)
            .or_else(|| self.name_aliases.get(&key))
            .and_then(|symbol| self.entries.get(symbol))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn alias_count(&self) -> usize {
        self.explicit_aliases.len() + self.name_aliases.len()
    }
}

/// Later lines fill in what earlier lines left out
fn merge_entry(existing: &mut TickerEntry, other: TickerEntry) {
    if existing.company_name.is_none() {
        existing.company_name = other.company_name;
    }
    if existing.exchange.is_none() {
        existing.exchange = other.exchange;
    }
    existing.known_aliases.extend(other.known_aliases);
}

/// Collects alias -> symbol pairs and drops aliases claimed by two symbols
#[derive(Default)]
struct AliasIndex {
    map: HashMap<String, Option<String>>,
}

impl AliasIndex {
    fn add(&mut self, alias: String, symbol: &str) {
        if alias.is_empty() {
            return;
        }
        self.map
            .entry(alias)
            .and_modify(|current| {
                if current.as_deref() != Some(symbol) {
                    *current = None;
                }
            })
            .or_insert_with(|| Some(symbol.to_string()));
    }

    fn finish(self) -> HashMap<String, String> {
        let total = self.map.len();
        let unique: HashMap<String, String> = self
            .map
            .into_iter()
            .filter_map(|(alias, symbol)| symbol.map(|s| (alias, s)))
            .collect();
        if unique.len() < total {
            debug!(dropped = total - unique.len(), "Dropped ambiguous aliases");
        }
        unique
    }
}

/// Lower-case, collapse whitespace and trim trailing punctuation
pub fn normalize_alias(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(|c: char| c == '.' || c == ',' || c.is_whitespace())
        .to_string()
}

/// "apple inc" -> "apple", "acme holdings corp" -> "acme"
fn strip_corporate_suffix(normalized: &str) -> String {
    let mut name = normalized.to_string();
    loop {
        let stripped = name.rsplit_once(' ').and_then(|(head, last)| {
            CORPORATE_SUFFIXES
                .contains(&last)
                .then(|| head.trim_end_matches(|c: char| c == ',' || c.is_whitespace()))
        });
        match stripped {
            Some(head) if !head.is_empty() => name = head.to_string(),
            _ => return name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = "\
ACME|Acme Corp|NYSE
aapl|Apple Inc.|NASDAQ|Apple Computer
MSFT|Microsoft Corporation|NASDAQ
GOOGL|Alphabet Inc.|NASDAQ|Google
GOOG|Alphabet Inc.|NASDAQ

TSLA
";

    fn registry() -> TickerRegistry {
        TickerRegistry::from_snapshot_str(SNAPSHOT).unwrap()
    }

    #[test]
    fn test_symbols_are_case_insensitive() {
        let registry = registry();
        assert_eq!(registry.len(), 6);
        assert!(registry.is_valid("AAPL"));
        assert!(registry.is_valid("aapl"));
        assert!(registry.is_valid(" tsla "));
        assert!(!registry.is_valid("GROUP"));
    }

    #[test]
    fn test_alias_resolution() {
        let registry = registry();
        let symbol = |name: &str| registry.resolve_alias(name).map(|e| e.symbol.clone());

        assert_eq!(symbol("Acme Corp"), Some("ACME".to_string()));
        assert_eq!(symbol("ACME CORP."), Some("ACME".to_string()));
        assert_eq!(symbol("Acme"), Some("ACME".to_string()));
        assert_eq!(symbol("Apple Computer"), Some("AAPL".to_string()));
        assert_eq!(symbol("apple"), Some("AAPL".to_string()));
        assert_eq!(symbol("Microsoft"), Some("MSFT".to_string()));
        assert_eq!(symbol("Acme Industries"), None);
        assert_eq!(symbol("  "), None);
    }

    #[test]
    fn test_shared_names_are_ambiguous_unless_aliased() {
        let registry = registry();
        assert!(registry.resolve_alias("Alphabet").is_none());
        assert_eq!(registry.resolve_alias("Google").unwrap().symbol, "GOOGL");
    }

    #[test]
    fn test_empty_snapshot_is_unavailable() {
        let err = TickerRegistry::from_snapshot_str("\n  \n").unwrap_err();
        assert!(matches!(err, SignalError::RegistryUnavailable(_)));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = TickerRegistry::load(Path::new("/nonexistent/all_tickers.txt")).unwrap_err();
        assert!(matches!(err, SignalError::RegistryUnavailable(_)));
        assert!(err.is_fatal_to_run());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("signal-registry-{}.txt", std::process::id()));
        std::fs::write(&path, "AAPL\nMSFT\n").unwrap();

        let registry = TickerRegistry::load(&path).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.is_valid("msft"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_suffix_stripping() {
        assert_eq!(strip_corporate_suffix("meta platforms, inc"), "meta platforms");
        assert_eq!(strip_corporate_suffix("acme holdings corp"), "acme");
        assert_eq!(strip_corporate_suffix("group"), "group");
        assert_eq!(normalize_alias("  Apple   Inc. "), "apple inc");
    }
}
