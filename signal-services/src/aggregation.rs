//! Per-ticker aggregation and the rankings built on top of it
//!
//! Aggregates are always rebuilt from the full record set, so re-filtering
//! at a different confidence threshold is just another call to [`aggregate`].

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use signal_core::{AnalysisRecord, SentimentCounts, TickerAggregate};

/// Group records by symbol, keeping those with `confidence >= min_confidence`
///
/// Contributing records stay in the order they appear in `records`.
pub fn aggregate(
    records: &[Arc<AnalysisRecord>],
    min_confidence: f64,
) -> BTreeMap<String, TickerAggregate> {
    let mut tickers: BTreeMap<String, TickerAggregate> = BTreeMap::new();

    for record in records.iter().filter(|r| r.confidence >= min_confidence) {
        let aggregate = tickers
            .entry(record.symbol().to_string())
            .or_insert_with(|| TickerAggregate {
                symbol: record.symbol().to_string(),
                count: 0,
                sentiment_counts: SentimentCounts::default(),
                mean_confidence: 0.0,
                contributing_records: Vec::new(),
            });
        aggregate.count += 1;
        aggregate.sentiment_counts.record(record.sentiment);
        aggregate.contributing_records.push(Arc::clone(record));
    }

    for aggregate in tickers.values_mut() {
        let total: f64 = aggregate.contributing_records.iter().map(|r| r.confidence).sum();
        aggregate.mean_confidence = total / aggregate.count as f64;
    }

    tickers
}

/// Headline numbers for a dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Overview {
    /// Distinct articles with at least one surviving record
    pub articles_with_signals: usize,
    pub tickers: usize,
    pub records: usize,
    pub bullish_tickers: usize,
    pub bearish_tickers: usize,
}

/// Aggregates at one threshold, with ranking helpers
#[derive(Debug, Clone, Serialize)]
pub struct AggregateView {
    pub min_confidence: f64,
    pub tickers: BTreeMap<String, TickerAggregate>,
}

impl AggregateView {
    pub fn build(records: &[Arc<AnalysisRecord>], min_confidence: f64) -> Self {
        Self {
            min_confidence,
            tickers: aggregate(records, min_confidence),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&TickerAggregate> {
        self.tickers.get(&symbol.trim().to_uppercase())
    }

    /// Surviving records for `symbol`; zero when it has none
    pub fn count_for(&self, symbol: &str) -> usize {
        self.get(symbol).map(|a| a.count).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Highest record count first
    pub fn most_mentioned(&self, limit: usize) -> Vec<&TickerAggregate> {
        self.ranked(|a| Reverse(a.count), limit)
    }

    /// Most positive records first
    pub fn most_positive(&self, limit: usize) -> Vec<&TickerAggregate> {
        self.ranked(|a| Reverse(a.sentiment_counts.positive), limit)
    }

    /// Tickers with a positive net score, strongest first
    pub fn bullish(&self) -> Vec<&TickerAggregate> {
        self.filtered_ranked(|a| a.net_score() > 0, |a| Reverse(a.net_score()))
    }

    /// Tickers with a negative net score, most negative first
    pub fn bearish(&self) -> Vec<&TickerAggregate> {
        self.filtered_ranked(|a| a.net_score() < 0, |a| a.net_score())
    }

    pub fn overview(&self) -> Overview {
        let articles: HashSet<&str> = self
            .tickers
            .values()
            .flat_map(|a| a.contributing_records.iter().map(|r| r.article_id.as_str()))
            .collect();

        Overview {
            articles_with_signals: articles.len(),
            tickers: self.tickers.len(),
            records: self.tickers.values().map(|a| a.count).sum(),
            bullish_tickers: self.tickers.values().filter(|a| a.net_score() > 0).count(),
            bearish_tickers: self.tickers.values().filter(|a| a.net_score() < 0).count(),
        }
    }

    // Ties fall back to symbol order, since the BTreeMap iterates by symbol
    // and the sort is stable.
    fn ranked<K: Ord>(&self, key: impl Fn(&TickerAggregate) -> K, limit: usize) -> Vec<&TickerAggregate> {
        let mut ranked: Vec<&TickerAggregate> = self.tickers.values().collect();
        ranked.sort_by_key(|a| key(a));
        ranked.truncate(limit);
        ranked
    }

    fn filtered_ranked<K: Ord>(
        &self,
        keep: impl Fn(&TickerAggregate) -> bool,
        key: impl Fn(&TickerAggregate) -> K,
    ) -> Vec<&TickerAggregate> {
        let mut ranked: Vec<&TickerAggregate> = self.tickers.values().filter(|a| keep(a)).collect();
        ranked.sort_by_key(|a| key(a));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::{Impact, ResolvedTicker, Sentiment};

    fn record(article_id: &str, symbol: &str, sentiment: Sentiment, confidence: f64) -> Arc<AnalysisRecord> {
        Arc::new(AnalysisRecord {
            article_id: article_id.to_string(),
            ticker: ResolvedTicker {
                symbol: symbol.to_string(),
                exchange: None,
                company_name: None,
            },
            sentiment,
            summary: String::new(),
            impact: Impact::Medium,
            confidence,
        })
    }

    fn sample() -> Vec<Arc<AnalysisRecord>> {
        vec![
            record("a1", "ACME", Sentiment::Positive, 0.82),
            record("a2", "ACME", Sentiment::Positive, 0.6),
            record("a2", "GLBX", Sentiment::Negative, 0.7),
            record("a3", "INIT", Sentiment::Positive, 0.9),
            record("a4", "ACME", Sentiment::Negative, 0.3),
            record("a5", "ZETA", Sentiment::Neutral, 0.5),
            record("a6", "BETA", Sentiment::Negative, 0.95),
            record("a7", "BETA", Sentiment::Negative, 0.55),
        ]
    }

    #[test]
    fn test_single_record_aggregate() {
        let tickers = aggregate(&[record("a1", "ACME", Sentiment::Positive, 0.82)], 0.5);
        let acme = &tickers["ACME"];
        assert_eq!(acme.count, 1);
        assert_eq!(acme.sentiment_counts.positive, 1);
        assert!((acme.mean_confidence - 0.82).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_inclusive_and_filters() {
        let view = AggregateView::build(&sample(), 0.5);
        assert_eq!(view.count_for("ACME"), 2);
        assert_eq!(view.count_for("ZETA"), 1);
        assert_eq!(view.count_for("acme"), 2);
        assert_eq!(view.count_for("NOPE"), 0);

        let acme = view.get("ACME").unwrap();
        assert!((acme.mean_confidence - 0.71).abs() < 1e-9);
        let ids: Vec<_> = acme.contributing_records.iter().map(|r| r.article_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[test]
    fn test_low_confidence_record_is_absent() {
        let view = AggregateView::build(&[record("a1", "ACME", Sentiment::Positive, 0.3)], 0.5);
        assert!(view.get("ACME").is_none());
        assert_eq!(view.count_for("ACME"), 0);
        assert!(view.is_empty());
    }

    #[test]
    fn test_threshold_monotonicity() {
        let records = sample();
        let thresholds = [0.0, 0.3, 0.5, 0.55, 0.7, 0.82, 0.9, 0.95, 1.0];
        for pair in thresholds.windows(2) {
            let low = AggregateView::build(&records, pair[0]);
            let high = AggregateView::build(&records, pair[1]);
            for symbol in low.tickers.keys() {
                assert!(high.count_for(symbol) <= low.count_for(symbol));
            }
            assert!(high.tickers.len() <= low.tickers.len());
        }
    }

    #[test]
    fn test_rankings_break_ties_by_symbol() {
        let view = AggregateView::build(&sample(), 0.5);

        let mentioned: Vec<_> = view.most_mentioned(3).iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(mentioned, vec!["ACME", "BETA", "GLBX"]);

        let positive: Vec<_> = view.most_positive(2).iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(positive, vec!["ACME", "INIT"]);
    }

    #[test]
    fn test_bullish_and_bearish() {
        let view = AggregateView::build(&sample(), 0.5);

        let bullish: Vec<_> = view.bullish().iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(bullish, vec!["ACME", "INIT"]);

        let bearish: Vec<_> = view.bearish().iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(bearish, vec!["BETA", "GLBX"]);

        let overview = view.overview();
        assert_eq!(overview.tickers, 5);
        assert_eq!(overview.records, 7);
        assert_eq!(overview.bullish_tickers, 2);
        assert_eq!(overview.bearish_tickers, 2);
        assert_eq!(overview.articles_with_signals, 6);
    }
}
