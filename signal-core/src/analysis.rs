//! Per-article analysis records and the per-ticker aggregates built from them

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::extraction::{Impact, Sentiment};
use crate::ticker::ResolvedTicker;

/// Signal for one (article, ticker) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub article_id: String,
    pub ticker: ResolvedTicker,
    pub sentiment: Sentiment,
    pub summary: String,
    pub impact: Impact,
    pub confidence: f64,
}

impl AnalysisRecord {
    pub fn symbol(&self) -> &str {
        &self.ticker.symbol
    }
}

/// Number of records per sentiment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentCounts {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentCounts {
    pub fn record(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Neutral => self.neutral += 1,
            Sentiment::Negative => self.negative += 1,
        }
    }

    pub fn get(&self, sentiment: Sentiment) -> usize {
        match sentiment {
            Sentiment::Positive => self.positive,
            Sentiment::Neutral => self.neutral,
            Sentiment::Negative => self.negative,
        }
    }

    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }

    /// Positive minus negative mentions
    pub fn net_score(&self) -> i64 {
        self.positive as i64 - self.negative as i64
    }
}

/// Aggregated view of one ticker at a given confidence threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerAggregate {
    pub symbol: String,
    pub count: usize,
    pub sentiment_counts: SentimentCounts,
    pub mean_confidence: f64,
    /// Records in the order they were discovered
    pub contributing_records: Vec<Arc<AnalysisRecord>>,
}

impl TickerAggregate {
    pub fn net_score(&self) -> i64 {
        self.sentiment_counts.net_score()
    }
}
