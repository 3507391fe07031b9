//! Batch runner: analyzes articles concurrently, then aggregates once

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{future, stream, StreamExt};
use serde::Serialize;
use signal_core::{AnalysisRecord, Article, ExtractionRecord, FailureKind, SignalResult};
use signal_llm::{CompletionBackend, ExtractionService, RateLimiter, RateLimiterStats};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregation::AggregateView;
use crate::analyzer::{ArticleAnalyzer, ArticleOutcome};
use crate::config::PipelineConfig;
use crate::registry::TickerRegistry;
use crate::resolver::TickerResolver;

/// What happened to one article
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LogStatus {
    Analyzed,
    Failed { kind: FailureKind, message: String },
}

/// One raw-log line per input article, in input order
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub article_id: String,
    pub title: String,
    #[serde(flatten)]
    pub status: LogStatus,
    pub attempts: u32,
    /// Records produced, before any confidence filtering
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionRecord>,
}

impl LogEntry {
    fn from_outcome(article: &Article, outcome: ArticleOutcome, records: usize) -> Self {
        let status = match outcome.failure {
            Some(err) => LogStatus::Failed {
                kind: err.failure_kind(),
                message: err.to_string(),
            },
            None => LogStatus::Analyzed,
        };
        Self {
            article_id: outcome.article_id,
            title: article.title.clone(),
            status,
            attempts: outcome.attempts,
            records,
            extraction: outcome.extraction,
        }
    }

    fn cancelled(article: &Article) -> Self {
        Self {
            article_id: article.id.clone(),
            title: article.title.clone(),
            status: LogStatus::Failed {
                kind: FailureKind::Cancelled,
                message: "run cancelled before the article was dispatched".to_string(),
            },
            attempts: 0,
            records: 0,
            extraction: None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.status {
            LogStatus::Failed { kind, .. } => Some(*kind),
            LogStatus::Analyzed => None,
        }
    }
}

/// A record joined with the article and extraction it came from
#[derive(Debug, Clone, Serialize)]
pub struct DeepDiveEntry<'a> {
    pub record: &'a AnalysisRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<&'a Article>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<&'a ExtractionRecord>,
}

/// Everything one run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub articles: Vec<Article>,
    /// Every record, unfiltered, in article order
    pub records: Vec<Arc<AnalysisRecord>>,
    pub raw_log: Vec<LogEntry>,
    /// Aggregate at the runner's configured threshold
    pub aggregate: AggregateView,
}

impl RunReport {
    /// Aggregate the same records at another threshold
    pub fn reaggregate(&self, min_confidence: f64) -> AggregateView {
        AggregateView::build(&self.records, min_confidence)
    }

    /// Records behind `symbol` at `min_confidence`, with their sources
    pub fn deep_dive(&self, symbol: &str, min_confidence: f64) -> Vec<DeepDiveEntry<'_>> {
        let symbol = symbol.trim().to_uppercase();
        let articles: HashMap<&str, &Article> =
            self.articles.iter().map(|a| (a.id.as_str(), a)).collect();
        let extractions: HashMap<&str, &ExtractionRecord> = self
            .raw_log
            .iter()
            .filter_map(|e| e.extraction.as_ref().map(|x| (e.article_id.as_str(), x)))
            .collect();

        self.records
            .iter()
            .filter(|r| r.symbol() == symbol && r.confidence >= min_confidence)
            .map(|record| DeepDiveEntry {
                record: record.as_ref(),
                article: articles.get(record.article_id.as_str()).copied(),
                extraction: extractions.get(record.article_id.as_str()).copied(),
            })
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &LogEntry> {
        self.raw_log.iter().filter(|e| e.failure_kind().is_some())
    }

    pub fn analyzed_count(&self) -> usize {
        self.raw_log
            .iter()
            .filter(|e| e.status == LogStatus::Analyzed)
            .count()
    }
}

#[derive(Clone)]
pub struct PipelineRunner {
    analyzer: ArticleAnalyzer,
    max_concurrency: usize,
    min_confidence: f64,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl PipelineRunner {
    pub fn new(analyzer: ArticleAnalyzer, max_concurrency: usize, min_confidence: f64) -> Self {
        Self {
            analyzer,
            max_concurrency: max_concurrency.max(1),
            min_confidence,
            rate_limiter: None,
        }
    }

    /// Wire a runner from a backend, a loaded registry and settings
    pub fn from_config(
        backend: Arc<dyn CompletionBackend>,
        registry: Arc<TickerRegistry>,
        config: &PipelineConfig,
    ) -> Self {
        let rate_limiter = RateLimiter::optional(config.min_request_interval, backend.name())
            .map(Arc::new);
        let mut service = ExtractionService::new(Arc::clone(&backend));
        if let Some(limiter) = &rate_limiter {
            service = service.with_rate_limiter(Arc::clone(limiter));
        }
        let analyzer = ArticleAnalyzer::new(service, TickerResolver::new(registry))
            .with_retry(config.retry)
            .with_timeout(config.extraction_timeout);
        Self {
            rate_limiter,
            ..Self::new(analyzer, config.max_concurrency, config.min_confidence)
        }
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Counters of the shared request limiter, when request spacing is on
    pub fn rate_limiter_stats(&self) -> Option<RateLimiterStats> {
        self.rate_limiter.as_ref().map(|limiter| limiter.stats())
    }

    /// Analyze every article, then aggregate
    pub async fn run(&self, articles: Vec<Article>) -> SignalResult<RunReport> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_with_cancel(articles, cancel_rx).await
    }

    /// Like [`PipelineRunner::run`], but stops issuing backend calls once
    /// `cancel` turns true
    ///
    /// Calls already in flight finish; articles that would need another call
    /// and articles never dispatched are logged as cancelled. Per-article
    /// failures never end the run. Run-level failures, like a rejected API
    /// key, are returned as `Err`.
    #[instrument(skip(self, articles, cancel), fields(articles = articles.len()))]
    pub async fn run_with_cancel(
        &self,
        articles: Vec<Article>,
        cancel: watch::Receiver<bool>,
    ) -> SignalResult<RunReport> {
        let mut articles: Vec<Article> = articles.into_iter().map(Article::with_derived_id).collect();
        disambiguate_ids(&mut articles);
        let mut outcomes: Vec<Option<ArticleOutcome>> = vec![None; articles.len()];

        let dispatch = cancel.clone();
        let cancel = &cancel;
        let mut results = stream::iter(articles.iter().enumerate())
            .take_while(move |_| future::ready(!*dispatch.borrow()))
            .map(|(idx, article)| async move {
                (idx, self.analyzer.analyze_with_cancel(article, cancel).await)
            })
            .buffer_unordered(self.max_concurrency);

        while let Some((idx, result)) = results.next().await {
            match result {
                Ok(outcome) => outcomes[idx] = Some(outcome),
                Err(err) => {
                    error!(error = %err, "Aborting run");
                    return Err(err);
                }
            }
        }
        drop(results);

        let mut records = Vec::new();
        let mut raw_log = Vec::with_capacity(articles.len());
        for (article, outcome) in articles.iter().zip(outcomes) {
            match outcome {
                Some(mut outcome) => {
                    let produced = std::mem::take(&mut outcome.records);
                    raw_log.push(LogEntry::from_outcome(article, outcome, produced.len()));
                    records.extend(produced.into_iter().map(Arc::new));
                }
                None => raw_log.push(LogEntry::cancelled(article)),
            }
        }

        // Join point: every dispatched article has finished
        let aggregate = AggregateView::build(&records, self.min_confidence);
        let report = RunReport {
            generated_at: Utc::now(),
            articles,
            records,
            raw_log,
            aggregate,
        };

        info!(
            analyzed = report.analyzed_count(),
            failed = report.failures().count(),
            records = report.records.len(),
            tickers = report.aggregate.tickers.len(),
            "Run complete"
        );
        if let Some(stats) = self.rate_limiter_stats() {
            debug!(
                limiter = %stats.name,
                requests = stats.total_requests,
                delayed = stats.delayed_requests,
                min_interval_ms = stats.min_interval_ms,
                "Request spacing"
            );
        }
        Ok(report)
    }
}

/// Give repeated article ids a `#n` suffix so every record joins back to one source
fn disambiguate_ids(articles: &mut [Article]) {
    let mut seen: HashSet<String> = HashSet::with_capacity(articles.len());
    for article in articles.iter_mut() {
        if seen.insert(article.id.clone()) {
            continue;
        }
        let original = std::mem::take(&mut article.id);
        let mut n = 2;
        while seen.contains(&format!("{}#{}", original, n)) {
            n += 1;
        }
        article.id = format!("{}#{}", original, n);
        warn!(original = %original, id = %article.id, "Renamed duplicate article id");
        seen.insert(article.id.clone());
    }
}
