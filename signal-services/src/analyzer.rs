//! Extraction, parsing and ticker resolution for a single article

use std::time::Duration;

use signal_core::{
    AnalysisRecord, Article, ExtractionRecord, FailureKind, RawExtraction, SignalError,
    SignalResult,
};
use signal_llm::{cancellation, ExtractionService};
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::parser::ExtractionParser;
use crate::resolver::TickerResolver;

/// Bounded retry with exponential backoff for retryable backend errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each later one
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

/// Result of analyzing one article
///
/// A per-article failure is carried in `failure` with no records; only
/// run-level failures are returned as `Err` from [`ArticleAnalyzer::analyze`].
#[derive(Debug, Clone)]
pub struct ArticleOutcome {
    pub article_id: String,
    pub records: Vec<AnalysisRecord>,
    pub extraction: Option<ExtractionRecord>,
    pub failure: Option<SignalError>,
    /// Backend calls made, including retries
    pub attempts: u32,
}

impl ArticleOutcome {
    fn failed(article_id: &str, error: SignalError, attempts: u32) -> Self {
        Self {
            article_id: article_id.to_string(),
            records: Vec::new(),
            extraction: None,
            failure: Some(error),
            attempts,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

#[derive(Clone)]
pub struct ArticleAnalyzer {
    service: ExtractionService,
    parser: ExtractionParser,
    resolver: TickerResolver,
    retry: RetryPolicy,
    timeout: Duration,
}

impl ArticleAnalyzer {
    pub fn new(service: ExtractionService, resolver: TickerResolver) -> Self {
        Self {
            service,
            parser: ExtractionParser::new(),
            resolver,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Turn one article into zero or more analysis records
    ///
    /// Returns `Err` only for errors that invalidate the whole run, such as a
    /// rejected API key.
    pub async fn analyze(&self, article: &Article) -> SignalResult<ArticleOutcome> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.analyze_with_cancel(article, &cancel_rx).await
    }

    /// Like [`ArticleAnalyzer::analyze`], but makes no further backend calls
    /// once `cancel` turns true
    ///
    /// A cancelled article ends as a `Cancelled` failure. Pending backoff
    /// waits are cut short; a call already in flight finishes first.
    #[instrument(skip(self, article, cancel), fields(article_id = %article.id))]
    pub async fn analyze_with_cancel(
        &self,
        article: &Article,
        cancel: &watch::Receiver<bool>,
    ) -> SignalResult<ArticleOutcome> {
        let (raw, attempts) = match self.extract_with_retry(article, cancel).await {
            Ok(done) => done,
            Err((error, attempts)) if error.is_fatal_to_run() => {
                debug!(attempts, error = %error, "Run-level failure");
                return Err(error);
            }
            Err((error, attempts)) if error.failure_kind() == FailureKind::Cancelled => {
                debug!(attempts, "Extraction cancelled");
                return Ok(ArticleOutcome::failed(&article.id, error, attempts));
            }
            Err((error, attempts)) => {
                warn!(attempts, kind = %error.failure_kind(), error = %error, "Extraction failed");
                return Ok(ArticleOutcome::failed(&article.id, error, attempts));
            }
        };

        let extraction = match self.parser.parse(&raw) {
            Ok(extraction) => extraction,
            Err(error) => {
                warn!(error = %error, "Discarding malformed extraction");
                return Ok(ArticleOutcome::failed(&article.id, error, attempts));
            }
        };

        let records: Vec<AnalysisRecord> = self
            .resolver
            .resolve(&extraction.companies)
            .into_iter()
            .map(|ticker| AnalysisRecord {
                article_id: article.id.clone(),
                ticker,
                sentiment: extraction.sentiment,
                summary: extraction.summary.clone(),
                impact: extraction.impact,
                confidence: extraction.confidence,
            })
            .collect();

        debug!(
            mentions = extraction.companies.len(),
            records = records.len(),
            "Article analyzed"
        );

        Ok(ArticleOutcome {
            article_id: article.id.clone(),
            records,
            extraction: Some(extraction),
            failure: None,
            attempts,
        })
    }

    async fn extract_with_retry(
        &self,
        article: &Article,
        cancel: &watch::Receiver<bool>,
    ) -> Result<(RawExtraction, u32), (SignalError, u32)> {
        let mut waiting = cancel.clone();
        let mut attempt = 0;
        loop {
            if *cancel.borrow() {
                return Err((SignalError::cancelled("run cancelled before retrying"), attempt));
            }
            attempt += 1;
            match self
                .service
                .extract_with_cancel(article, self.timeout, cancel)
                .await
            {
                Ok(raw) => return Ok((raw, attempt)),
                Err(error) if error.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(attempt, ?delay, error = %error, "Retrying extraction");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancellation(&mut waiting) => {}
                    }
                }
                Err(error) => return Err((error, attempt)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TickerRegistry;
    use signal_core::Sentiment;
    use signal_llm::ScriptedBackend;
    use std::sync::Arc;

    fn analyzer(backend: Arc<ScriptedBackend>) -> ArticleAnalyzer {
        let registry =
            TickerRegistry::from_snapshot_str("ACME|Acme Corp|NYSE\nGLBX|Globex Corporation|NASDAQ\n")
                .unwrap();
        ArticleAnalyzer::new(
            ExtractionService::new(backend),
            TickerResolver::new(Arc::new(registry)),
        )
        .with_retry(RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
        })
        .with_timeout(Duration::from_secs(5))
    }

    fn article(id: &str, title: &str) -> Article {
        let mut article = Article::new(title, "", "Wire", None, "");
        article.id = id.to_string();
        article
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_multiple_companies_share_article_id() {
        let backend = Arc::new(ScriptedBackend::new().on(
            "merger",
            r#"{"sentiment": "positive", "companies": ["Acme Corp", "Globex", "Initech"], "impact": "high", "confidence": 0.9}"#,
        ));
        let outcome = analyzer(backend)
            .analyze(&article("m1", "Acme and Globex announce merger"))
            .await
            .unwrap();

        assert!(!outcome.is_failure());
        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.records.iter().all(|r| r.article_id == "m1"));
        assert!(outcome.records.iter().all(|r| r.sentiment == Sentiment::Positive));
        assert_eq!(outcome.records[1].symbol(), "GLBX");
    }

    #[tokio::test]
    async fn test_malformed_output_is_a_failure_not_an_error() {
        let backend = Arc::new(ScriptedBackend::new().on("Acme", "I think this is good news."));
        let outcome = analyzer(backend.clone())
            .analyze(&article("a1", "Acme Corp beats earnings"))
            .await
            .unwrap();

        assert!(outcome.records.is_empty());
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.failure_kind(), FailureKind::MalformedExtraction);
        // Malformed output is not retried
        assert_eq!(backend.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_retryable_error_then_success() {
        let backend = Arc::new(ScriptedBackend::new().on_sequence(
            "Acme",
            vec![
                Err(SignalError::backend_retryable("scripted", "rate limited")),
                Ok(r#"{"sentiment": "negative", "companies": ["ACME"], "confidence": 0.6}"#.into()),
            ],
        ));
        let outcome = analyzer(backend.clone())
            .analyze(&article("a1", "Acme recalls products"))
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(backend.calls_for("Acme"), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let backend = Arc::new(
            ScriptedBackend::new().on_error("Acme", SignalError::backend_retryable("scripted", "timeout")),
        );
        let outcome = analyzer(backend.clone())
            .analyze(&article("a1", "Acme"))
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.failure.unwrap().failure_kind(), FailureKind::Backend);
        assert_eq!(backend.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_fatal_backend_error_propagates() {
        let backend = Arc::new(
            ScriptedBackend::new().on_error("Acme", SignalError::backend_fatal("scripted", "invalid api key")),
        );
        let err = analyzer(backend.clone())
            .analyze(&article("a1", "Acme"))
            .await
            .unwrap_err();

        assert!(err.is_fatal_to_run());
        assert_eq!(backend.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_retrying() {
        let backend = Arc::new(ScriptedBackend::new().on_error(
            "Acme",
            SignalError::backend_retryable("scripted", "rate limited"),
        ));
        let analyzer = analyzer(backend.clone()).with_retry(RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(10),
        });
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let cancel = async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_tx.send(true).unwrap();
        };
        let a1 = article("a1", "Acme");
        let start = tokio::time::Instant::now();
        let (outcome, ()) = tokio::join!(
            analyzer.analyze_with_cancel(&a1, &cancel_rx),
            cancel
        );
        let outcome = outcome.unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.failure.unwrap().failure_kind(), FailureKind::Cancelled);
        assert_eq!(backend.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_call() {
        let backend = Arc::new(ScriptedBackend::new());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        cancel_tx.send(true).unwrap();

        let outcome = analyzer(backend.clone())
            .analyze_with_cancel(&article("a1", "Acme"), &cancel_rx)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 0);
        assert_eq!(outcome.failure.unwrap().failure_kind(), FailureKind::Cancelled);
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_article_is_invalid_input() {
        let backend = Arc::new(ScriptedBackend::new());
        let outcome = analyzer(backend.clone()).analyze(&article("e1", "")).await.unwrap();

        assert_eq!(outcome.failure.unwrap().failure_kind(), FailureKind::InvalidInput);
        assert_eq!(backend.total_calls(), 0);
    }
}
