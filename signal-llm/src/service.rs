//! One article in, raw model text out

use std::sync::Arc;
use std::time::Duration;

use signal_core::{Article, ExtractionRequest, RawExtraction, SignalError, SignalResult};
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::backend::CompletionBackend;
use crate::prompt::build_prompt;
use crate::rate_limiter::RateLimiter;

/// Turns one article into raw model output
///
/// The service is unaware of which provider sits behind it and never
/// retries: one `extract` is at most one backend call.
#[derive(Clone)]
pub struct ExtractionService {
    backend: Arc<dyn CompletionBackend>,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl ExtractionService {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            rate_limiter: None,
        }
    }

    /// Space out backend calls through a shared limiter
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Send one article to the backend under `timeout`
    ///
    /// Articles without text fail with `InvalidInput` before any call is
    /// made. A timeout surfaces as a retryable backend error.
    pub async fn extract(&self, article: &Article, timeout: Duration) -> SignalResult<RawExtraction> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.extract_with_cancel(article, timeout, &cancel_rx).await
    }

    /// Like [`ExtractionService::extract`], but gives up with `Cancelled`
    /// instead of calling the backend once `cancel` turns true
    ///
    /// A call already sent to the backend is not interrupted.
    #[instrument(skip(self, article, cancel), fields(article_id = %article.id, backend = self.backend.name()))]
    pub async fn extract_with_cancel(
        &self,
        article: &Article,
        timeout: Duration,
        cancel: &watch::Receiver<bool>,
    ) -> SignalResult<RawExtraction> {
        let request = ExtractionRequest::from_article(article)?;
        let prompt = build_prompt(&request.text);

        if let Some(limiter) = &self.rate_limiter {
            let mut waiting = cancel.clone();
            tokio::select! {
                _ = limiter.acquire() => {}
                _ = cancellation(&mut waiting) => {}
            }
        }
        if *cancel.borrow() {
            debug!("Cancelled before the backend call");
            return Err(SignalError::cancelled("run cancelled before the backend call"));
        }

        let backend = self.backend.name();
        let text = match tokio::time::timeout(timeout, self.backend.complete(&prompt)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(?timeout, "Extraction call timed out");
                return Err(SignalError::backend_retryable(
                    backend,
                    format!("no response within {:?}", timeout),
                ));
            }
        };

        debug!(chars = text.len(), "Received extraction");
        Ok(RawExtraction {
            article_id: request.article_id,
            backend: backend.to_string(),
            text,
        })
    }
}

/// Resolves once `cancel` turns true; never resolves if the sender is gone
pub async fn cancellation(cancel: &mut watch::Receiver<bool>) {
    let closed = cancel.wait_for(|cancelled| *cancelled).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedBackend;

    fn article(title: &str, body: &str) -> Article {
        Article::new(title, body, "Wire", None, format!("https://news.test/{}", title))
    }

    #[tokio::test]
    async fn test_empty_article_never_reaches_backend() {
        let backend = Arc::new(ScriptedBackend::new());
        let service = ExtractionService::new(backend.clone());

        let err = service
            .extract(&article("", "  "), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, SignalError::InvalidInput(_)));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_returns_backend_text() {
        let backend = Arc::new(ScriptedBackend::new().on("Acme", r#"{"sentiment":"positive"}"#));
        let service = ExtractionService::new(backend.clone());

        let a = article("Acme Corp beats earnings", "");
        let raw = service.extract(&a, Duration::from_secs(1)).await.unwrap();

        assert_eq!(raw.article_id, a.id);
        assert_eq!(raw.backend, "scripted");
        assert_eq!(raw.text, r#"{"sentiment":"positive"}"#);
        assert_eq!(backend.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retryable() {
        let backend = Arc::new(ScriptedBackend::new().with_delay(Duration::from_millis(200)));
        let service = ExtractionService::new(backend);

        let err = service
            .extract(&article("Slow", "news"), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cancelled_before_call_never_reaches_backend() {
        let backend = Arc::new(ScriptedBackend::new());
        let service = ExtractionService::new(backend.clone());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        cancel_tx.send(true).unwrap();

        let err = service
            .extract_with_cancel(&article("Acme", "news"), Duration::from_secs(1), &cancel_rx)
            .await
            .unwrap_err();

        assert!(matches!(err, SignalError::Cancelled(_)));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_on_limiter() {
        let backend = Arc::new(ScriptedBackend::new());
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(500), "test"));
        let service = ExtractionService::new(backend.clone()).with_rate_limiter(limiter);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        service
            .extract_with_cancel(&article("First", "news"), Duration::from_secs(1), &cancel_rx)
            .await
            .unwrap();

        let cancel = async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel_tx.send(true).unwrap();
        };
        let second = article("Second", "news");
        let start = tokio::time::Instant::now();
        let (result, ()) = tokio::join!(
            service.extract_with_cancel(&second, Duration::from_secs(1), &cancel_rx),
            cancel
        );

        assert!(matches!(result, Err(SignalError::Cancelled(_))));
        assert!(start.elapsed() < Duration::from_millis(400));
        assert_eq!(backend.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_backend_error_passes_through() {
        let backend = Arc::new(
            ScriptedBackend::new().on_error("Acme", SignalError::backend_fatal("scripted", "401")),
        );
        let service = ExtractionService::new(backend);

        let err = service
            .extract(&article("Acme", "x"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_fatal_to_run());
    }
}
