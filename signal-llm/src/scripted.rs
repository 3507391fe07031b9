//! In-memory backend that answers from a script, for tests and dry runs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use signal_core::{SignalError, SignalResult};

use crate::backend::CompletionBackend;

const NEUTRAL_REPLY: &str =
    r#"{"sentiment": "neutral", "companies": [], "summary": "", "impact": "low", "confidence": 0.0}"#;

struct Rule {
    needle: String,
    replies: Vec<SignalResult<String>>,
    hits: AtomicUsize,
}

impl Rule {
    /// Replies are served in order; the last one repeats
    fn next_reply(&self) -> SignalResult<String> {
        let hit = self.hits.fetch_add(1, Ordering::SeqCst);
        let index = hit.min(self.replies.len().saturating_sub(1));
        self.replies
            .get(index)
            .cloned()
            .unwrap_or_else(|| Ok(NEUTRAL_REPLY.to_string()))
    }
}

/// Replies to prompts containing a needle with scripted text or errors
pub struct ScriptedBackend {
    rules: Vec<Rule>,
    fallback: SignalResult<String>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Ok(NEUTRAL_REPLY.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answer prompts containing `needle` with `reply`
    pub fn on(self, needle: &str, reply: &str) -> Self {
        self.on_sequence(needle, vec![Ok(reply.to_string())])
    }

    /// Fail prompts containing `needle` with `error`
    pub fn on_error(self, needle: &str, error: SignalError) -> Self {
        self.on_sequence(needle, vec![Err(error)])
    }

    /// Answer successive prompts containing `needle` from `replies`
    pub fn on_sequence(mut self, needle: &str, replies: Vec<SignalResult<String>>) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            replies,
            hits: AtomicUsize::new(0),
        });
        self
    }

    /// Reply for prompts no rule matches
    pub fn otherwise(mut self, reply: SignalResult<String>) -> Self {
        self.fallback = reply;
        self
    }

    /// Sleep before answering, to simulate backend latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls answered by the rule registered for `needle`
    pub fn calls_for(&self, needle: &str) -> usize {
        self.rules
            .iter()
            .filter(|r| r.needle == needle)
            .map(|r| r.hits.load(Ordering::SeqCst))
            .sum()
    }

    /// Highest number of calls that were running at the same time
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str) -> SignalResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.rules.iter().find(|r| prompt.contains(&r.needle)) {
            Some(rule) => rule.next_reply(),
            None => self.fallback.clone(),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
