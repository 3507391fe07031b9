//! Pipeline settings loaded from the environment

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use signal_core::{SignalError, SignalResult};

use crate::analyzer::RetryPolicy;

pub const DEFAULT_SNAPSHOT_PATH: &str = "data/all_tickers.txt";
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Ticker snapshot the registry loads at startup
    pub snapshot_path: PathBuf,
    /// Records below this confidence are left out of aggregates
    pub min_confidence: f64,
    /// Articles analyzed at the same time
    pub max_concurrency: usize,
    /// Upper bound for a single backend call
    pub extraction_timeout: Duration,
    pub retry: RetryPolicy,
    /// Minimum spacing between backend calls; zero disables spacing
    pub min_request_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_concurrency: 4,
            extraction_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            min_request_interval: Duration::ZERO,
        }
    }
}

impl PipelineConfig {
    /// Load settings from environment variables, falling back to defaults
    ///
    /// Reads TICKER_SNAPSHOT_PATH, MIN_CONFIDENCE, MAX_CONCURRENCY,
    /// EXTRACTION_TIMEOUT_SECS, MAX_ATTEMPTS, RETRY_BACKOFF_MS and
    /// MIN_REQUEST_INTERVAL_MS.
    pub fn from_env() -> SignalResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> SignalResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            snapshot_path: get("TICKER_SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_path),
            min_confidence: parse_var("MIN_CONFIDENCE", get("MIN_CONFIDENCE"))?
                .unwrap_or(defaults.min_confidence),
            max_concurrency: parse_var("MAX_CONCURRENCY", get("MAX_CONCURRENCY"))?
                .unwrap_or(defaults.max_concurrency),
            extraction_timeout: parse_var::<u64>("EXTRACTION_TIMEOUT_SECS", get("EXTRACTION_TIMEOUT_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.extraction_timeout),
            retry: RetryPolicy {
                max_attempts: parse_var("MAX_ATTEMPTS", get("MAX_ATTEMPTS"))?
                    .unwrap_or(defaults.retry.max_attempts),
                initial_backoff: parse_var::<u64>("RETRY_BACKOFF_MS", get("RETRY_BACKOFF_MS"))?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.initial_backoff),
            },
            min_request_interval: parse_var::<u64>(
                "MIN_REQUEST_INTERVAL_MS",
                get("MIN_REQUEST_INTERVAL_MS"),
            )?
            .map(Duration::from_millis)
            .unwrap_or(defaults.min_request_interval),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SignalResult<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(SignalError::config(format!(
                "MIN_CONFIDENCE must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.max_concurrency == 0 {
            return Err(SignalError::config("MAX_CONCURRENCY must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(SignalError::config("MAX_ATTEMPTS must be at least 1"));
        }
        if self.extraction_timeout.is_zero() {
            return Err(SignalError::config("EXTRACTION_TIMEOUT_SECS must be positive"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: Option<String>) -> SignalResult<Option<T>> {
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| SignalError::config(format!("{} has an invalid value: {}", key, v)))
        })
        .transpose()
}
