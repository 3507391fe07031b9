//! Backend-agnostic completion interface and provider selection

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use signal_core::{SignalError, SignalResult};

use crate::{GeminiBackend, OllamaBackend, OpenAIBackend};

pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// One interchangeable language-model provider.
///
/// Implementations make exactly one outbound call per `complete` and never
/// retry; retry policy belongs to the caller.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send a prompt and return the raw reply text
    async fn complete(&self, prompt: &str) -> SignalResult<String>;

    /// Short provider name used in logs and error messages
    fn name(&self) -> &'static str;
}

/// Provider choice, resolved once at startup
#[derive(Clone, PartialEq)]
pub enum BackendConfig {
    Ollama {
        model: String,
        base_url: String,
    },
    OpenAI {
        model: String,
        api_key: String,
        /// Override for OpenAI-compatible gateways
        api_base: Option<String>,
    },
    Gemini {
        model: String,
        api_key: String,
        base_url: String,
    },
}

impl BackendConfig {
    pub fn ollama(model: impl Into<String>) -> Self {
        BackendConfig::Ollama {
            model: model.into(),
            base_url: DEFAULT_OLLAMA_URL.to_string(),
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        BackendConfig::OpenAI {
            model: DEFAULT_OPENAI_MODEL.to_string(),
            api_key: api_key.into(),
            api_base: None,
        }
    }

    pub fn gemini(api_key: impl Into<String>) -> Self {
        BackendConfig::Gemini {
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_key: api_key.into(),
            base_url: DEFAULT_GEMINI_URL.to_string(),
        }
    }

    /// Load the provider from environment variables
    ///
    /// Expects:
    /// - LLM_PROVIDER: "ollama" (default), "openai" or "gemini"
    /// - LLM_MODEL: optional model override
    /// - OLLAMA_BASE_URL / OPENAI_API_KEY / OPENAI_API_BASE / GEMINI_API_KEY / GEMINI_BASE_URL
    pub fn from_env() -> SignalResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`BackendConfig::from_env`] over an arbitrary key lookup
    pub fn from_lookup<F>(get: F) -> SignalResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let provider = get("LLM_PROVIDER").unwrap_or_else(|| "ollama".to_string());
        let model = get("LLM_MODEL");

        match provider.trim().to_lowercase().as_str() {
            "ollama" | "local" => Ok(BackendConfig::Ollama {
                model: model.unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
                base_url: get("OLLAMA_BASE_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            }),
            "openai" => {
                let api_key = get("OPENAI_API_KEY").ok_or_else(|| {
                    SignalError::config("OPENAI_API_KEY is required for the openai provider")
                })?;
                Ok(BackendConfig::OpenAI {
                    model: model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                    api_key,
                    api_base: get("OPENAI_API_BASE"),
                })
            }
            "gemini" | "google" => {
                let api_key = get("GEMINI_API_KEY").ok_or_else(|| {
                    SignalError::config("GEMINI_API_KEY is required for the gemini provider")
                })?;
                Ok(BackendConfig::Gemini {
                    model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                    api_key,
                    base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string()),
                })
            }
            other => Err(SignalError::config(format!("Unknown LLM provider: {}", other))),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            BackendConfig::Ollama { .. } => "ollama",
            BackendConfig::OpenAI { .. } => "openai",
            BackendConfig::Gemini { .. } => "gemini",
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            BackendConfig::Ollama { model, .. } => model,
            BackendConfig::OpenAI { model, .. } => model,
            BackendConfig::Gemini { model, .. } => model,
        }
    }

    /// Construct the backend this configuration names
    pub fn build(&self) -> SignalResult<Arc<dyn CompletionBackend>> {
        let backend: Arc<dyn CompletionBackend> = match self {
            BackendConfig::Ollama { model, base_url } => {
                Arc::new(OllamaBackend::new(model.clone()).with_base_url(base_url.clone()))
            }
            BackendConfig::OpenAI {
                model,
                api_key,
                api_base,
            } => {
                let mut backend = OpenAIBackend::new(api_key.clone()).with_model(model);
                if let Some(base) = api_base {
                    backend = backend.with_api_base(base);
                }
                Arc::new(backend)
            }
            BackendConfig::Gemini {
                model,
                api_key,
                base_url,
            } => Arc::new(
                GeminiBackend::new(api_key.clone())
                    .with_model(model)
                    .with_base_url(base_url.clone()),
            ),
        };
        Ok(backend)
    }
}

// API keys stay out of logs
impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendConfig::Ollama { model, base_url } => f
                .debug_struct("Ollama")
                .field("model", model)
                .field("base_url", base_url)
                .finish(),
            BackendConfig::OpenAI {
                model, api_base, ..
            } => f
                .debug_struct("OpenAI")
                .field("model", model)
                .field("api_key", &"<redacted>")
                .field("api_base", api_base)
                .finish(),
            BackendConfig::Gemini {
                model, base_url, ..
            } => f
                .debug_struct("Gemini")
                .field("model", model)
                .field("api_key", &"<redacted>")
                .field("base_url", base_url)
                .finish(),
        }
    }
}

/// Map a non-success HTTP status to a backend error
///
/// Rate limiting, timeouts and server errors are retryable. Anything else
/// (bad key, unknown model, rejected request) fails every later call too.
pub(crate) fn status_error(backend: &str, status: StatusCode, body: &str) -> SignalError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 300));
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        SignalError::backend_retryable(backend, message)
    } else {
        SignalError::backend_fatal(backend, message)
    }
}

/// Map a transport-level reqwest failure to a backend error
pub(crate) fn transport_error(backend: &str, err: reqwest::Error) -> SignalError {
    if err.is_decode() {
        SignalError::malformed(format!("{} returned an unreadable response: {}", backend, err))
    } else if err.is_builder() {
        SignalError::backend_fatal(backend, format!("invalid request: {}", err))
    } else {
        SignalError::backend_retryable(backend, err.to_string())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
