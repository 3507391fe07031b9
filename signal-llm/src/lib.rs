//! Language-model backends for headline signal extraction
//!
//! Every provider implements [`CompletionBackend`], a single
//! prompt-in/text-out contract:
//! - Ollama: local inference over the Ollama chat API
//! - OpenAI: chat completions via `async-openai`
//! - Gemini: Google's `generateContent` REST API
//!
//! [`ExtractionService`] turns one article into a prompt, calls the configured
//! backend under a caller-supplied timeout and returns the raw model text.

pub mod backend;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod rate_limiter;
pub mod service;

#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

pub use backend::{BackendConfig, CompletionBackend};
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAIBackend;
pub use prompt::build_prompt;
pub use rate_limiter::{RateLimiter, RateLimiterStats};
pub use service::{cancellation, ExtractionService};

#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedBackend;
