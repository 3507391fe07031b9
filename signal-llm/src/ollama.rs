//! Local inference through the Ollama chat API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use signal_core::{SignalError, SignalResult};
use tracing::{debug, instrument};

use crate::backend::{status_error, transport_error, CompletionBackend, DEFAULT_OLLAMA_URL};

const NAME: &str = "ollama";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    /// Constrains the model to emit JSON
    format: &'static str,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    model: String,
    base_url: String,
    temperature: f32,
}

impl OllamaBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            temperature: 0.0,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> SignalResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            format: "json",
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(NAME, status, &body));
        }

        let data: ChatResponse = response.json().await.map_err(|e| transport_error(NAME, e))?;
        if let Some(tokens) = data.eval_count {
            debug!(tokens, "Ollama completion finished");
        }

        data.message
            .map(|m| m.content)
            .ok_or_else(|| SignalError::malformed("Ollama response has no message"))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_complete_returns_message_content() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/chat")
                .body_includes("\"format\":\"json\"")
                .body_includes("\"stream\":false");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"model":"llama3.1","message":{"role":"assistant","content":"{\"sentiment\":\"positive\"}"},"done":true,"eval_count":12}"#);
        });

        let backend = OllamaBackend::new("llama3.1").with_base_url(server.base_url());
        let reply = backend.complete("prompt").await.unwrap();

        mock.assert();
        assert_eq!(reply, r#"{"sentiment":"positive"}"#);
    }

    #[tokio::test]
    async fn test_missing_model_is_fatal() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/chat");
            then.status(404).body(r#"{"error":"model 'nope' not found"}"#);
        });

        let backend = OllamaBackend::new("nope").with_base_url(server.base_url());
        let err = backend.complete("prompt").await.unwrap_err();
        assert!(err.is_fatal_to_run());
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/chat");
            then.status(503).body("loading model");
        });

        let backend = OllamaBackend::new("llama3.1").with_base_url(server.base_url());
        let err = backend.complete("prompt").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_retryable() {
        // Nothing listens on port 9 locally
        let backend = OllamaBackend::new("llama3.1").with_base_url("http://127.0.0.1:9");
        let err = backend.complete("prompt").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
