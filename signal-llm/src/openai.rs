//! OpenAI chat-completions backend

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use signal_core::{SignalError, SignalResult};
use tracing::instrument;

use crate::backend::{CompletionBackend, DEFAULT_OPENAI_MODEL};
use crate::prompt::SYSTEM_PROMPT;

const NAME: &str = "openai";

#[derive(Debug, Clone)]
pub struct OpenAIBackend {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_config(OpenAIConfig::new().with_api_key(api_key.into()))
    }

    fn with_config(config: OpenAIConfig) -> Self {
        Self {
            client: Client::with_config(config),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            temperature: 0.0,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Point the client at an OpenAI-compatible endpoint
    pub fn with_api_base(self, api_base: &str) -> Self {
        let config = self.client.config().clone().with_api_base(api_base);
        Self {
            client: Client::with_config(config),
            ..self
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl CompletionBackend for OpenAIBackend {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> SignalResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| SignalError::internal(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| SignalError::internal(e.to_string()))?
                    .into(),
            ])
            .temperature(self.temperature)
            .build()
            .map_err(|e| SignalError::internal(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify_error)?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| SignalError::malformed("No response content from OpenAI"))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

/// OpenAI reports failures as typed API errors; the message decides retryability
fn classify_error(err: OpenAIError) -> SignalError {
    match err {
        OpenAIError::ApiError(api) => {
            let lowered = api.message.to_lowercase();
            let transient = ["rate limit", "overloaded", "timeout", "timed out", "server error"]
                .iter()
                .any(|needle| lowered.contains(needle));
            if transient {
                SignalError::backend_retryable(NAME, api.message)
            } else {
                SignalError::backend_fatal(NAME, api.message)
            }
        }
        OpenAIError::InvalidArgument(msg) => SignalError::backend_fatal(NAME, msg),
        other => SignalError::backend_retryable(NAME, other.to_string()),
    }
}
