//! OpenAI-compatible chat completions backend for `TextGenerator`.
//!
//! Works against the real OpenAI API or any compatible gateway via a custom
//! base URL. Requires `OPENAI_API_KEY` (or explicit config).

use std::collections::BTreeMap;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::capability::TextGenerator;
use crate::error::PipelineError;

/// Chat completions client implementing [`TextGenerator`].
///
/// Uses `OPENAI_API_KEY` from the environment by default; or provide config
/// via [`ChatClient::with_config`]. Task constraints are rendered into a
/// system message, the prompt becomes the user message.
pub struct ChatClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
}

impl ChatClient {
    /// Build client with default config (API key from `OPENAI_API_KEY` env).
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            temperature: None,
        }
    }

    /// Build client with custom config (e.g. custom API key or base URL).
    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
            temperature: None,
        }
    }

    /// Build client from the environment: loads `.env`, then honors
    /// `BURNISH_MODEL` and `BURNISH_API_BASE`.
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenv::dotenv().ok();
        let settings = env_config::Settings::from_env()
            .map_err(|e| PipelineError::Generation(format!("config error: {e}")))?;
        let mut config = OpenAIConfig::new();
        if let Some(base) = &settings.api_base {
            config = config.with_api_base(base.clone());
        }
        Ok(Self::with_config(config, settings.model))
    }

    /// Set temperature (0–2). Lower values are more deterministic.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn render_constraints(constraints: &BTreeMap<String, String>) -> Option<String> {
        if constraints.is_empty() {
            return None;
        }
        let lines: Vec<String> = constraints
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect();
        Some(format!("Honor these constraints:\n{}", lines.join("\n")))
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    async fn generate_text(
        &self,
        prompt: &str,
        constraints: &BTreeMap<String, String>,
    ) -> Result<String, PipelineError> {
        let trace_id = Uuid::new_v4().to_string();
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(2);
        if let Some(system) = Self::render_constraints(constraints) {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage::from(system.as_str()),
            ));
        }
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage::from(prompt),
        ));

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(messages);
        if let Some(t) = self.temperature {
            args.temperature(t);
        }
        let request = args
            .build()
            .map_err(|e| PipelineError::Generation(format!("request build failed: {e}")))?;

        debug!(
            trace_id = %trace_id,
            model = %self.model,
            prompt_len = prompt.len(),
            constraints = constraints.len(),
            temperature = ?self.temperature,
            "Chat completion create"
        );
        trace!(trace_id = %trace_id, prompt = %prompt, "Chat completion prompt");

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PipelineError::Generation(format!("chat API error: {e}")))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Generation("chat API returned no choices".to_string()))?;
        let content = choice.message.content.unwrap_or_default();
        trace!(trace_id = %trace_id, response_len = content.len(), "Chat completion response");
        if content.is_empty() {
            return Err(PipelineError::Generation(
                "chat API returned empty content".to_string(),
            ));
        }
        Ok(content)
    }
}
