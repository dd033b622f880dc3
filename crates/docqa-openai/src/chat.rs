//! Hosted chat completion backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use docqa_core::{Error, GenerationResult, Generator, Result};

use crate::client::OpenAIClient;

/// A [`Generator`] backed by the `/chat/completions` endpoint
pub struct OpenAIGenerator {
    client: Arc<OpenAIClient>,
    model: String,
    context_window: usize,
    max_new_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAIGenerator {
    /// Model constants
    pub const GPT_35_TURBO: &'static str = "gpt-3.5-turbo";
    pub const GPT_4O_MINI: &'static str = "gpt-4o-mini";

    const SYSTEM_PROMPT: &'static str = "You're a helpful assistant.";

    pub fn new(client: Arc<OpenAIClient>) -> Self {
        let config = client.config();
        let model = config.chat_model.clone();
        let context_window = config.context_window;
        let max_new_tokens = config.max_new_tokens;
        let temperature = config.temperature;
        Self {
            client,
            model,
            context_window,
            max_new_tokens,
            temperature,
        }
    }

    /// Set the model to use for generation
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model = model_id.into();
        self
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: Self::SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_new_tokens,
        }
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    async fn generate(&self, prompt: &str) -> Result<GenerationResult> {
        debug!(
            provider = "openai",
            model = %self.model,
            prompt_chars = prompt.len(),
            "requesting chat completion"
        );

        let request = self.build_request(prompt);
        let response: ChatResponse = self.client.post_json("chat/completions", &request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| Error::Provider("Empty response from OpenAI API".to_string()))?;

        Ok(GenerationResult {
            text,
            model_id: self.model.clone(),
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    fn max_new_tokens(&self) -> usize {
        self.max_new_tokens
    }
}
