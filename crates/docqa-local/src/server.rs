//! Generation through a locally running model server (Ollama protocol)

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use docqa_core::{Error, GenerationResult, Generator, Result};

use crate::config::LocalConfig;

/// A [`Generator`] that calls `POST {llm_url}/api/generate` without streaming
pub struct LocalGenerator {
    client: Client,
    base_url: String,
    model: String,
    context_window: usize,
    max_new_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: usize,
    num_ctx: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ServerError {
    error: String,
}

impl LocalGenerator {
    pub fn new(config: &LocalConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.llm_url.trim_end_matches('/').to_string(),
            model: config.llm_model.clone(),
            context_window: config.context_window,
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
        })
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: self.max_new_tokens,
                num_ctx: self.context_window,
                temperature: self.temperature,
            },
        }
    }
}

fn is_out_of_memory(detail: &str) -> bool {
    let lowered = detail.to_lowercase();
    lowered.contains("out of memory") || lowered.contains("more system memory")
}

/// Map a failed model-server response to the error taxonomy
pub(crate) fn classify_response(status: StatusCode, model: &str, body: &str) -> Error {
    let detail = serde_json::from_str::<ServerError>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.trim().to_string());

    if is_out_of_memory(&detail) {
        return Error::Resource(format!("local model {} does not fit in memory: {}", model, detail));
    }

    match status {
        StatusCode::NOT_FOUND => Error::ModelLoad(format!(
            "local model {} is not available on the model server: {}",
            model, detail
        )),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            Error::Timeout(format!("local model server timed out: {}", detail))
        }
        StatusCode::INTERNAL_SERVER_ERROR if detail.to_lowercase().contains("load") => {
            Error::ModelLoad(format!("local model {} failed to load: {}", model, detail))
        }
        _ => Error::Provider(format!("local model server returned {}: {}", status, detail)),
    }
}

/// Map a transport failure, treating an unreachable server as a missing model
fn classify_transport(e: reqwest::Error, url: &str) -> Error {
    if e.is_connect() {
        Error::ModelLoad(format!("local model server at {} is not reachable: {}", url, e))
    } else if e.is_timeout() {
        Error::Timeout(format!("local model server timed out: {}", e))
    } else {
        Error::Network(e.to_string())
    }
}

#[async_trait]
impl Generator for LocalGenerator {
    async fn generate(&self, prompt: &str) -> Result<GenerationResult> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(
            provider = "local",
            model = %self.model,
            prompt_chars = prompt.len(),
            "requesting local generation"
        );

        let response = self
            .client
            .post(&url)
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| {
                error!(provider = "local", error = %e, "request failed");
                classify_transport(e, &self.base_url)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(provider = "local", %status, "model server error");
            return Err(classify_response(status, &self.model, &body));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            Error::Serialization(format!("failed to parse model server response: {}", e))
        })?;

        let text = body.response.trim().to_string();
        if text.is_empty() {
            return Err(Error::Provider(format!(
                "local model {} returned an empty response",
                self.model
            )));
        }

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
