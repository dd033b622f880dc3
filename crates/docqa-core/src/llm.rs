//! Generator (LLM) trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Rough characters-per-token ratio used to turn token budgets into text budgets
pub const CHARS_PER_TOKEN: usize = 4;

/// Result of a text generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model_id: String,
}

/// Trait for LLM providers (hosted chat API, local model server, ...)
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for a fully assembled prompt
    async fn generate(&self, prompt: &str) -> Result<GenerationResult>;

    /// Get the model ID being used
    fn model_id(&self) -> &str;

    /// Context window of the model, in tokens
    fn context_window(&self) -> usize;

    /// Tokens reserved for the completion
    fn max_new_tokens(&self) -> usize;

    /// Characters available to the prompt once the completion is reserved
    fn prompt_budget(&self) -> usize {
        self.context_window()
            .saturating_sub(self.max_new_tokens())
            .saturating_mul(CHARS_PER_TOKEN)
    }
}
