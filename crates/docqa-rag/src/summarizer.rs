//! Short summaries of the leading chunks of a session

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use docqa_core::{Chunk, Error, Generator, Result, RetryPolicy};

use crate::generation::generate_within;
use crate::prompt::summary_prompt;

/// Summary of the first chunks of the loaded documents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub text: String,
    pub chunks_summarized: usize,
    pub model_id: String,
}

/// Summarize each chunk separately and join the parts with blank lines
pub async fn summarize_chunks(
    chunks: &[Chunk],
    generator: &dyn Generator,
    timeout: Duration,
    retry: &RetryPolicy,
) -> Result<Summary> {
    if chunks.is_empty() {
        return Err(Error::InvalidState("no document text to summarize".to_string()));
    }

    let budget = generator.prompt_budget();
    let mut parts = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        debug!(file = %chunk.source(), chunk = chunk.ordinal, "summarizing chunk");
        let prompt = summary_prompt(&chunk.text, budget);
        let result = generate_within(generator, &prompt, timeout, retry).await?;
        parts.push(result.text);
    }

    info!(chunks = chunks.len(), model = %generator.model_id(), "summary generated");
    Ok(Summary {
        text: parts.join("\n\n"),
        chunks_summarized: chunks.len(),
        model_id: generator.model_id().to_string(),
    })
}
