//! Backend selection for the two modes

use std::sync::Arc;
use tracing::info;

use docqa_core::{Embedder, Mode, Result, env_lookup};
use docqa_local::{HashingEmbedder, LocalConfig, LocalEmbedder, LocalEmbedderKind, LocalGenerator};
use docqa_openai::{OpenAIClient, OpenAIConfig, OpenAIEmbedder, OpenAIGenerator};
use docqa_rag::ModelProvider;

/// Build the embedder and generator pair for a mode from the environment
pub fn build_provider(mode: Mode) -> Result<ModelProvider> {
    build_provider_with(mode, env_lookup)
}

pub fn build_provider_with<F>(mode: Mode, lookup: F) -> Result<ModelProvider>
where
    F: Fn(&str) -> Option<String>,
{
    match mode {
        Mode::Hosted => {
            let client = Arc::new(OpenAIClient::new(OpenAIConfig::from_lookup(lookup)?)?);
            info!(
                embedding_model = %client.config().embedding_model,
                chat_model = %client.config().chat_model,
                "using hosted backends"
            );
            Ok(ModelProvider::new(
                mode,
                Arc::new(OpenAIEmbedder::new(client.clone())),
                Arc::new(OpenAIGenerator::new(client)),
            ))
        }
        Mode::Local => {
            let config = LocalConfig::from_lookup(lookup)?;
            let embedder: Arc<dyn Embedder> = match config.embedder {
                LocalEmbedderKind::Bert => Arc::new(LocalEmbedder::new(
                    config.embedding_model.clone(),
                    config.model_dir.clone(),
                    config.embedding_dimensions,
                    config.max_sequence_length,
                )),
                LocalEmbedderKind::Hashing => {
                    Arc::new(HashingEmbedder::new(config.embedding_dimensions))
                }
            };
            info!(
                embedder = ?config.embedder,
                llm = %config.llm_model,
                url = %config.llm_url,
                "using local backends"
            );
            Ok(ModelProvider::new(
                mode,
                embedder,
                Arc::new(LocalGenerator::new(&config)?),
            ))
        }
    }
}
