//! On-device sentence embeddings with a BERT model

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

use docqa_core::{Embedder, Error, Result, check_embeddings};

use crate::registry;

/// Only the field we need to verify the output size before loading weights
#[derive(Deserialize)]
struct HiddenSize {
    hidden_size: usize,
}

/// A loaded sentence-transformers BERT model (e.g. all-MiniLM-L6-v2)
///
/// Produces attention-masked mean-pooled, L2-normalized embeddings.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimensions: usize,
}

fn model_load_error(path: &Path, what: &str, e: impl std::fmt::Display) -> Error {
    Error::ModelLoad(format!("failed to load {} from {}: {}", what, path.display(), e))
}

/// Map an inference failure, separating allocation failures from the rest
fn inference_error(e: candle_core::Error) -> Error {
    let message = e.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("out of memory") || lowered.contains("alloc") {
        Error::Resource(format!("embedding model ran out of memory: {}", message))
    } else {
        Error::Provider(format!("embedding inference failed: {}", message))
    }
}

impl BertEmbedder {
    /// Load tokenizer, config and safetensors weights from `model_dir`
    pub fn load(model_dir: &Path, max_sequence_length: usize) -> Result<Self> {
        let start = Instant::now();
        let device = Device::Cpu;

        if !model_dir.is_dir() {
            return Err(Error::ModelLoad(format!(
                "model directory {} does not exist",
                model_dir.display()
            )));
        }

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .map_err(|e| model_load_error(&config_path, "model config", e))?;
        let config: BertConfig = serde_json::from_str(&raw_config)
            .map_err(|e| model_load_error(&config_path, "model config", e))?;
        let HiddenSize { hidden_size } = serde_json::from_str(&raw_config)
            .map_err(|e| model_load_error(&config_path, "model config", e))?;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| model_load_error(&tokenizer_path, "tokenizer", e))?;
        tokenizer.with_padding(Some(PaddingParams::default()));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_sequence_length,
                ..Default::default()
            }))
            .map_err(|e| model_load_error(&tokenizer_path, "tokenizer", e))?;

        let weights_path = model_dir.join("model.safetensors");
        if !weights_path.is_file() {
            return Err(Error::ModelLoad(format!(
                "model weights {} not found",
                weights_path.display()
            )));
        }
        let weights = candle_core::safetensors::load(&weights_path, &device)
            .map_err(|e| model_load_error(&weights_path, "model weights", e))?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config)
            .map_err(|e| model_load_error(&weights_path, "model weights", e))?;

        info!(
            model_dir = %model_dir.display(),
            dimensions = hidden_size,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "embedding model loaded"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            dimensions: hidden_size,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed a batch of texts on the current thread
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::Provider(format!("tokenization failed: {}", e)))?;

        let ids = encodings
            .iter()
            .map(|enc| Tensor::new(enc.get_ids(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()
            .map_err(inference_error)?;
        let masks = encodings
            .iter()
            .map(|enc| Tensor::new(enc.get_attention_mask(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()
            .map_err(inference_error)?;

        self.forward_pooled(&ids, &masks).map_err(inference_error)
    }

    fn forward_pooled(&self, ids: &[Tensor], masks: &[Tensor]) -> candle_core::Result<Vec<Vec<f32>>> {
        let input_ids = Tensor::stack(ids, 0)?;
        let attention_mask = Tensor::stack(masks, 0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // [B, T, H] -> masked mean over T -> [B, H]
        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?;
        let mean = summed.broadcast_div(&counts)?;

        let norm = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + 1e-12)?;
        mean.broadcast_div(&norm)?.to_vec2::<f32>()
    }
}

/// Local-mode [`Embedder`] that loads its BERT model lazily on first use
///
/// The loaded model is shared process-wide through the model registry, so
/// rebuilding a provider does not reload the weights.
pub struct LocalEmbedder {
    model_id: String,
    model_dir: PathBuf,
    dimensions: usize,
    max_sequence_length: usize,
}

impl LocalEmbedder {
    pub fn new(
        model_id: impl Into<String>,
        model_dir: impl Into<PathBuf>,
        dimensions: usize,
        max_sequence_length: usize,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            model_dir: model_dir.into(),
            dimensions,
            max_sequence_length,
        }
    }

    async fn model(&self) -> Result<Arc<BertEmbedder>> {
        let model_id = self.model_id.clone();
        let model_dir = self.model_dir.clone();
        let max_len = self.max_sequence_length;

        let model = tokio::task::spawn_blocking(move || {
            registry::bert_model(&model_id, &model_dir, max_len)
        })
        .await??;

        if model.dimensions() != self.dimensions {
            warn!(
                model = %self.model_id,
                configured = self.dimensions,
                actual = model.dimensions(),
                "embedding dimensions do not match configuration"
            );
            return Err(Error::ModelLoad(format!(
                "model {} produces {}-dimensional vectors but {} were configured",
                self.model_id,
                model.dimensions(),
                self.dimensions
            )));
        }

        Ok(model)
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model().await?;
        let batch = texts.to_vec();
        let count = batch.len();
        debug!(model = %self.model_id, batch_size = count, "embedding batch locally");

        let vectors = tokio::task::spawn_blocking(move || model.embed(&batch)).await??;
        check_embeddings(&vectors, count, self.dimensions)?;
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_directory_is_model_load_error() {
        let err = BertEmbedder::load(Path::new("/nonexistent/minilm"), 256)
            .err()
            .unwrap();
        assert!(matches!(err, Error::ModelLoad(_)));
    }

    const TINY_CONFIG: &str = r#"{
        "vocab_size": 8,
        "hidden_size": 4,
        "num_hidden_layers": 1,
        "num_attention_heads": 1,
        "intermediate_size": 8,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.0,
        "max_position_embeddings": 16,
        "type_vocab_size": 2,
        "initializer_range": 0.02,
        "layer_norm_eps": 1e-12,
        "pad_token_id": 0
    }"#;

    const TINY_TOKENIZER: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {"type": "WordLevel", "vocab": {"[UNK]": 0, "hello": 1}, "unk_token": "[UNK]"}
    }"#;

    #[test]
    fn test_corrupt_weights_are_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), TINY_CONFIG).unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), TINY_TOKENIZER).unwrap();
        std::fs::write(dir.path().join("model.safetensors"), b"not safetensors").unwrap();

        let err = BertEmbedder::load(dir.path(), 16).err().unwrap();
        match err {
            Error::ModelLoad(message) => assert!(message.contains("model weights")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bad_config_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "not json").unwrap();

        let err = BertEmbedder::load(dir.path(), 256).err().unwrap();
        match err {
            Error::ModelLoad(message) => assert!(message.contains("model config")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_local_embedder_surfaces_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = LocalEmbedder::new("test/missing-model", dir.path().join("absent"), 384, 128);

        let err = embedder
            .embed_batch(&["hello".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModelLoad(_)));
        assert_eq!(embedder.dimensions(), 384);
    }
}
