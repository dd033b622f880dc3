//! Process-wide registry of loaded local models

use std::path::Path;
use std::sync::{Arc, LazyLock};

use docqa_core::{Mode, ModelCache, ModelKey, Result};

use crate::bert::BertEmbedder;

static BERT_MODELS: LazyLock<ModelCache<BertEmbedder>> = LazyLock::new(ModelCache::new);

/// Models are keyed by id and directory, so two checkouts of one id stay apart
fn model_key(model_id: &str, model_dir: &Path) -> ModelKey {
    ModelKey::new(Mode::Local, format!("{}@{}", model_id, model_dir.display()))
}

/// Get the BERT model for `model_id`, loading it from `model_dir` on first use
///
/// Blocks while the weights are read; call from a blocking context.
pub fn bert_model(model_id: &str, model_dir: &Path, max_sequence_length: usize) -> Result<Arc<BertEmbedder>> {
    BERT_MODELS.get_or_try_init(&model_key(model_id, model_dir), || {
        BertEmbedder::load(model_dir, max_sequence_length).map(Arc::new)
    })
}

/// Whether the model for `model_id` from `model_dir` is already resident
pub fn is_loaded(model_id: &str, model_dir: &Path) -> bool {
    BERT_MODELS.contains(&model_key(model_id, model_dir))
}
