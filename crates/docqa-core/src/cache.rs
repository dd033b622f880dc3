//! Process-wide cache for loaded models

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::{Error, Mode, Result};

/// Identifies one loaded model instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub mode: Mode,
    pub model_id: String,
}

impl ModelKey {
    pub fn new(mode: Mode, model_id: impl Into<String>) -> Self {
        Self {
            mode,
            model_id: model_id.into(),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mode, self.model_id)
    }
}

/// Init-on-first-use cache of shared, read-only model instances
///
/// Entries live for the rest of the process. Initialisation happens under the
/// cache lock, so concurrent first uses of the same key load the model once.
pub struct ModelCache<T: ?Sized> {
    entries: Mutex<HashMap<ModelKey, Arc<T>>>,
}

impl<T: ?Sized> ModelCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached instance for `key`, loading it with `init` on first use
    pub fn get_or_try_init<F>(&self, key: &ModelKey, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<Arc<T>>,
    {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| Error::Resource(format!("Lock error: {}", e)))?;

        if let Some(model) = entries.get(key) {
            debug!(model = %key, "model cache hit");
            return Ok(model.clone());
        }

        let model = init()?;
        info!(model = %key, "model loaded");
        entries.insert(key.clone(), model.clone());
        Ok(model)
    }

    pub fn contains(&self, key: &ModelKey) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized> Default for ModelCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_once_per_key() {
        let cache: ModelCache<String> = ModelCache::new();
        let key = ModelKey::new(Mode::Local, "all-MiniLM-L6-v2");
        let mut loads = 0;

        let first = cache
            .get_or_try_init(&key, || {
                loads += 1;
                Ok(Arc::new("weights".to_string()))
            })
            .unwrap();
        let second = cache
            .get_or_try_init(&key, || {
                loads += 1;
                Ok(Arc::new("other".to_string()))
            })
            .unwrap();

        assert_eq!(loads, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.contains(&key));
    }

    #[test]
    fn test_mode_is_part_of_key() {
        let cache: ModelCache<String> = ModelCache::new();
        cache
            .get_or_try_init(&ModelKey::new(Mode::Local, "m"), || Ok(Arc::new("a".to_string())))
            .unwrap();
        cache
            .get_or_try_init(&ModelKey::new(Mode::Hosted, "m"), || Ok(Arc::new("b".to_string())))
            .unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache: ModelCache<String> = ModelCache::new();
        let key = ModelKey::new(Mode::Local, "missing");

        let err = cache
            .get_or_try_init(&key, || Err(Error::ModelLoad("no weights".to_string())))
            .unwrap_err();
        assert!(matches!(err, Error::ModelLoad(_)));
        assert!(cache.is_empty());
    }
}
