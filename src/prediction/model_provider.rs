use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use super::{
    classifier::{Classifier, ForestClassifier},
    error::PredictionError,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Conventional artifact location, relative to the working directory.
pub const PRIMARY_MODEL_PATH: &str = "ml_models/water_quality_model.json";
/// Location used by the training script when run from the project root.
pub const FALLBACK_MODEL_PATH: &str = "model.json";

/// Pick the model artifact path: the configured value, else the first
/// conventional path that exists, else the primary path.
pub fn resolve_model_path(configured: Option<&Path>, base_dir: &Path) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }

    let primary = base_dir.join(PRIMARY_MODEL_PATH);
    let fallback = base_dir.join(FALLBACK_MODEL_PATH);

    if primary.exists() {
        primary
    } else if fallback.exists() {
        fallback
    } else {
        primary
    }
}

/// Lazily loads the classifier once and hands out shared handles.
///
/// A failed load leaves the cell empty, so the next call retries. Two
/// concurrent first loads may both read the file; the first stored handle is
/// the one everyone keeps.
pub struct ModelProvider {
    path: PathBuf,
    cached: OnceLock<Arc<dyn Classifier>>,
}

impl ModelProvider {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cached: OnceLock::new(),
        }
    }

    /// Provider with an already-loaded model.
    pub fn preloaded(model: Arc<dyn Classifier>) -> Self {
        let cached = OnceLock::new();
        let _ = cached.set(model);
        Self {
            path: PathBuf::new(),
            cached,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cached.get().is_some()
    }

    pub fn get_model(&self) -> Result<Arc<dyn Classifier>, PredictionError> {
        if let Some(model) = self.cached.get() {
            return Ok(Arc::clone(model));
        }

        let model = self.load()?;
        if self.cached.set(Arc::clone(&model)).is_err() {
            log_info!("model at {} was loaded concurrently; keeping the first copy", self.path.display());
        }

        Ok(self.cached.get().cloned().unwrap_or(model))
    }

    fn load(&self) -> Result<Arc<dyn Classifier>, PredictionError> {
        if !self.path.exists() {
            log_warn!("model artifact not found at {}", self.path.display());
            return Err(self.unavailable("file not found"));
        }

        let raw = fs::read_to_string(&self.path).map_err(|err| {
            log_warn!("failed to read model at {}: {err}", self.path.display());
            self.unavailable(&err.to_string())
        })?;

        let forest = ForestClassifier::from_json(&raw).map_err(|err| {
            log_warn!("failed to parse model at {}: {err:#}", self.path.display());
            self.unavailable(&format!("{err:#}"))
        })?;

        log_info!("loaded classifier from {}", self.path.display());
        Ok(Arc::new(forest))
    }

    fn unavailable(&self, reason: &str) -> PredictionError {
        PredictionError::ModelUnavailable {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_LEAF_FOREST: &str =
        r#"{ "n_classes": 3, "trees": [{ "nodes": [{ "value": [1.0, 0.0, 0.0] }] }] }"#;

    #[test]
    fn configured_path_always_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FALLBACK_MODEL_PATH), ONE_LEAF_FOREST).unwrap();
        let configured = dir.path().join("custom.json");

        assert_eq!(
            resolve_model_path(Some(&configured), dir.path()),
            configured
        );
    }

    #[test]
    fn falls_back_to_secondary_path_when_primary_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FALLBACK_MODEL_PATH), ONE_LEAF_FOREST).unwrap();

        assert_eq!(
            resolve_model_path(None, dir.path()),
            dir.path().join(FALLBACK_MODEL_PATH)
        );

        fs::create_dir_all(dir.path().join("ml_models")).unwrap();
        fs::write(dir.path().join(PRIMARY_MODEL_PATH), ONE_LEAF_FOREST).unwrap();
        assert_eq!(
            resolve_model_path(None, dir.path()),
            dir.path().join(PRIMARY_MODEL_PATH)
        );
    }

    #[test]
    fn defaults_to_primary_path_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_model_path(None, dir.path()),
            dir.path().join(PRIMARY_MODEL_PATH)
        );
    }

    #[test]
    fn missing_file_is_unavailable_and_retried_later() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let provider = ModelProvider::new(path.clone());

        assert!(matches!(
            provider.get_model(),
            Err(PredictionError::ModelUnavailable { .. })
        ));
        assert!(!provider.is_loaded());

        fs::write(&path, ONE_LEAF_FOREST).unwrap();
        let model = provider.get_model().expect("loads once the file appears");
        assert_eq!(model.predict(&[[7.0, 100.0]]).unwrap(), vec![0]);
        assert!(provider.is_loaded());
    }

    #[test]
    fn cached_handle_survives_file_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, ONE_LEAF_FOREST).unwrap();

        let provider = ModelProvider::new(path.clone());
        let first = provider.get_model().unwrap();
        fs::remove_file(&path).unwrap();
        let second = provider.get_model().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn malformed_artifact_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, "not a model").unwrap();

        let provider = ModelProvider::new(path);
        assert!(matches!(
            provider.get_model(),
            Err(PredictionError::ModelUnavailable { .. })
        ));
    }
}
