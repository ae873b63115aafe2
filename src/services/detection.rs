use std::path::PathBuf;

use image::DynamicImage;

use crate::config::{ModelConfig, ModelConfigUpdate, ModelInfo};
use crate::error::DetectError;
use crate::models::detect_types::{DetectionResult, ModelStatus};
use crate::services::classifier::interpret;
use crate::services::classifier::model_manager::ModelManager;
use crate::services::classifier::preprocess;

/// Orchestrates preprocess -> inference -> interpretation for one model.
///
/// Each instance owns its own model handle and config; independent
/// instances never interfere. `classify` never fails past its boundary:
/// internal errors are logged and turned into the default safe result,
/// so the caller always receives a usable classification.
pub struct DetectionService {
    manager: ModelManager,
}

impl DetectionService {
    /// Service over the default custom waste classifier config.
    pub fn new(model_dir: PathBuf) -> Self {
        Self::with_config(ModelConfig::default(), model_dir)
    }

    /// Primary construction path: explicit config plus the directory
    /// where downloaded model artifacts are cached.
    pub fn with_config(config: ModelConfig, model_dir: PathBuf) -> Self {
        // Validation failures are reported, not fatal; the caller may
        // still proceed and hit the fallback path at classify time.
        if !config.validate() {
            log::warn!("detection service constructed with an invalid model config");
        }
        Self {
            manager: ModelManager::new(config, model_dir),
        }
    }

    /// Classifies a decoded image. Resolves to a result on every input;
    /// any internal failure yields the default safe result.
    pub async fn classify(&self, image: &DynamicImage) -> DetectionResult {
        match self.try_classify(image).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("waste detection failed: {}; returning default result", e);
                interpret::fallback_result()
            }
        }
    }

    /// Classifies raw encoded bytes (file upload contents). Undecodable
    /// input takes the same never-fail path as any other error.
    pub async fn classify_bytes(&self, bytes: &[u8]) -> DetectionResult {
        match self.try_classify_bytes(bytes).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("waste detection failed: {}; returning default result", e);
                interpret::fallback_result()
            }
        }
    }

    async fn try_classify_bytes(&self, bytes: &[u8]) -> Result<DetectionResult, DetectError> {
        let image = image::load_from_memory(bytes)?;
        self.try_classify(&image).await
    }

    async fn try_classify(&self, image: &DynamicImage) -> Result<DetectionResult, DetectError> {
        let config = self.manager.config().await;
        let tensor = preprocess::preprocess(image, &config)?;
        let (raw, kind) = self.manager.predict(tensor).await?;
        Ok(interpret::interpret_raw(&raw, &config, kind))
    }

    /// Merges a partial config update and discards the loaded model so
    /// the next classification reloads from scratch.
    pub async fn update_config(&self, update: ModelConfigUpdate) {
        let merged = self.manager.config().await.merged(update);
        if !merged.validate() {
            log::warn!("config update produced an invalid model config");
        }
        self.manager.reset(Some(merged)).await;
    }

    pub async fn model_info(&self) -> ModelInfo {
        self.manager.config().await.model_info()
    }

    pub async fn status(&self) -> ModelStatus {
        self.manager.status().await
    }

    /// Times the model handle has been discarded by config changes.
    pub fn reload_count(&self) -> usize {
        self.manager.reload_count()
    }
}
