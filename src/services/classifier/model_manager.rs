use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use tokio::sync::Mutex;

use crate::config::ModelConfig;
use crate::error::DetectError;
use crate::models::detect_types::{ModelKind, ModelStatus, RawOutput};

/// Fixed public fallback: a general-purpose ImageNet classifier from the
/// model hub, used when the configured model cannot be loaded.
pub const FALLBACK_MODEL_URL: &str =
    "https://huggingface.co/Xenova/mobilenet_v2_1.0_224/resolve/main/onnx/model.onnx";

const CUSTOM_CACHE_FILE: &str = "custom-model.onnx";
const FALLBACK_CACHE_FILE: &str = "mobilenet-v2-fallback.onnx";

/// One entry in the ordered load plan. Strategies are tried in sequence;
/// adding another fallback is a data change, not a control-flow change.
#[derive(Debug, Clone)]
struct LoadStrategy {
    kind: ModelKind,
    locator: String,
}

impl LoadStrategy {
    fn cache_file(&self) -> &'static str {
        match self.kind {
            ModelKind::Custom => CUSTOM_CACHE_FILE,
            ModelKind::Fallback => FALLBACK_CACHE_FILE,
        }
    }
}

fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// Owns the loaded inference session and its lifecycle: ordered
/// primary-then-fallback loading, on-demand (re)load, and the forward
/// pass. At most one session is live at a time.
#[derive(Clone)]
pub struct ModelManager {
    pub model_dir: PathBuf,
    config: Arc<Mutex<ModelConfig>>,
    model: Arc<std::sync::Mutex<Option<(Session, ModelKind)>>>,
    // Serializes concurrent load attempts so a second caller waits for
    // the in-flight load instead of fetching the artifacts again.
    load_gate: Arc<Mutex<()>>,
    loading: Arc<Mutex<bool>>,
    error: Arc<Mutex<Option<String>>>,
    reload_count: Arc<AtomicUsize>,
}

impl ModelManager {
    pub fn new(config: ModelConfig, model_dir: PathBuf) -> Self {
        Self {
            model_dir,
            config: Arc::new(Mutex::new(config)),
            model: Arc::new(std::sync::Mutex::new(None)),
            load_gate: Arc::new(Mutex::new(())),
            loading: Arc::new(Mutex::new(false)),
            error: Arc::new(Mutex::new(None)),
            reload_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn config(&self) -> ModelConfig {
        self.config.lock().await.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.model.lock().unwrap().is_some()
    }

    /// Which load strategy produced the live session, if any.
    pub fn loaded_kind(&self) -> Option<ModelKind> {
        self.model.lock().unwrap().as_ref().map(|(_, kind)| *kind)
    }

    pub async fn is_loading(&self) -> bool {
        *self.loading.lock().await
    }

    pub async fn get_error(&self) -> Option<String> {
        self.error.lock().await.clone()
    }

    /// Times `reset` has discarded the session. Lets callers observe that
    /// a config change really forces a reload.
    pub fn reload_count(&self) -> usize {
        self.reload_count.load(Ordering::Relaxed)
    }

    /// True when the configured model artifact is present locally,
    /// either as a file path or as a cached download.
    pub async fn is_downloaded(&self) -> bool {
        let config = self.config.lock().await;
        if is_remote(&config.model_path) {
            self.model_dir.join(CUSTOM_CACHE_FILE).exists()
        } else {
            Path::new(&config.model_path).exists()
        }
    }

    pub async fn status(&self) -> ModelStatus {
        ModelStatus {
            downloaded: self.is_downloaded().await,
            loading: self.is_loading().await,
            ready: self.is_ready(),
            error: self.get_error().await,
        }
    }

    /// Discards the session and, when given, swaps in a new config.
    /// The next `predict` or `ensure_loaded` call reloads from scratch.
    /// Safe to call with no model loaded.
    pub async fn reset(&self, new_config: Option<ModelConfig>) {
        if let Some(config) = new_config {
            *self.config.lock().await = config;
        }
        *self.model.lock().unwrap() = None;
        *self.error.lock().await = None;
        self.reload_count.fetch_add(1, Ordering::Relaxed);
    }

    async fn load_plan(&self) -> Vec<LoadStrategy> {
        let config = self.config.lock().await;
        vec![
            LoadStrategy {
                kind: ModelKind::Custom,
                locator: config.model_path.clone(),
            },
            LoadStrategy {
                kind: ModelKind::Fallback,
                locator: FALLBACK_MODEL_URL.to_string(),
            },
        ]
    }

    /// Idempotent: returns immediately when a session is already live.
    /// Otherwise walks the load plan in order; the first strategy that
    /// yields a session wins and its kind is recorded. Only after every
    /// strategy has failed does this surface a fatal `ModelLoad` error.
    pub async fn ensure_loaded(&self) -> Result<ModelKind, DetectError> {
        if let Some(kind) = self.loaded_kind() {
            return Ok(kind);
        }

        let _gate = self.load_gate.lock().await;
        // A concurrent caller may have finished the load while this one
        // waited on the gate.
        if let Some(kind) = self.loaded_kind() {
            return Ok(kind);
        }

        *self.loading.lock().await = true;
        *self.error.lock().await = None;

        let result = self.load_from_plan().await;

        *self.loading.lock().await = false;
        if let Err(ref e) = result {
            *self.error.lock().await = Some(e.to_string());
        }

        result
    }

    async fn load_from_plan(&self) -> Result<ModelKind, DetectError> {
        let mut last_error: Option<DetectError> = None;

        for strategy in self.load_plan().await {
            match self.load_strategy(&strategy).await {
                Ok(session) => {
                    log::info!(
                        "loaded {:?} model from {}",
                        strategy.kind,
                        strategy.locator
                    );
                    *self.model.lock().unwrap() = Some((session, strategy.kind));
                    return Ok(strategy.kind);
                }
                Err(e) => {
                    log::warn!(
                        "{:?} model at {} unavailable: {}",
                        strategy.kind,
                        strategy.locator,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(DetectError::ModelLoad(format!(
            "all model sources failed, last error: {}",
            last_error.map_or_else(|| "empty load plan".to_string(), |e| e.to_string())
        )))
    }

    async fn load_strategy(&self, strategy: &LoadStrategy) -> Result<Session, DetectError> {
        let artifact = self.resolve_artifact(strategy).await?;
        build_session(artifact).await
    }

    /// Maps a locator onto a local artifact path, downloading remote
    /// models into the cache directory (skipped when already cached).
    async fn resolve_artifact(&self, strategy: &LoadStrategy) -> Result<PathBuf, DetectError> {
        if !is_remote(&strategy.locator) {
            let path = PathBuf::from(&strategy.locator);
            if !path.exists() {
                return Err(DetectError::ModelLoad(format!(
                    "model file {} does not exist",
                    path.display()
                )));
            }
            return Ok(path);
        }

        let dest = self.model_dir.join(strategy.cache_file());
        if dest.exists() {
            return Ok(dest);
        }

        std::fs::create_dir_all(&self.model_dir).map_err(|e| {
            DetectError::ModelLoad(format!("failed to create model directory: {}", e))
        })?;
        download_file(&strategy.locator, &dest).await?;
        Ok(dest)
    }

    /// Runs one forward pass, loading the model on demand. No retry: an
    /// inference failure is the final outcome for the request.
    pub async fn predict(&self, input: Array4<f32>) -> Result<(RawOutput, ModelKind), DetectError> {
        self.ensure_loaded().await?;

        let mut guard = self.model.lock().unwrap();
        let (session, kind) = guard
            .as_mut()
            .ok_or_else(|| DetectError::Inference("model handle was discarded".to_string()))?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| DetectError::Inference("model declares no inputs".to_string()))?;

        let input_tensor = Value::from_array(input)
            .map_err(|e| DetectError::Inference(format!("failed to create input tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![input_name.as_str() => input_tensor])
            .map_err(|e| DetectError::Inference(e.to_string()))?;

        let output_value = outputs
            .values()
            .next()
            .ok_or_else(|| DetectError::Inference("model produced no outputs".to_string()))?;

        let (shape, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::Inference(format!("failed to extract output: {}", e)))?;

        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok((RawOutput::new(shape, data.to_vec()), *kind))
    }
}

async fn build_session(model_path: PathBuf) -> Result<Session, DetectError> {
    tokio::task::spawn_blocking(move || -> Result<Session, DetectError> {
        let _ = ort::init().with_name("waste-sense").commit();

        let session = Session::builder()
            .map_err(|e| DetectError::ModelLoad(format!("failed to create session builder: {}", e)))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| DetectError::ModelLoad(format!("failed to set optimization level: {}", e)))?
            .with_execution_providers([
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])
            .map_err(|e| DetectError::ModelLoad(format!("failed to register execution provider: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| {
                DetectError::ModelLoad(format!(
                    "failed to load model {}: {}",
                    model_path.display(),
                    e
                ))
            })?;

        Ok(session)
    })
    .await
    .map_err(|e| DetectError::ModelLoad(format!("model loading task failed: {}", e)))?
}

async fn download_file(url: &str, dest: &Path) -> Result<(), DetectError> {
    log::info!("downloading model artifact from {}", url);

    let response = reqwest::get(url)
        .await
        .map_err(|e| DetectError::ModelLoad(format!("failed to fetch {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(DetectError::ModelLoad(format!(
            "failed to download {}: HTTP {}",
            url,
            response.status()
        )));
    }

    // Stream into a scratch file and rename only on completion, so an
    // interrupted download never leaves a truncated artifact at `dest`
    // where later loads would treat it as a valid cached model.
    let scratch = scratch_path(dest);
    if let Err(e) = write_body(response, &scratch).await {
        let _ = tokio::fs::remove_file(&scratch).await;
        return Err(e);
    }
    tokio::fs::rename(&scratch, dest).await.map_err(|e| {
        DetectError::ModelLoad(format!("failed to move model into cache: {}", e))
    })?;

    log::info!("cached model artifact at {}", dest.display());
    Ok(())
}

fn scratch_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

async fn write_body(response: reqwest::Response, dest: &Path) -> Result<(), DetectError> {
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| DetectError::ModelLoad(format!("failed to create {}: {}", dest.display(), e)))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| DetectError::ModelLoad(format!("download interrupted: {}", e)))?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
            .await
            .map_err(|e| DetectError::ModelLoad(format!("failed to write model file: {}", e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_model_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("waste-sense-test-{}-{}", tag, std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        dir
    }

    #[test]
    fn locator_scheme_detection() {
        assert!(is_remote("https://example.com/model.onnx"));
        assert!(is_remote("http://example.com/model.onnx"));
        assert!(!is_remote("models/waste_classifier/model.onnx"));
        assert!(!is_remote("/abs/path/model.onnx"));
    }

    #[tokio::test]
    async fn load_plan_orders_custom_before_fallback() {
        let manager = ModelManager::new(ModelConfig::default(), temp_model_dir("plan"));
        let plan = manager.load_plan().await;
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].kind, ModelKind::Custom);
        assert_eq!(plan[0].locator, ModelConfig::default().model_path);
        assert_eq!(plan[1].kind, ModelKind::Fallback);
        assert_eq!(plan[1].locator, FALLBACK_MODEL_URL);
    }

    #[tokio::test]
    async fn missing_local_artifact_is_a_load_error() {
        let manager = ModelManager::new(ModelConfig::default(), temp_model_dir("missing"));
        let strategy = LoadStrategy {
            kind: ModelKind::Custom,
            locator: "does/not/exist.onnx".to_string(),
        };
        let err = manager.resolve_artifact(&strategy).await.unwrap_err();
        assert!(matches!(err, DetectError::ModelLoad(_)));
    }

    #[tokio::test]
    async fn reset_discards_state_and_counts_reloads() {
        let manager = ModelManager::new(ModelConfig::default(), temp_model_dir("reset"));
        assert_eq!(manager.reload_count(), 0);
        assert!(!manager.is_ready());

        // Safe with no model loaded.
        manager.reset(None).await;
        assert_eq!(manager.reload_count(), 1);

        let new_config = ModelConfig {
            model_path: "other/model.onnx".to_string(),
            ..ModelConfig::default()
        };
        manager.reset(Some(new_config.clone())).await;
        assert_eq!(manager.reload_count(), 2);
        assert_eq!(manager.config().await, new_config);
        assert!(manager.loaded_kind().is_none());
    }

    #[tokio::test]
    async fn failed_download_leaves_no_cache_file() {
        let dir = temp_model_dir("partial");
        let dest = dir.join(FALLBACK_CACHE_FILE);
        let _ = std::fs::remove_file(&dest);

        // Discard port on loopback: the fetch fails without touching the
        // network at large.
        let err = download_file("http://127.0.0.1:9/model.onnx", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::ModelLoad(_)));
        assert!(!dest.exists(), "failed download must not populate the cache");
        assert!(!scratch_path(&dest).exists(), "scratch file must be cleaned up");
    }

    #[tokio::test]
    async fn leftover_scratch_file_is_not_a_cached_artifact() {
        let dir = temp_model_dir("scratch");
        let config = ModelConfig {
            model_path: "https://example.com/model.onnx".to_string(),
            ..ModelConfig::default()
        };
        let manager = ModelManager::new(config, dir.clone());

        // Simulates a download that died mid-stream before the fix-up
        // rename: only the scratch file is present.
        let dest = dir.join(CUSTOM_CACHE_FILE);
        let _ = std::fs::remove_file(&dest);
        std::fs::write(scratch_path(&dest), b"truncated bytes").unwrap();

        assert!(!manager.is_downloaded().await);
    }

    #[test]
    fn scratch_path_appends_to_the_full_file_name() {
        let dest = PathBuf::from("/cache/custom-model.onnx");
        assert_eq!(
            scratch_path(&dest),
            PathBuf::from("/cache/custom-model.onnx.part")
        );
    }

    #[tokio::test]
    async fn status_reflects_unloaded_manager() {
        let manager = ModelManager::new(ModelConfig::default(), temp_model_dir("status"));
        let status = manager.status().await;
        assert!(!status.ready);
        assert!(!status.loading);
        assert!(status.error.is_none());
    }
}
