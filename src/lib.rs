//! Waste segregation classifier core.
//!
//! The pipeline is preprocess -> inference -> interpretation: an uploaded
//! image becomes a normalized NHWC tensor, a loaded ONNX session runs one
//! forward pass, and the raw output is mapped onto a wet/dry result with
//! example items and disposal advice. Model loading tries the configured
//! custom model first and falls back to a public general-purpose
//! classifier; the top-level `classify` operation never fails visibly.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::{ModelConfig, ModelConfigUpdate, ModelInfo, NormalizeRange, Preprocessing, ResizeMethod};
pub use error::DetectError;
pub use models::detect_types::{DetectionResult, ModelKind, ModelStatus, RawOutput, WasteCategory};
pub use services::classifier::interpret::{fallback_result, interpret, interpret_raw, ModelOutput};
pub use services::classifier::model_manager::{ModelManager, FALLBACK_MODEL_URL};
pub use services::classifier::preprocess::preprocess;
pub use services::detection::DetectionService;
pub use services::remote::{HealthStatus, RemoteClassification, RemoteClassifier};
