use serde::{Deserialize, Serialize};

use crate::error::DetectError;

/// Resampling filter used when scaling the input image to the model's
/// spatial dimensions. Bilinear is the only method the default config
/// exercises; the others map to the equivalent `image` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMethod {
    Bilinear,
    Nearest,
    Bicubic,
}

impl ResizeMethod {
    pub(crate) fn filter(self) -> image::imageops::FilterType {
        match self {
            ResizeMethod::Bilinear => image::imageops::FilterType::Triangle,
            ResizeMethod::Nearest => image::imageops::FilterType::Nearest,
            ResizeMethod::Bicubic => image::imageops::FilterType::CatmullRom,
        }
    }
}

/// Target range for pixel normalization. Closed set: models are trained
/// against one of these two conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeRange {
    /// Divide by 255.
    #[serde(rename = "zero_to_one")]
    ZeroToOne,
    /// Divide by 127.5, subtract 1.
    #[serde(rename = "minus_one_to_one")]
    MinusOneToOne,
}

impl NormalizeRange {
    pub fn bounds(self) -> (f32, f32) {
        match self {
            NormalizeRange::ZeroToOne => (0.0, 1.0),
            NormalizeRange::MinusOneToOne => (-1.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preprocessing {
    pub normalize: bool,
    pub normalize_range: NormalizeRange,
    pub resize_method: ResizeMethod,
}

/// Immutable description of a classification model: where its artifacts
/// live, what input it expects, and what its outputs mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Locator for the model artifact: an http(s) URL or a local file path.
    pub model_path: String,
    /// Expected spatial input as (width, height).
    pub input_size: [u32; 2],
    pub num_classes: usize,
    /// Class names in training-label order; length must equal `num_classes`.
    pub class_names: Vec<String>,
    pub preprocessing: Preprocessing,
}

impl Default for ModelConfig {
    /// The custom binary waste classifier: single sigmoid output,
    /// 200x200 input, [0,1] normalization.
    fn default() -> Self {
        Self {
            model_path: "models/waste_classifier/model.onnx".to_string(),
            input_size: [200, 200],
            num_classes: 2,
            class_names: vec!["dry".to_string(), "wet".to_string()],
            preprocessing: Preprocessing {
                normalize: true,
                normalize_range: NormalizeRange::ZeroToOne,
                resize_method: ResizeMethod::Bilinear,
            },
        }
    }
}

impl ModelConfig {
    /// Preset for models trained with ImageNet-style [-1,1] scaling.
    pub fn imagenet() -> Self {
        Self {
            preprocessing: Preprocessing {
                normalize: true,
                normalize_range: NormalizeRange::MinusOneToOne,
                resize_method: ResizeMethod::Bilinear,
            },
            ..Self::default()
        }
    }

    /// Preset for models that consume raw 0-255 pixel values.
    pub fn raw() -> Self {
        Self {
            preprocessing: Preprocessing {
                normalize: false,
                normalize_range: NormalizeRange::ZeroToOne,
                resize_method: ResizeMethod::Bilinear,
            },
            ..Self::default()
        }
    }

    /// Returns every violated invariant as a human-readable message.
    /// Pure: never mutates the config, never logs.
    pub fn violations(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.model_path.is_empty() {
            errors.push("Model path is required".to_string());
        }
        if self.input_size.iter().any(|&d| d == 0) {
            errors.push("Input size entries must be positive [width, height]".to_string());
        }
        if self.num_classes == 0 {
            errors.push("Number of classes must be positive".to_string());
        }
        if self.class_names.is_empty() {
            errors.push("Class names must be a non-empty list".to_string());
        }
        if self.class_names.len() != self.num_classes {
            errors.push("Number of class names must match num_classes".to_string());
        }

        errors
    }

    /// True iff the config satisfies every invariant. Violations are
    /// logged as a diagnostic side channel.
    pub fn validate(&self) -> bool {
        let errors = self.violations();
        if errors.is_empty() {
            return true;
        }
        for error in &errors {
            log::error!("model config: {}", error);
        }
        false
    }

    pub fn validated(&self) -> Result<(), DetectError> {
        let errors = self.violations();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DetectError::ConfigInvalid(errors))
        }
    }

    /// Debug/introspection view: mirrors the config fields unmodified.
    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_path: self.model_path.clone(),
            input_size: self.input_size,
            num_classes: self.num_classes,
            class_names: self.class_names.clone(),
            preprocessing: self.preprocessing,
        }
    }

    /// Merges a partial update field-by-field, leaving unset fields alone.
    pub fn merged(&self, update: ModelConfigUpdate) -> ModelConfig {
        ModelConfig {
            model_path: update.model_path.unwrap_or_else(|| self.model_path.clone()),
            input_size: update.input_size.unwrap_or(self.input_size),
            num_classes: update.num_classes.unwrap_or(self.num_classes),
            class_names: update.class_names.unwrap_or_else(|| self.class_names.clone()),
            preprocessing: update.preprocessing.unwrap_or(self.preprocessing),
        }
    }
}

/// Snapshot of a config's fields for callers that should not hold the
/// config itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_path: String,
    pub input_size: [u32; 2],
    pub num_classes: usize,
    pub class_names: Vec<String>,
    pub preprocessing: Preprocessing,
}

/// Partial config for `DetectionService::update_config`; any field left
/// `None` keeps its current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfigUpdate {
    pub model_path: Option<String>,
    pub input_size: Option<[u32; 2]>,
    pub num_classes: Option<usize>,
    pub class_names: Option<Vec<String>>,
    pub preprocessing: Option<Preprocessing>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ModelConfig::default();
        assert!(config.violations().is_empty());
        assert!(config.validate());
        assert!(config.validated().is_ok());
    }

    #[test]
    fn presets_are_valid() {
        assert!(ModelConfig::imagenet().validate());
        assert!(ModelConfig::raw().validate());
        assert_eq!(
            ModelConfig::imagenet().preprocessing.normalize_range,
            NormalizeRange::MinusOneToOne
        );
        assert!(!ModelConfig::raw().preprocessing.normalize);
    }

    #[test]
    fn class_name_count_mismatch_is_reported() {
        let config = ModelConfig {
            class_names: vec!["dry".to_string()],
            ..ModelConfig::default()
        };
        assert!(!config.validate());
        let errors = config.violations();
        assert!(errors.iter().any(|e| e.contains("match num_classes")));
    }

    #[test]
    fn empty_path_and_zero_dimensions_are_reported() {
        let config = ModelConfig {
            model_path: String::new(),
            input_size: [0, 200],
            num_classes: 0,
            class_names: vec![],
            ..ModelConfig::default()
        };
        let errors = config.violations();
        assert!(errors.iter().any(|e| e.contains("path")));
        assert!(errors.iter().any(|e| e.contains("positive [width, height]")));
        assert!(errors.iter().any(|e| e.contains("classes must be positive")));
        assert!(errors.iter().any(|e| e.contains("non-empty")));
    }

    #[test]
    fn model_info_round_trips_all_fields() {
        let config = ModelConfig::default();
        let info = config.model_info();
        assert_eq!(info.model_path, config.model_path);
        assert_eq!(info.input_size, config.input_size);
        assert_eq!(info.num_classes, config.num_classes);
        assert_eq!(info.class_names, config.class_names);
        assert_eq!(info.preprocessing, config.preprocessing);
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let config = ModelConfig::default();
        let merged = config.merged(ModelConfigUpdate {
            model_path: Some("https://example.com/other.onnx".to_string()),
            ..Default::default()
        });
        assert_eq!(merged.model_path, "https://example.com/other.onnx");
        assert_eq!(merged.input_size, config.input_size);
        assert_eq!(merged.class_names, config.class_names);
    }
}
