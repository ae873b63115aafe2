use std::fmt;

/// Error taxonomy for the detection pipeline.
///
/// Only `ConfigInvalid` is meant to reach an integrator as-is; the other
/// variants are converted into the default safe result at the
/// `DetectionService::classify` boundary.
#[derive(Debug, Clone)]
pub enum DetectError {
    /// Configuration validation failed; carries every violated invariant.
    ConfigInvalid(Vec<String>),
    /// Both the primary and the fallback model failed to fetch or parse.
    ModelLoad(String),
    /// The forward pass failed (shape mismatch, runtime numeric error).
    Inference(String),
    /// The input image could not be decoded or converted.
    Preprocess(String),
    /// The remote classification endpoint returned an error or bad payload.
    Remote(String),
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectError::ConfigInvalid(violations) => {
                write!(f, "invalid model config: {}", violations.join("; "))
            }
            DetectError::ModelLoad(msg) => write!(f, "model load failed: {}", msg),
            DetectError::Inference(msg) => write!(f, "inference failed: {}", msg),
            DetectError::Preprocess(msg) => write!(f, "preprocessing failed: {}", msg),
            DetectError::Remote(msg) => write!(f, "remote classification failed: {}", msg),
        }
    }
}

impl std::error::Error for DetectError {}

impl From<image::ImageError> for DetectError {
    fn from(err: image::ImageError) -> Self {
        DetectError::Preprocess(err.to_string())
    }
}

impl From<ort::Error> for DetectError {
    fn from(err: ort::Error) -> Self {
        DetectError::Inference(err.to_string())
    }
}

impl From<reqwest::Error> for DetectError {
    fn from(err: reqwest::Error) -> Self {
        DetectError::Remote(err.to_string())
    }
}
