use serde::{Deserialize, Serialize};

/// Waste taxonomy. The local interpreter only ever produces `Wet` or
/// `Dry`; `Ewaste` exists for the remote backend's richer variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WasteCategory {
    Wet,
    Dry,
    Ewaste,
}

impl WasteCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            WasteCategory::Wet => "wet",
            WasteCategory::Dry => "dry",
            WasteCategory::Ewaste => "ewaste",
        }
    }
}

impl std::fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classification outcome. Immutable once returned; never persisted
/// by this crate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub category: WasteCategory,
    /// In [0, 1]; capped below certainty on every path.
    pub confidence: f32,
    /// Illustrative example items for the category, most relevant first.
    pub items: Vec<String>,
    /// Disposal advice in fixed order.
    pub recommendations: Vec<String>,
}

/// Which load strategy produced the live session. Determines the
/// interpretation procedure applied to raw outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelKind {
    Custom,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub downloaded: bool,
    pub loading: bool,
    pub ready: bool,
    pub error: Option<String>,
}

/// Raw forward-pass output: the model-defined shape plus a flat buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl RawOutput {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }
}
