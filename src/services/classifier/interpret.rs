use crate::config::ModelConfig;
use crate::models::detect_types::{DetectionResult, ModelKind, RawOutput, WasteCategory};

/// Upper bound on reported confidence from the custom binary model.
const BINARY_CONFIDENCE_CAP: f32 = 0.99;
/// Upper bound on reported confidence from the general-purpose fallback.
const FALLBACK_CONFIDENCE_CAP: f32 = 0.95;
/// ImageNet index below which the fallback prediction is treated as
/// organic. A heuristic split of a 1000-class label space onto a two-way
/// waste taxonomy, kept verbatim for compatibility; it has no trained
/// derivation and should not be tuned without labeled data.
const ORGANIC_INDEX_SPLIT: usize = 400;

const ITEM_PREVIEW_LEN: usize = 3;

struct CategoryInfo {
    items: &'static [&'static str],
    recommendations: &'static [&'static str],
}

const WET_INFO: CategoryInfo = CategoryInfo {
    items: &[
        "Food scraps",
        "Fruit peels",
        "Vegetable waste",
        "Organic matter",
        "Coffee grounds",
        "Tea bags",
        "Garden waste",
        "Dairy products",
    ],
    recommendations: &[
        "This appears to be organic waste suitable for composting",
        "Place in your green/wet waste bin",
        "Consider starting a home compost system",
        "Avoid meat and dairy in home composting",
    ],
};

const DRY_INFO: CategoryInfo = CategoryInfo {
    items: &[
        "Plastic bottles",
        "Paper",
        "Cardboard",
        "Metal cans",
        "Glass",
        "Fabric",
        "Rubber",
        "Electronics",
        "Batteries",
    ],
    recommendations: &[
        "These items can be recycled",
        "Clean the containers before recycling",
        "Place in your blue/dry waste bin",
        "Remove labels when possible",
        "Take electronics to designated collection centers",
    ],
};

const EWASTE_INFO: CategoryInfo = CategoryInfo {
    items: &["Batteries", "Circuit boards", "Cables", "Small appliances"],
    recommendations: &[
        "This is electronic waste requiring special handling",
        "Never throw e-waste in regular trash",
        "Take to certified e-waste collection centers",
        "Remove batteries before disposal",
        "Wipe personal data from electronic devices",
    ],
};

fn category_info(category: WasteCategory) -> &'static CategoryInfo {
    match category {
        WasteCategory::Wet => &WET_INFO,
        WasteCategory::Dry => &DRY_INFO,
        WasteCategory::Ewaste => &EWASTE_INFO,
    }
}

fn result_for(category: WasteCategory, confidence: f32, item_count: usize) -> DetectionResult {
    let info = category_info(category);
    DetectionResult {
        category,
        confidence,
        items: info
            .items
            .iter()
            .take(item_count)
            .map(|s| s.to_string())
            .collect(),
        recommendations: info.recommendations.iter().map(|s| s.to_string()).collect(),
    }
}

/// Closed set of output layouts the pipeline understands, classified once
/// from the raw output's shape so the decision stays auditable apart from
/// the inference call itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Single sigmoid probability from the custom binary model.
    BinarySigmoid(f32),
    /// Anything else: a score vector from the general-purpose fallback.
    Multiclass(Vec<f32>),
}

impl ModelOutput {
    /// Structural dispatch: rank-1 length-1 outputs and rank-2 outputs
    /// whose column count matches the configured class count are the
    /// binary/custom layout; every other shape is treated as the
    /// fallback's large classification vector.
    pub fn from_raw(raw: &RawOutput, config: &ModelConfig) -> ModelOutput {
        match raw.shape.as_slice() {
            [1] if !raw.data.is_empty() => ModelOutput::BinarySigmoid(raw.data[0]),
            [_, cols] if *cols == config.num_classes && !raw.data.is_empty() => {
                ModelOutput::BinarySigmoid(raw.data[0])
            }
            _ => ModelOutput::Multiclass(raw.data.clone()),
        }
    }
}

/// Maps a classified output onto a domain result.
pub fn interpret(output: &ModelOutput) -> DetectionResult {
    match output {
        ModelOutput::BinarySigmoid(p) => {
            // Strict threshold: exactly 0.5 resolves to dry.
            let is_wet = *p > 0.5;
            let category = if is_wet {
                WasteCategory::Wet
            } else {
                WasteCategory::Dry
            };
            let confidence = if is_wet { *p } else { 1.0 - *p };
            result_for(
                category,
                confidence.clamp(0.0, BINARY_CONFIDENCE_CAP),
                ITEM_PREVIEW_LEN,
            )
        }
        ModelOutput::Multiclass(scores) => {
            let mut best: Option<(usize, f32)> = None;
            for (index, &score) in scores.iter().enumerate() {
                // Strictly-greater keeps the first occurrence on ties.
                if best.map_or(true, |(_, max)| score > max) {
                    best = Some((index, score));
                }
            }
            let Some((max_index, max_score)) = best else {
                return fallback_result();
            };

            let category = if max_index < ORGANIC_INDEX_SPLIT {
                WasteCategory::Wet
            } else {
                WasteCategory::Dry
            };
            let confidence = (max_score * 1.2).clamp(0.0, FALLBACK_CONFIDENCE_CAP);
            result_for(category, confidence, ITEM_PREVIEW_LEN)
        }
    }
}

/// Convenience: classify the raw output's shape, then interpret it.
pub fn interpret_raw(raw: &RawOutput, config: &ModelConfig, kind: ModelKind) -> DetectionResult {
    let output = ModelOutput::from_raw(raw, config);
    if matches!(output, ModelOutput::Multiclass(_)) && kind == ModelKind::Custom {
        log::warn!(
            "custom model produced an unexpected output shape {:?}; using multiclass interpretation",
            raw.shape
        );
    }
    interpret(&output)
}

/// Default safe result returned whenever the pipeline fails internally:
/// the caller always receives a usable classification.
pub fn fallback_result() -> DetectionResult {
    DetectionResult {
        category: WasteCategory::Dry,
        confidence: 0.75,
        items: vec!["Unidentified waste".to_string()],
        recommendations: vec![
            "Unable to classify automatically".to_string(),
            "Please manually sort based on material type".to_string(),
            "When in doubt, place in dry waste bin".to_string(),
        ],
    }
}
