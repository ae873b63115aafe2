use image::DynamicImage;
use ndarray::Array4;

use crate::config::{ModelConfig, NormalizeRange};
use crate::error::DetectError;

/// Turns a decoded image into the model's expected input tensor:
/// NHWC `(1, height, width, 3)` with `(height, width)` taken from
/// `config.input_size`, pixel values scaled per the preprocessing config.
///
/// Deterministic: the same image and config always produce bit-identical
/// output. Intermediate buffers are dropped before return; the caller
/// owns the final tensor.
pub fn preprocess(image: &DynamicImage, config: &ModelConfig) -> Result<Array4<f32>, DetectError> {
    config.validated()?;

    let [width, height] = config.input_size;
    let resized = image.resize_exact(width, height, config.preprocessing.resize_method.filter());
    let rgb = resized.to_rgb8();

    // ImageBuffer raw storage is already HWC interleaved, so the flat
    // buffer maps straight onto (h, w, 3).
    let raw = rgb.into_raw();
    let data: Vec<f32> = if config.preprocessing.normalize {
        match config.preprocessing.normalize_range {
            NormalizeRange::ZeroToOne => raw.iter().map(|&v| v as f32 / 255.0).collect(),
            NormalizeRange::MinusOneToOne => {
                raw.iter().map(|&v| v as f32 / 127.5 - 1.0).collect()
            }
        }
    } else {
        raw.iter().map(|&v| v as f32).collect()
    };

    Array4::from_shape_vec((1, height as usize, width as usize, 3), data).map_err(|e| {
        DetectError::Preprocess(format!(
            "failed to shape {}x{} input tensor: {}",
            width, height, e
        ))
    })
}
