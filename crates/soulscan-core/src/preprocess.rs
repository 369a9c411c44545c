//! Preprocessing: face crop → classifier input tensor.
//!
//! Deterministic pipeline, in this exact order: grayscale by channel mean,
//! bilinear resize to 48×48, divide by 255, add the batch dimension.

use crate::extractor::FaceCrop;
use ndarray::Array4;
use thiserror::Error;

/// Spatial size the emotion CNN expects.
pub const CLASSIFIER_INPUT_SIZE: usize = 48;
/// Number of emotion classes the CNN scores.
pub const EMOTION_CLASSES: usize = 7;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("empty face crop ({width}x{height})")]
    EmptyCrop { width: u32, height: u32 },
    #[error("crop buffer too short: expected {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },
}

/// Convert a face crop into the `[1, 48, 48, 1]` tensor the classifier
/// expects, every element in [0, 1].
///
/// Intermediates are locals; nothing outlives the call.
pub fn preprocess(crop: &FaceCrop<'_>) -> Result<Array4<f32>, PreprocessError> {
    let w = crop.width as usize;
    let h = crop.height as usize;

    if w == 0 || h == 0 {
        return Err(PreprocessError::EmptyCrop {
            width: crop.width,
            height: crop.height,
        });
    }
    let expected = w * h * 3;
    if crop.data.len() < expected {
        return Err(PreprocessError::ShortBuffer {
            expected,
            actual: crop.data.len(),
        });
    }

    // Collapse RGB to grayscale by averaging the channels.
    let mut gray = vec![0.0f32; w * h];
    for (i, px) in crop.data.chunks_exact(3).enumerate().take(w * h) {
        gray[i] = (px[0] as f32 + px[1] as f32 + px[2] as f32) / 3.0;
    }

    // Bilinear resize to 48×48, normalizing into [0, 1] as we go.
    let size = CLASSIFIER_INPUT_SIZE;
    let scale_x = w as f32 / size as f32;
    let scale_y = h as f32 / size as f32;

    let mut tensor = Array4::<f32>::zeros((1, size, size, 1));

    for y in 0..size {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, h as i32 - 1) as usize;
        let y1 = (y0 + 1).min(h - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..size {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, w as i32 - 1) as usize;
            let x1 = (x0 + 1).min(w - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let tl = gray[y0 * w + x0];
            let tr = gray[y0 * w + x1];
            let bl = gray[y1 * w + x0];
            let br = gray[y1 * w + x1];

            let val = tl * (1.0 - fx) * (1.0 - fy)
                + tr * fx * (1.0 - fy)
                + bl * (1.0 - fx) * fy
                + br * fx * fy;

            tensor[[0, y, x, 0]] = val / 255.0;
        }
    }

    Ok(tensor)
}
