//! UltraFace face detector via ONNX Runtime.
//!
//! Runs the "version-RFB-320" UltraFace model: a lightweight SSD-style
//! detector producing per-anchor face probabilities and normalized corner
//! boxes, post-processed with confidence thresholding and NMS.

use crate::types::BoundingBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const ULTRAFACE_INPUT_WIDTH: usize = 320;
const ULTRAFACE_INPUT_HEIGHT: usize = 240;
const ULTRAFACE_MEAN: f32 = 127.0;
const ULTRAFACE_STD: f32 = 128.0;
const ULTRAFACE_CONFIDENCE_THRESHOLD: f32 = 0.7;
const ULTRAFACE_NMS_THRESHOLD: f32 = 0.3;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download version-RFB-320.onnx and place in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Detects faces in an RGB frame. Implemented by [`OnnxFaceDetector`] in
/// production; test doubles stand in for it at the pipeline seam.
pub trait FaceDetect: Send {
    /// Returns bounding boxes sorted by descending confidence.
    /// `rgb` is packed RGB24, `width * height * 3` bytes.
    fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError>;
}

/// Output tensor indices: (scores_idx, boxes_idx).
type OutputIndices = (usize, usize);

/// UltraFace-based face detector.
pub struct OnnxFaceDetector {
    session: Session,
    /// Indices of the "scores" and "boxes" output tensors.
    /// Discovered by name at load time; falls back to positional ordering.
    output_indices: OutputIndices,
}

impl OnnxFaceDetector {
    /// Load the UltraFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded UltraFace model"
        );

        if output_names.len() < 2 {
            return Err(DetectorError::InferenceFailed(format!(
                "UltraFace model requires 2 outputs (scores, boxes), got {}",
                output_names.len()
            )));
        }

        let output_indices = discover_output_indices(&output_names);
        tracing::debug!(?output_indices, "UltraFace output tensor mapping");

        Ok(Self {
            session,
            output_indices,
        })
    }

    /// Resize an RGB frame to 320×240 with bilinear interpolation and
    /// normalize into the UltraFace input distribution (NCHW).
    ///
    /// The frame is stretched, not letterboxed: decoded boxes are
    /// normalized, so plain width/height ratios map them back.
    fn preprocess(rgb: &[u8], width: usize, height: usize) -> Array4<f32> {
        let dst_w = ULTRAFACE_INPUT_WIDTH;
        let dst_h = ULTRAFACE_INPUT_HEIGHT;
        let scale_x = width as f32 / dst_w as f32;
        let scale_y = height as f32 / dst_h as f32;

        let mut tensor = Array4::<f32>::zeros((1, 3, dst_h, dst_w));

        for y in 0..dst_h {
            let src_y = (y as f32 + 0.5) * scale_y - 0.5;
            let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
            let y1 = (y0 + 1).min(height - 1);
            let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

            for x in 0..dst_w {
                let src_x = (x as f32 + 0.5) * scale_x - 0.5;
                let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
                let x1 = (x0 + 1).min(width - 1);
                let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

                for c in 0..3 {
                    let tl = rgb[(y0 * width + x0) * 3 + c] as f32;
                    let tr = rgb[(y0 * width + x1) * 3 + c] as f32;
                    let bl = rgb[(y1 * width + x0) * 3 + c] as f32;
                    let br = rgb[(y1 * width + x1) * 3 + c] as f32;

                    let val = tl * (1.0 - fx) * (1.0 - fy)
                        + tr * fx * (1.0 - fy)
                        + bl * (1.0 - fx) * fy
                        + br * fx * fy;

                    tensor[[0, c, y, x]] = (val - ULTRAFACE_MEAN) / ULTRAFACE_STD;
                }
            }
        }

        tensor
    }
}

impl FaceDetect for OnnxFaceDetector {
    fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        validate_frame(rgb, width, height)?;

        let input = Self::preprocess(rgb, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (scores_idx, boxes_idx) = self.output_indices;

        let (_, scores) = outputs[scores_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[boxes_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;

        let detections = decode_detections(
            scores,
            boxes,
            width as f32,
            height as f32,
            ULTRAFACE_CONFIDENCE_THRESHOLD,
        );

        let mut result = nms(detections, ULTRAFACE_NMS_THRESHOLD);
        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(result)
    }
}

/// Discover output tensor ordering by name.
///
/// UltraFace exports name the tensors "scores" and "boxes"; some converted
/// models use generic numeric names, in which case the standard positional
/// ordering [0]=scores, [1]=boxes applies.
fn discover_output_indices(names: &[String]) -> OutputIndices {
    let scores = names.iter().position(|n| n == "scores");
    let boxes = names.iter().position(|n| n == "boxes");

    match (scores, boxes) {
        (Some(s), Some(b)) => {
            tracing::info!("UltraFace: using name-based output tensor mapping");
            (s, b)
        }
        _ => {
            tracing::info!(
                ?names,
                "UltraFace: output names not recognized, using positional mapping [0]=scores, [1]=boxes"
            );
            (0, 1)
        }
    }
}

/// Reject frames the preprocessor cannot sample from: zero-dimension
/// frames have no edge pixel to clamp to, and a short buffer would read
/// out of bounds.
fn validate_frame(rgb: &[u8], width: u32, height: u32) -> Result<(), DetectorError> {
    if width == 0 || height == 0 {
        return Err(DetectorError::InferenceFailed(format!(
            "degenerate frame dimensions: {width}x{height}"
        )));
    }
    let expected = (width as usize) * (height as usize) * 3;
    if rgb.len() < expected {
        return Err(DetectorError::InferenceFailed(format!(
            "RGB frame too short: expected {expected} bytes, got {}",
            rgb.len()
        )));
    }
    Ok(())
}

/// Decode flat score/box tensors into frame-space bounding boxes.
///
/// `scores` holds `[background, face]` pairs per anchor; `boxes` holds
/// normalized `[x1, y1, x2, y2]` corners per anchor.
fn decode_detections(
    scores: &[f32],
    boxes: &[f32],
    frame_width: f32,
    frame_height: f32,
    threshold: f32,
) -> Vec<BoundingBox> {
    let num_anchors = scores.len() / 2;
    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        let confidence = scores[idx * 2 + 1];
        if confidence <= threshold {
            continue;
        }

        let box_off = idx * 4;
        if box_off + 3 >= boxes.len() {
            continue;
        }

        let x1 = boxes[box_off] * frame_width;
        let y1 = boxes[box_off + 1] * frame_height;
        let x2 = boxes[box_off + 2] * frame_width;
        let y2 = boxes[box_off + 3] * frame_height;

        detections.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence,
        });
    }

    detections
}

/// Non-Maximum Suppression: greedily keep the highest-confidence box and
/// drop every later box overlapping one already kept. Output stays in
/// descending confidence order.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<BoundingBox> = Vec::with_capacity(detections.len());
    for det in detections {
        if keep.iter().all(|kept| iou(kept, &det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

/// Intersection-over-Union of two bounding boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let (ax2, ay2) = (a.x + a.width, a.y + a.height);
    let (bx2, by2) = (b.x + b.width, b.y + b.height);

    let inter_w = (ax2.min(bx2) - a.x.max(b.x)).max(0.0);
    let inter_h = (ay2.min(by2) - a.y.max(b.y)).max(0.0);
    let inter = inter_w * inter_h;

    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
