//! Emotion classifier via ONNX Runtime.
//!
//! Runs a FER-style CNN over 48×48 grayscale face crops, producing seven
//! raw scores aligned with [`crate::types::LABEL_ORDER`].

use crate::preprocess::{CLASSIFIER_INPUT_SIZE, EMOTION_CLASSES};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0} — download emotion_cnn.onnx and place in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Scores a preprocessed face tensor. Implemented by
/// [`OnnxEmotionClassifier`] in production; test doubles stand in for it at
/// the pipeline seam.
pub trait EmotionClassify: Send {
    /// `input` must have shape `[1, 48, 48, 1]` with values in [0, 1].
    /// Returns seven raw scores in label order.
    fn classify(&mut self, input: &Array4<f32>) -> Result<[f32; 7], ClassifierError>;
}

/// ONNX-backed emotion classifier.
pub struct OnnxEmotionClassifier {
    session: Session,
}

impl OnnxEmotionClassifier {
    /// Load the emotion CNN from the given path.
    pub fn load(model_path: &str) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded emotion model"
        );

        Ok(Self { session })
    }
}

impl EmotionClassify for OnnxEmotionClassifier {
    fn classify(&mut self, input: &Array4<f32>) -> Result<[f32; 7], ClassifierError> {
        let expected_shape = [1, CLASSIFIER_INPUT_SIZE, CLASSIFIER_INPUT_SIZE, 1];
        if input.shape() != expected_shape {
            return Err(ClassifierError::InferenceFailed(format!(
                "expected input shape {expected_shape:?}, got {:?}",
                input.shape()
            )));
        }

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("score extraction: {e}")))?;

        if raw.len() != EMOTION_CLASSES {
            return Err(ClassifierError::InferenceFailed(format!(
                "expected {EMOTION_CLASSES} scores, got {}",
                raw.len()
            )));
        }

        let mut scores = [0.0f32; 7];
        scores.copy_from_slice(raw);
        Ok(scores)
    }
}
