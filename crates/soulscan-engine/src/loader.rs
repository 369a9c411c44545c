//! Model acquisition: required detector, optional classifier.

use crate::config::Config;
use soulscan_core::classifier::{EmotionClassify, OnnxEmotionClassifier};
use soulscan_core::detector::{DetectorError, FaceDetect, OnnxFaceDetector};

/// The two model capabilities the pipeline runs on.
///
/// The detector is required: without it the detection feature cannot work
/// at all. The classifier is optional: when it fails to load the pipeline
/// degrades to fallback mode instead of blocking.
pub struct ModelSet {
    pub(crate) detector: Box<dyn FaceDetect>,
    pub(crate) classifier: Option<Box<dyn EmotionClassify>>,
}

impl ModelSet {
    /// Attempt both model acquisitions. Returns only after both attempts
    /// have resolved; a detector failure is fatal for the feature and
    /// propagates, a classifier failure downgrades to fallback mode.
    pub fn load(config: &Config) -> Result<Self, DetectorError> {
        let detector = OnnxFaceDetector::load(&config.detector_model_path())?;
        tracing::info!("face detection model loaded");

        let classifier = match OnnxEmotionClassifier::load(&config.classifier_model_path()) {
            Ok(c) => {
                tracing::info!("emotion recognition model loaded");
                Some(Box::new(c) as Box<dyn EmotionClassify>)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "could not load emotion recognition model; using fallback mode"
                );
                None
            }
        };

        Ok(Self {
            detector: Box::new(detector),
            classifier,
        })
    }

    /// Assemble a set from preloaded capabilities (tests, embedders).
    pub fn from_parts(
        detector: Box<dyn FaceDetect>,
        classifier: Option<Box<dyn EmotionClassify>>,
    ) -> Self {
        Self {
            detector,
            classifier,
        }
    }

    /// True when no classifier is available and scores are synthesized.
    pub fn fallback_mode(&self) -> bool {
        self.classifier.is_none()
    }
}
