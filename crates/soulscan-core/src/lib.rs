//! soulscan-core — Face detection and emotion classification engine.
//!
//! Uses UltraFace for face detection and a FER-style CNN for emotion
//! scoring, both running via ONNX Runtime for CPU inference. The random
//! fallback scorer stands in when no emotion model is available.

pub mod classifier;
pub mod detector;
pub mod extractor;
pub mod fallback;
pub mod preprocess;
pub mod types;

pub use classifier::{EmotionClassify, OnnxEmotionClassifier};
pub use detector::{FaceDetect, OnnxFaceDetector};
pub use extractor::{FaceCrop, FaceExtractor, FACE_MARGIN};
pub use fallback::FallbackScorer;
pub use types::{rank_scores, Analysis, BoundingBox, Emotion, EmotionScore, ScoreSource};
