//! Shared test doubles for the pipeline seams.

use crate::loader::ModelSet;
use crate::session::{CaptureSource, FrameStream};
use ndarray::Array4;
use soulscan_core::classifier::{ClassifierError, EmotionClassify};
use soulscan_core::detector::{DetectorError, FaceDetect};
use soulscan_core::BoundingBox;
use soulscan_hw::{CameraError, Frame};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) struct MockDetector {
    pub boxes: Vec<BoundingBox>,
    pub fail: bool,
}

impl FaceDetect for MockDetector {
    fn detect(
        &mut self,
        _rgb: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        if self.fail {
            return Err(DetectorError::InferenceFailed("mock detector".into()));
        }
        Ok(self.boxes.clone())
    }
}

pub(crate) struct MockClassifier(pub [f32; 7]);

impl EmotionClassify for MockClassifier {
    fn classify(&mut self, _input: &Array4<f32>) -> Result<[f32; 7], ClassifierError> {
        Ok(self.0)
    }
}

pub(crate) struct FailingClassifier;

impl EmotionClassify for FailingClassifier {
    fn classify(&mut self, _input: &Array4<f32>) -> Result<[f32; 7], ClassifierError> {
        Err(ClassifierError::InferenceFailed("mock classifier".into()))
    }
}

/// Capture source that always grants access and serves uniform frames,
/// counting both opens and captured frames.
pub(crate) struct GrantedSource {
    opens: Arc<AtomicUsize>,
    captures: Arc<AtomicUsize>,
}

impl GrantedSource {
    pub fn new() -> Self {
        Self {
            opens: Arc::new(AtomicUsize::new(0)),
            captures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn opens(&self) -> Arc<AtomicUsize> {
        self.opens.clone()
    }

    pub fn captures(&self) -> Arc<AtomicUsize> {
        self.captures.clone()
    }
}

impl CaptureSource for GrantedSource {
    fn open(&mut self) -> Result<Box<dyn FrameStream>, CameraError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingStream {
            captures: self.captures.clone(),
        }))
    }
}

struct CountingStream {
    captures: Arc<AtomicUsize>,
}

impl FrameStream for CountingStream {
    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(test_frame())
    }
}

/// Capture source that always refuses access.
pub(crate) struct DeniedSource;

impl CaptureSource for DeniedSource {
    fn open(&mut self) -> Result<Box<dyn FrameStream>, CameraError> {
        Err(CameraError::PermissionDenied("/dev/video0".into()))
    }
}

pub(crate) fn test_frame() -> Frame {
    Frame::from_rgb(vec![128u8; 64 * 64 * 3], 64, 64)
}

pub(crate) fn face_box() -> BoundingBox {
    BoundingBox {
        x: 10.0,
        y: 10.0,
        width: 30.0,
        height: 30.0,
        confidence: 0.95,
    }
}

pub(crate) fn models_with(
    boxes: Vec<BoundingBox>,
    classifier: impl EmotionClassify + 'static,
) -> ModelSet {
    ModelSet::from_parts(
        Box::new(MockDetector { boxes, fail: false }),
        Some(Box::new(classifier)),
    )
}

pub(crate) fn models_without_classifier(boxes: Vec<BoundingBox>) -> ModelSet {
    ModelSet::from_parts(Box::new(MockDetector { boxes, fail: false }), None)
}
