//! Detection session: state machine and per-cycle orchestration.
//!
//! One `Session` owns everything a detection run needs — the model set,
//! the scratch extractor, the fallback scorer, and the capture source —
//! and is driven from a single logical thread of control. Results are
//! published wholesale through a watch channel; notices through a
//! broadcast channel.

use crate::engine::EngineError;
use crate::events::Notice;
use crate::loader::ModelSet;
use soulscan_core::preprocess;
use soulscan_core::{rank_scores, Analysis, FaceExtractor, FallbackScorer, ScoreSource};
use soulscan_hw::{CameraError, Frame};
use tokio::sync::{broadcast, watch};

const NOTICE_CHANNEL_CAPACITY: usize = 16;

/// Streaming lifecycle. Permission denial goes Requesting → Idle without
/// ever reaching Active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Requesting,
    Active,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SessionState::Idle => "idle",
            SessionState::Requesting => "requesting",
            SessionState::Active => "active",
        })
    }
}

/// A capture source the session can open: the camera in production, a
/// synthetic source in tests. Opening is where permission is decided.
pub trait CaptureSource: Send {
    fn open(&mut self) -> Result<Box<dyn FrameStream>, CameraError>;
}

/// An open stream of frames.
pub trait FrameStream: Send {
    fn next_frame(&mut self) -> Result<Frame, CameraError>;
}

/// One detection run: models + scratch state + capture + output channels.
pub struct Session {
    models: ModelSet,
    extractor: FaceExtractor,
    fallback: FallbackScorer,
    source: Box<dyn CaptureSource>,
    stream: Option<Box<dyn FrameStream>>,
    state: SessionState,
    results: watch::Sender<Analysis>,
    notices: broadcast::Sender<Notice>,
}

impl Session {
    pub fn new(models: ModelSet, source: Box<dyn CaptureSource>, fallback: FallbackScorer) -> Self {
        let (results, _) = watch::channel(Analysis::default());
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self {
            models,
            extractor: FaceExtractor::new(),
            fallback,
            source,
            stream: None,
            state: SessionState::Idle,
            results,
            notices,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn fallback_mode(&self) -> bool {
        self.models.fallback_mode()
    }

    /// Latest published analysis; the receiver sees wholesale replacements.
    pub fn subscribe_results(&self) -> watch::Receiver<Analysis> {
        self.results.subscribe()
    }

    pub fn notices_sender(&self) -> broadcast::Sender<Notice> {
        self.notices.clone()
    }

    /// Idle → Requesting → Active, or back to Idle when the capture source
    /// cannot be opened (permission denied, device busy, ...).
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.state == SessionState::Active {
            return Ok(());
        }

        self.state = SessionState::Requesting;
        match self.source.open() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = SessionState::Active;
                tracing::info!("detection session active");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Idle;
                tracing::warn!(error = %e, "could not open capture source");
                self.notify(Notice::CameraDenied);
                Err(e.into())
            }
        }
    }

    /// Stop streaming: drop the stream (releasing the device) and return
    /// to Idle. No successor cycle runs after this.
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!("detection session stopped");
        }
        self.state = SessionState::Idle;
    }

    /// Run at most one streaming cycle. A no-op unless Active.
    ///
    /// Per-cycle failures are transient: logged, treated as no detection,
    /// and the stream continues on the next cycle. Returns whether the
    /// session is still active afterwards.
    pub fn step(&mut self) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };

        match stream.next_frame() {
            Ok(frame) => match self.run_cycle(&frame, false) {
                Ok(analysis) => {
                    self.results.send_replace(analysis);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cycle failed; treating as no detection");
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "frame capture failed; skipping cycle");
            }
        }

        self.state == SessionState::Active
    }

    /// Still-image path: one cycle over an uploaded frame, independent of
    /// the streaming state. No-face emits a user-visible notice here
    /// (one-shot action), unlike the silent streaming case.
    pub fn analyze(&mut self, frame: &Frame) -> Result<Analysis, EngineError> {
        match self.run_cycle(frame, true) {
            Ok(analysis) => {
                self.results.send_replace(analysis.clone());
                Ok(analysis)
            }
            Err(e) => {
                tracing::warn!(error = %e, "image analysis failed");
                self.notify(Notice::ProcessingFailed);
                Err(e)
            }
        }
    }

    /// One full detect → extract → preprocess → classify → rank pass.
    fn run_cycle(&mut self, frame: &Frame, still: bool) -> Result<Analysis, EngineError> {
        let faces = self
            .models
            .detector
            .detect(&frame.data, frame.width, frame.height)?;

        // Single-face policy: first detection only, rest discarded.
        let Some(face) = faces.first().cloned() else {
            if still {
                self.notify(Notice::NoFaceDetected);
            }
            return Ok(Analysis::no_face());
        };

        let crop = self
            .extractor
            .extract(&frame.data, frame.width, frame.height, &face);

        let (raw, source) = match self.models.classifier.as_mut() {
            Some(classifier) => {
                let tensor = preprocess::preprocess(&crop)?;
                (classifier.classify(&tensor)?, ScoreSource::Model)
            }
            // The fallback path skips preprocessing entirely; the crop is
            // dropped unused.
            None => (self.fallback.scores(), ScoreSource::Fallback),
        };

        Ok(Analysis::ranked(rank_scores(&raw), source))
    }

    fn notify(&self, notice: Notice) {
        // No receivers is fine; the notice is simply dropped.
        let _ = self.notices.send(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        face_box, models_with, models_without_classifier, test_frame, DeniedSource,
        FailingClassifier, GrantedSource, MockClassifier, MockDetector,
    };
    use soulscan_core::Emotion;
    use std::sync::atomic::Ordering;

    fn session(models: ModelSet, source: Box<dyn CaptureSource>) -> Session {
        Session::new(models, source, FallbackScorer::with_seed(11, 0.9, 0.7))
    }

    #[test]
    fn test_permission_denied_never_reaches_active() {
        let mut s = session(
            models_with(vec![face_box()], MockClassifier([0.5; 7])),
            Box::new(DeniedSource),
        );
        let mut notices = s.notices_sender().subscribe();

        let result = s.start();
        assert!(result.is_err());
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(notices.try_recv().unwrap(), Notice::CameraDenied);
    }

    #[test]
    fn test_start_and_stop_transitions() {
        let source = GrantedSource::new();
        let captures = source.captures();
        let mut s = session(
            models_with(vec![face_box()], MockClassifier([0.5; 7])),
            Box::new(source),
        );

        assert_eq!(s.state(), SessionState::Idle);
        s.start().unwrap();
        assert_eq!(s.state(), SessionState::Active);

        assert!(s.step());
        assert_eq!(captures.load(Ordering::SeqCst), 1);

        s.stop();
        assert_eq!(s.state(), SessionState::Idle);

        // Stopped: no further cycle may capture a frame.
        assert!(!s.step());
        assert_eq!(captures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_capture_source_opened_once_per_start() {
        // The stream is opened at start and held across cycles; every
        // frame must come out of that one open.
        let source = GrantedSource::new();
        let opens = source.opens();
        let captures = source.captures();
        let mut s = session(
            models_with(vec![face_box()], MockClassifier([0.5; 7])),
            Box::new(source),
        );

        s.start().unwrap();
        s.step();
        s.step();
        s.step();

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(captures.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_step_is_noop_when_idle() {
        let mut s = session(
            models_with(vec![face_box()], MockClassifier([0.5; 7])),
            Box::new(GrantedSource::new()),
        );
        let results = s.subscribe_results();
        assert!(!s.step());
        assert!(!results.has_changed().unwrap());
    }

    #[test]
    fn test_streaming_publishes_ranked_results() {
        let mut s = session(
            models_with(
                vec![face_box()],
                MockClassifier([0.1, 0.05, 0.05, 0.6, 0.1, 0.05, 0.05]),
            ),
            Box::new(GrantedSource::new()),
        );
        let results = s.subscribe_results();

        s.start().unwrap();
        s.step();

        let analysis = results.borrow().clone();
        assert_eq!(analysis.emotions.len(), 7);
        assert_eq!(analysis.dominant, Some(Emotion::Happy));
        assert!((analysis.emotions[0].score - 0.6).abs() < 1e-6);
        assert_eq!(analysis.source, Some(ScoreSource::Model));
    }

    #[test]
    fn test_streaming_no_face_is_silent_and_empty() {
        let mut s = session(
            models_with(vec![], MockClassifier([0.5; 7])),
            Box::new(GrantedSource::new()),
        );
        let results = s.subscribe_results();
        let mut notices = s.notices_sender().subscribe();

        s.start().unwrap();
        s.step();

        let analysis = results.borrow().clone();
        assert!(analysis.emotions.is_empty());
        assert_eq!(analysis.dominant, None);
        assert!(notices.try_recv().is_err());
    }

    #[test]
    fn test_fallback_mode_still_reaches_active() {
        let mut s = session(
            models_without_classifier(vec![face_box()]),
            Box::new(GrantedSource::new()),
        );
        let results = s.subscribe_results();

        assert!(s.fallback_mode());
        s.start().unwrap();
        assert_eq!(s.state(), SessionState::Active);
        s.step();

        let analysis = results.borrow().clone();
        assert_eq!(analysis.emotions.len(), 7);
        assert_eq!(analysis.source, Some(ScoreSource::Fallback));
    }

    #[test]
    fn test_transient_classifier_error_keeps_streaming() {
        let mut s = session(
            models_with(vec![face_box()], FailingClassifier),
            Box::new(GrantedSource::new()),
        );
        let results = s.subscribe_results();

        s.start().unwrap();
        let still_active = s.step();

        assert!(still_active);
        assert_eq!(s.state(), SessionState::Active);
        // Failed cycle published nothing.
        assert!(!results.has_changed().unwrap());
    }

    #[test]
    fn test_analyze_image_with_face() {
        let mut s = session(
            models_with(
                vec![face_box()],
                MockClassifier([0.1, 0.05, 0.05, 0.6, 0.1, 0.05, 0.05]),
            ),
            Box::new(GrantedSource::new()),
        );

        let analysis = s.analyze(&test_frame()).unwrap();
        assert_eq!(analysis.dominant, Some(Emotion::Happy));
        assert!((analysis.emotions[0].score - 0.6).abs() < 1e-6);
        for pair in analysis.emotions.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_analyze_image_without_face_notifies() {
        let mut s = session(
            models_with(vec![], MockClassifier([0.5; 7])),
            Box::new(GrantedSource::new()),
        );
        let mut notices = s.notices_sender().subscribe();

        let analysis = s.analyze(&test_frame()).unwrap();
        assert!(analysis.emotions.is_empty());
        assert_eq!(analysis.dominant, None);
        assert_eq!(notices.try_recv().unwrap(), Notice::NoFaceDetected);
    }

    #[test]
    fn test_analyze_failure_notifies() {
        let mut s = session(
            models_with(vec![face_box()], FailingClassifier),
            Box::new(GrantedSource::new()),
        );
        let mut notices = s.notices_sender().subscribe();

        assert!(s.analyze(&test_frame()).is_err());
        assert_eq!(notices.try_recv().unwrap(), Notice::ProcessingFailed);
    }

    #[test]
    fn test_detector_error_is_transient_in_stream() {
        let mut s = session(
            models_with_failing_detector(),
            Box::new(GrantedSource::new()),
        );
        s.start().unwrap();
        assert!(s.step());
        assert_eq!(s.state(), SessionState::Active);
    }

    fn models_with_failing_detector() -> ModelSet {
        ModelSet::from_parts(
            Box::new(MockDetector {
                boxes: vec![],
                fail: true,
            }),
            Some(Box::new(MockClassifier([0.5; 7]))),
        )
    }
}
