//! Engine thread and its clone-safe handle.
//!
//! The session runs on a dedicated OS thread, the single logical thread of
//! control for all pipeline state. While idle it blocks on the control
//! channel; while streaming it drains pending control messages before every
//! cycle — the cancellation check — then runs at most one cycle. No two
//! cycles ever overlap, and a stop request means no successor is scheduled.

use crate::config::Config;
use crate::events::Notice;
use crate::loader::ModelSet;
use crate::session::{CaptureSource, FrameStream, Session, SessionState};
use soulscan_core::classifier::ClassifierError;
use soulscan_core::detector::DetectorError;
use soulscan_core::preprocess::PreprocessError;
use soulscan_core::{Analysis, FallbackScorer};
use soulscan_hw::{Camera, CameraError, CameraStream, Frame};
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("preprocess error: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Engine status snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Status {
    pub state: SessionState,
    pub fallback_mode: bool,
}

/// Messages sent from handles to the engine thread.
enum EngineRequest {
    Start {
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Analyze {
        frame: Frame,
        reply: oneshot::Sender<Result<Analysis, EngineError>>,
    },
    Status {
        reply: oneshot::Sender<Status>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    results: watch::Receiver<Analysis>,
    notices: broadcast::Sender<Notice>,
    fallback: bool,
}

impl EngineHandle {
    /// Start streaming: requests camera access and, if granted, enters the
    /// cycle loop.
    pub async fn start(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Start { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Stop streaming. A cycle already in flight completes, but no
    /// successor runs.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Stop { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Run the still-image path over one uploaded frame.
    pub async fn analyze(&self, frame: Frame) -> Result<Analysis, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Analyze {
                frame,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn status(&self) -> Result<Status, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Status { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Latest analysis, replaced wholesale every cycle.
    pub fn results(&self) -> watch::Receiver<Analysis> {
        self.results.clone()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// True when the classifier failed to load and scores are synthesized.
    pub fn fallback_mode(&self) -> bool {
        self.fallback
    }
}

/// Camera-backed capture source: opening the device is the permission
/// prompt.
pub struct CameraSource {
    device_path: String,
}

impl CameraSource {
    pub fn new(device_path: String) -> Self {
        Self { device_path }
    }
}

impl CaptureSource for CameraSource {
    fn open(&mut self) -> Result<Box<dyn FrameStream>, CameraError> {
        // One live stream per session: buffers are queued here and stay
        // queued until stop drops the stream.
        let stream = Camera::open(&self.device_path)?.into_stream()?;
        Ok(Box::new(stream))
    }
}

impl FrameStream for CameraStream {
    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        CameraStream::next_frame(self)
    }
}

/// Load models (fail-fast on the detector), then spawn the engine thread.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let models = ModelSet::load(config)?;
    let source = CameraSource::new(config.camera_device.clone());
    let fallback = FallbackScorer::new(config.neutral_ceiling, config.fallback_ceiling);
    Ok(spawn_with(models, Box::new(source), fallback))
}

pub(crate) fn spawn_with(
    models: ModelSet,
    source: Box<dyn CaptureSource>,
    fallback: FallbackScorer,
) -> EngineHandle {
    let fallback_mode = models.fallback_mode();
    let mut session = Session::new(models, source, fallback);
    let results = session.subscribe_results();
    let notices = session.notices_sender();

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("soulscan-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            'outer: loop {
                if session.state() == SessionState::Active {
                    // Cancellation check: every queued control message is
                    // handled before the next cycle may run.
                    loop {
                        match rx.try_recv() {
                            Ok(req) => handle_request(&mut session, req),
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => break 'outer,
                        }
                    }
                    if session.state() == SessionState::Active {
                        session.step();
                    }
                } else {
                    match rx.blocking_recv() {
                        Some(req) => handle_request(&mut session, req),
                        None => break,
                    }
                }
            }
            session.stop();
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle {
        tx,
        results,
        notices,
        fallback: fallback_mode,
    }
}

fn handle_request(session: &mut Session, req: EngineRequest) {
    match req {
        EngineRequest::Start { reply } => {
            let _ = reply.send(session.start());
        }
        EngineRequest::Stop { reply } => {
            session.stop();
            let _ = reply.send(());
        }
        EngineRequest::Analyze { frame, reply } => {
            let _ = reply.send(session.analyze(&frame));
        }
        EngineRequest::Status { reply } => {
            let _ = reply.send(Status {
                state: session.state(),
                fallback_mode: session.fallback_mode(),
            });
        }
    }
}
