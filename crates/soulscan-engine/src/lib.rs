//! soulscan-engine — the inference pipeline behind the UI.
//!
//! Acquires the detection and classification models, owns the session
//! state machine (Idle → Requesting → Active), and runs the per-frame
//! cycle loop on a dedicated engine thread.

pub mod config;
pub mod engine;
pub mod events;
pub mod loader;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use engine::{spawn_engine, CameraSource, EngineError, EngineHandle, Status};
pub use events::Notice;
pub use loader::ModelSet;
pub use session::{CaptureSource, FrameStream, Session, SessionState};
