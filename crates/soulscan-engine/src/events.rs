//! User-visible notices — the native analogue of UI toasts.
//!
//! Load-time conditions (missing detector, missing classifier) surface
//! through `spawn_engine`'s result instead, since they precede any
//! subscriber.

/// A one-shot notification for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// Camera access was denied; the stream stays idle.
    CameraDenied,
    /// An uploaded image contained no detectable face.
    NoFaceDetected,
    /// A still-image cycle failed outright.
    ProcessingFailed,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Notice::CameraDenied => {
                "Camera access denied. Please allow access to your camera to use emotion detection."
            }
            Notice::NoFaceDetected => {
                "No face detected. Please ensure there's a clear face in the image."
            }
            Notice::ProcessingFailed => "Failed to process the image.",
        };
        f.write_str(msg)
    }
}
