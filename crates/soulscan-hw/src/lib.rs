//! soulscan-hw — Hardware abstraction for webcam capture.
//!
//! Provides V4L2-based camera access and pixel-format conversion to the
//! RGB frames the inference pipeline consumes.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, PixelFormat};
pub use frame::Frame;
