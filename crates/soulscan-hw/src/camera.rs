//! V4L2 webcam capture via the `v4l` crate.

use crate::frame::{self, Frame};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, converted to RGB).
    Yuyv,
    /// Packed RGB24 (3 bytes/pixel, passed through).
    Rgb3,
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    ///
    /// A permission failure here is the native analogue of a denied
    /// browser camera prompt and maps to [`CameraError::PermissionDenied`].
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("busy") || msg.contains("EBUSY") {
                CameraError::DeviceBusy
            } else if msg.contains("Permission denied") || msg.contains("EACCES") {
                CameraError::PermissionDenied(device_path.to_string())
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        // Request YUYV at 640x480. If the driver negotiates RGB3 instead,
        // accept it and skip the conversion step.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;

        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = 640;
        fmt.height = 480;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = if fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if fourcc == FourCC::new(b"RGB3") {
            PixelFormat::Rgb3
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV or RGB3)"
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
        })
    }

    /// Begin continuous capture: queue the mmap buffers once and keep the
    /// driver streaming until the returned stream is dropped.
    ///
    /// Restarting the stream per frame makes UVC cameras re-run exposure
    /// and gain control every cycle; holding it lets them settle once.
    pub fn into_stream(self) -> Result<CameraStream, CameraError> {
        let stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4).map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;

        Ok(CameraStream {
            camera: self,
            stream,
        })
    }

    /// One-shot capture: open a throwaway stream, dequeue a single frame,
    /// convert to RGB24. Use [`Camera::into_stream`] for continuous capture.
    pub fn capture_frame(&self) -> Result<Frame, CameraError> {
        let mut stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4).map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        let rgb = self.buf_to_rgb(buf)?;

        Ok(Frame {
            data: rgb,
            width: self.width,
            height: self.height,
            timestamp: std::time::Instant::now(),
            sequence: meta.sequence,
        })
    }

    /// Convert a raw buffer to RGB24 based on the negotiated format.
    fn buf_to_rgb(&self, buf: &[u8]) -> Result<Vec<u8>, CameraError> {
        match self.pixel_format {
            PixelFormat::Rgb3 => {
                let expected = (self.width * self.height * 3) as usize;
                if buf.len() < expected {
                    return Err(CameraError::CaptureFailed(format!(
                        "RGB3 buffer too short: expected {expected}, got {}",
                        buf.len()
                    )));
                }
                Ok(buf[..expected].to_vec())
            }
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, self.width, self.height)
                .map_err(|e| CameraError::CaptureFailed(format!("YUYV conversion failed: {e}"))),
        }
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

/// A camera with its live mmap capture stream.
///
/// The mmap arena only borrows the device during construction, so the
/// stream can outlive that borrow and sit next to its camera.
pub struct CameraStream {
    camera: Camera,
    stream: MmapStream<'static>,
}

impl CameraStream {
    /// Dequeue the next frame from the live stream, converting to RGB24.
    pub fn next_frame(&mut self) -> Result<Frame, CameraError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        let rgb = self.camera.buf_to_rgb(buf)?;

        Ok(Frame {
            data: rgb,
            width: self.camera.width,
            height: self.camera.height,
            timestamp: std::time::Instant::now(),
            sequence: meta.sequence,
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }
}
