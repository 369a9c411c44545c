//! Frame type and pixel conversion — YUYV to RGB.

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB24 pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    /// Wrap an already-decoded RGB24 buffer (e.g., an uploaded image).
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Convert packed YUYV (4:2:2) to RGB24 using BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; U and V are shared
/// by the pixel pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for quad in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        push_rgb(&mut rgb, y0, u, v);
        push_rgb(&mut rgb, y1, u, v);
    }

    Ok(rgb)
}

/// BT.601 limited-range YUV → RGB for one pixel.
fn push_rgb(out: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    out.push(r.clamp(0, 255) as u8);
    out.push(g.clamp(0, 255) as u8);
    out.push(b.clamp(0, 255) as u8);
}
