//! Face extraction: margin-padded crops from RGB frames.

use crate::types::BoundingBox;

/// Fixed margin added on every side of a detected box before cropping.
/// Keeps hair/chin/forehead context that helps the classifier.
pub const FACE_MARGIN: u32 = 10;

/// A margin-padded face crop, borrowed from the extractor's scratch buffer.
///
/// The borrow ties the crop's lifetime to the extractor: the scratch
/// surface cannot be overwritten by the next extraction while a crop from
/// the previous one is still alive.
pub struct FaceCrop<'a> {
    /// Packed RGB24, `width * height * 3` bytes.
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

/// Extracts face regions, reusing one scratch raster surface across calls.
#[derive(Default)]
pub struct FaceExtractor {
    scratch: Vec<u8>,
}

impl FaceExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crop `bbox` out of an RGB frame, expanded by [`FACE_MARGIN`] on all
    /// sides. The crop is always `(round(width) + 20, round(height) + 20)`
    /// pixels; where the margin reaches outside the source, the nearest
    /// edge pixel is replicated (clamp-to-edge).
    pub fn extract(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        bbox: &BoundingBox,
    ) -> FaceCrop<'_> {
        let margin = FACE_MARGIN as i64;
        let crop_w = (bbox.width.round().max(0.0) as i64 + 2 * margin) as usize;
        let crop_h = (bbox.height.round().max(0.0) as i64 + 2 * margin) as usize;
        let x0 = bbox.x.round() as i64 - margin;
        let y0 = bbox.y.round() as i64 - margin;

        self.scratch.resize(crop_w * crop_h * 3, 0);

        if width == 0 || height == 0 || rgb.len() < (width * height * 3) as usize {
            // Unreadable source: leave the crop black.
            self.scratch.fill(0);
        } else {
            let max_x = width as i64 - 1;
            let max_y = height as i64 - 1;
            for dy in 0..crop_h as i64 {
                let sy = (y0 + dy).clamp(0, max_y) as usize;
                for dx in 0..crop_w as i64 {
                    let sx = (x0 + dx).clamp(0, max_x) as usize;
                    let src = (sy * width as usize + sx) * 3;
                    let dst = (dy as usize * crop_w + dx as usize) * 3;
                    self.scratch[dst..dst + 3].copy_from_slice(&rgb[src..src + 3]);
                }
            }
        }

        FaceCrop {
            data: &self.scratch,
            width: crop_w as u32,
            height: crop_h as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        data
    }

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_crop_dimensions_include_margin() {
        let frame = solid_frame(200, 200, [50, 60, 70]);
        let mut extractor = FaceExtractor::new();
        let crop = extractor.extract(&frame, 200, 200, &bbox(50.0, 50.0, 80.0, 60.0));
        assert_eq!(crop.width, 80 + 2 * FACE_MARGIN);
        assert_eq!(crop.height, 60 + 2 * FACE_MARGIN);
        assert_eq!(crop.data.len(), (crop.width * crop.height * 3) as usize);
    }

    #[test]
    fn test_crop_dimensions_at_image_corner() {
        // Box at the origin: the margin reaches outside, but the crop must
        // keep its full size.
        let frame = solid_frame(100, 100, [10, 20, 30]);
        let mut extractor = FaceExtractor::new();
        let crop = extractor.extract(&frame, 100, 100, &bbox(0.0, 0.0, 40.0, 40.0));
        assert_eq!(crop.width, 60);
        assert_eq!(crop.height, 60);
    }

    #[test]
    fn test_crop_copies_source_pixels() {
        // Frame with one red pixel at (30, 30), rest black.
        let mut frame = solid_frame(100, 100, [0, 0, 0]);
        let idx = (30 * 100 + 30) * 3;
        frame[idx] = 255;

        let mut extractor = FaceExtractor::new();
        let crop = extractor.extract(&frame, 100, 100, &bbox(20.0, 20.0, 20.0, 20.0));

        // Source (30, 30) lands at crop (30 - (20-10), 30 - (20-10)) = (20, 20).
        let crop_idx = ((20 * crop.width + 20) * 3) as usize;
        assert_eq!(crop.data[crop_idx], 255);
        assert_eq!(crop.data[crop_idx + 1], 0);
    }

    #[test]
    fn test_edge_clamp_replicates_border() {
        // Uniform frame: clamped margin pixels match the interior.
        let frame = solid_frame(50, 50, [90, 90, 90]);
        let mut extractor = FaceExtractor::new();
        let crop = extractor.extract(&frame, 50, 50, &bbox(0.0, 0.0, 50.0, 50.0));
        assert!(crop.data.iter().all(|&b| b == 90));
    }

    #[test]
    fn test_zero_sized_source_yields_black_crop() {
        let mut extractor = FaceExtractor::new();
        let crop = extractor.extract(&[], 0, 0, &bbox(0.0, 0.0, 10.0, 10.0));
        assert_eq!(crop.width, 30);
        assert_eq!(crop.height, 30);
        assert!(crop.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_scratch_reuse_across_calls() {
        let frame = solid_frame(100, 100, [1, 2, 3]);
        let mut extractor = FaceExtractor::new();
        let first_len = extractor
            .extract(&frame, 100, 100, &bbox(10.0, 10.0, 50.0, 50.0))
            .data
            .len();
        let second = extractor.extract(&frame, 100, 100, &bbox(10.0, 10.0, 20.0, 20.0));
        assert!(second.data.len() < first_len);
        assert_eq!(second.width, 40);
    }
}
