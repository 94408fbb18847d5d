//! Frame Sampler
//!
//! Time-gates decode attempts and shrinks frames to the scan raster.

use std::time::{Duration, Instant};

use image::imageops::FilterType;
use image::GrayImage;

use crate::media::VideoFrame;

/// Scan raster width in pixels
pub const DEFAULT_SCAN_WIDTH: u32 = 400;

/// Minimum time between decode attempts
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(250);

/// Downscaled grayscale copy of a frame
#[derive(Debug, Clone)]
pub struct Raster {
    pub image: GrayImage,
    /// Multiply raster x by this to get frame x
    pub scale_x: f32,
    /// Multiply raster y by this to get frame y
    pub scale_y: f32,
}

#[derive(Debug, Clone)]
pub struct FrameSampler {
    interval: Duration,
    scan_width: u32,
}

impl FrameSampler {
    pub fn new(interval: Duration, scan_width: u32) -> Self {
        Self {
            interval,
            scan_width: scan_width.max(1),
        }
    }

    /// Whether enough time has passed since the last sample
    pub fn is_due(&self, last_sample: Option<Instant>, now: Instant) -> bool {
        match last_sample {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Draw `frame` into a raster `scan_width` wide, keeping aspect ratio
    pub fn raster(&self, frame: &VideoFrame) -> Raster {
        let (fw, fh) = (frame.width().max(1), frame.height().max(1));
        let width = self.scan_width;
        let height = ((width as f32 * fh as f32 / fw as f32).round() as u32).max(1);

        let resized = image::imageops::resize(&frame.image, width, height, FilterType::Triangle);
        let image = image::DynamicImage::ImageRgba8(resized).to_luma8();

        Raster {
            image,
            scale_x: fw as f32 / width as f32,
            scale_y: fh as f32 / height as f32,
        }
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_INTERVAL, DEFAULT_SCAN_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_first_sample_is_due() {
        let sampler = FrameSampler::default();
        assert!(sampler.is_due(None, Instant::now()));
    }

    #[test]
    fn test_interval_gate() {
        let sampler = FrameSampler::default();
        let t0 = Instant::now();
        assert!(!sampler.is_due(Some(t0), t0));
        assert!(!sampler.is_due(Some(t0), t0 + Duration::from_millis(249)));
        assert!(sampler.is_due(Some(t0), t0 + Duration::from_millis(250)));
        assert!(sampler.is_due(Some(t0), t0 + Duration::from_secs(3)));
    }

    #[test]
    fn test_clock_going_backwards_is_not_due() {
        let sampler = FrameSampler::default();
        let t0 = Instant::now() + Duration::from_secs(1);
        assert!(!sampler.is_due(Some(t0), t0 - Duration::from_millis(500)));
    }

    #[test]
    fn test_raster_keeps_aspect() {
        let frame = VideoFrame::new(RgbaImage::new(1280, 720));
        let raster = FrameSampler::default().raster(&frame);
        assert_eq!(raster.image.dimensions(), (400, 225));
        assert!((raster.scale_x - 3.2).abs() < 1e-4);
        assert!((raster.scale_y - 3.2).abs() < 1e-4);
    }
}
