//! Media Pipeline
//!
//! Captured frames, symbol geometry, and snapshot extraction.

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

pub mod camera;
#[cfg(feature = "camera")]
pub mod native;

pub use camera::{
    CameraBackend, CameraRequest, CameraStream, Facing, StillCamera, UnavailableCamera,
};

/// Global frame ID counter for unique frame identification
static FRAME_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a new unique frame ID
pub fn next_frame_id() -> u64 {
    FRAME_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Full-resolution frame as delivered by a camera backend
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Unique frame ID (monotonically increasing)
    pub frame_id: u64,
    pub image: RgbaImage,
    pub captured_at: Instant,
}

impl VideoFrame {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            frame_id: next_frame_id(),
            image,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Point in raster coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Corners of a detected symbol's bounding quadrilateral
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QuadCorners {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl QuadCorners {
    pub fn points(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Axis-aligned bounds as (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        self.points().iter().fold(
            (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
            |(min_x, min_y, max_x, max_y), p| {
                (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
            },
        )
    }

    /// Map corners from one raster size onto another
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        let s = |p: Point| Point::new(p.x * sx, p.y * sy);
        Self {
            top_left: s(self.top_left),
            top_right: s(self.top_right),
            bottom_right: s(self.bottom_right),
            bottom_left: s(self.bottom_left),
        }
    }
}

/// Rectangle inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// Bounding box of `corners` grown by `margin`, clamped to the frame
    ///
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn around(
        corners: &QuadCorners,
        margin: f32,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = corners.bounds();

        let x = (min_x - margin).floor().max(0.0);
        let y = (min_y - margin).floor().max(0.0);
        let right = (max_x + margin).ceil().min(frame_width as f32);
        let bottom = (max_y + margin).ceil().min(frame_height as f32);

        if !(right > x && bottom > y) {
            return None;
        }

        Some(Self {
            x: x as u32,
            y: y as u32,
            width: (right - x) as u32,
            height: (bottom - y) as u32,
        })
    }
}

/// Cropped image of a detected symbol
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub region: CropRegion,
    /// PNG-encoded crop
    #[serde(skip)]
    pub png: Vec<u8>,
}

impl Snapshot {
    /// Crop `region` out of `frame` and encode it as PNG
    pub fn capture(frame: &RgbaImage, region: CropRegion) -> Result<Self, image::ImageError> {
        let crop =
            image::imageops::crop_imm(frame, region.x, region.y, region.width, region.height)
                .to_image();

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(crop).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        Ok(Self { region, png })
    }

    /// `data:` URL for embedding the snapshot
    pub fn data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f32, y0: f32, x1: f32, y1: f32) -> QuadCorners {
        QuadCorners {
            top_left: Point::new(x0, y0),
            top_right: Point::new(x1, y0),
            bottom_right: Point::new(x1, y1),
            bottom_left: Point::new(x0, y1),
        }
    }

    #[test]
    fn test_crop_inside_frame() {
        let region = CropRegion::around(&square(100.0, 80.0, 200.0, 180.0), 15.0, 640, 480);
        assert_eq!(
            region,
            Some(CropRegion {
                x: 85,
                y: 65,
                width: 130,
                height: 130
            })
        );
    }

    #[test]
    fn test_crop_clamped_at_edges() {
        // Margin would push past every edge
        let region = CropRegion::around(&square(5.0, 3.0, 395.0, 298.0), 15.0, 400, 300).unwrap();
        assert_eq!(region.x, 0);
        assert_eq!(region.y, 0);
        assert_eq!(region.x + region.width, 400);
        assert_eq!(region.y + region.height, 300);
    }

    #[test]
    fn test_crop_always_within_bounds() {
        let cases = [
            square(-50.0, -50.0, 20.0, 20.0),
            square(630.0, 470.0, 700.0, 520.0),
            square(0.0, 0.0, 640.0, 480.0),
            square(320.0, 240.0, 320.0, 240.0),
        ];
        for corners in cases {
            let region = CropRegion::around(&corners, 15.0, 640, 480).unwrap();
            assert!(region.width > 0 && region.height > 0);
            assert!(region.x + region.width <= 640);
            assert!(region.y + region.height <= 480);
        }
    }

    #[test]
    fn test_crop_outside_frame() {
        assert_eq!(
            CropRegion::around(&square(900.0, 900.0, 950.0, 950.0), 15.0, 640, 480),
            None
        );
    }

    #[test]
    fn test_rotated_quad_bounds() {
        let corners = QuadCorners {
            top_left: Point::new(50.0, 10.0),
            top_right: Point::new(90.0, 50.0),
            bottom_right: Point::new(50.0, 90.0),
            bottom_left: Point::new(10.0, 50.0),
        };
        assert_eq!(corners.bounds(), (10.0, 10.0, 90.0, 90.0));
        assert_eq!(corners.scaled(2.0, 0.5).bounds(), (20.0, 5.0, 180.0, 45.0));
    }

    #[test]
    fn test_snapshot_png() {
        let frame = RgbaImage::from_pixel(64, 48, image::Rgba([10, 20, 30, 255]));
        let region = CropRegion {
            x: 8,
            y: 8,
            width: 16,
            height: 12,
        };
        let snapshot = Snapshot::capture(&frame, region).unwrap();
        assert_eq!(&snapshot.png[..8], b"\x89PNG\r\n\x1a\n");
        assert!(snapshot.data_url().starts_with("data:image/png;base64,"));

        let decoded = image::load_from_memory(&snapshot.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 12));
    }
}
