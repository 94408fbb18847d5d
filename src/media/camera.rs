//! Camera Backends
//!
//! Acquisition is modelled as two explicit suspension points: the access
//! request (where the OS may prompt the user) and the wait for stream
//! metadata. Frame capture itself is synchronous and time-gated by the
//! sampler.

use std::path::PathBuf;

use futures::future::{self, BoxFuture, FutureExt};
use image::RgbaImage;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::VideoFrame;
use crate::error::CameraError;

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_usable(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Preferred camera direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Front camera
    User,
    /// Back camera
    #[default]
    Environment,
}

/// What to ask the camera for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraRequest {
    pub facing: Facing,
    pub ideal: Dimensions,
    /// Frames larger than this are downscaled on capture
    pub max: Dimensions,
    /// Device index for backends that enumerate devices
    pub device_index: u32,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            facing: Facing::Environment,
            ideal: Dimensions::new(400, 300),
            max: Dimensions::new(1280, 720),
            device_index: 0,
        }
    }
}

/// Source of camera streams
pub trait CameraBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Request access to a camera; resolves once access is granted or refused
    fn open(
        &self,
        request: &CameraRequest,
    ) -> BoxFuture<'static, Result<Box<dyn CameraStream>, CameraError>>;
}

/// A live stream obtained from a [`CameraBackend`]
pub trait CameraStream: Send {
    /// Resolves once the stream reports usable dimensions
    fn wait_ready(&mut self) -> BoxFuture<'_, Result<Dimensions, CameraError>>;

    /// Grab the current frame at full resolution
    fn capture(&mut self) -> Result<VideoFrame, CameraError>;

    /// Stop all tracks; further captures fail
    fn release(&mut self);
}

/// Downscale `image` to fit inside `max`, keeping the aspect ratio
pub fn fit_within(image: RgbaImage, max: Dimensions) -> RgbaImage {
    let (w, h) = image.dimensions();
    if !max.is_usable() || (w <= max.width && h <= max.height) {
        return image;
    }
    let scale = (max.width as f32 / w as f32).min(max.height as f32 / h as f32);
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    image::imageops::resize(&image, nw, nh, image::imageops::FilterType::Triangle)
}

/// Backend used when the build has no camera support
#[derive(Debug, Default)]
pub struct UnavailableCamera;

impl CameraBackend for UnavailableCamera {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn open(
        &self,
        _request: &CameraRequest,
    ) -> BoxFuture<'static, Result<Box<dyn CameraStream>, CameraError>> {
        future::ready(Err(CameraError::Unavailable)).boxed()
    }
}

/// Where a [`StillCamera`] gets its frames
#[derive(Debug, Clone)]
enum StillSource {
    Files(Vec<PathBuf>),
    Frames(Vec<RgbaImage>),
}

/// Camera that plays back still images, one per capture, looping
#[derive(Debug, Clone)]
pub struct StillCamera {
    source: StillSource,
}

impl StillCamera {
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            source: StillSource::Files(paths),
        }
    }

    pub fn from_frames(frames: Vec<RgbaImage>) -> Self {
        Self {
            source: StillSource::Frames(frames),
        }
    }
}

impl CameraBackend for StillCamera {
    fn name(&self) -> &'static str {
        "still"
    }

    fn open(
        &self,
        request: &CameraRequest,
    ) -> BoxFuture<'static, Result<Box<dyn CameraStream>, CameraError>> {
        let source = self.source.clone();
        let max = request.max;

        async move {
            let frames = match source {
                StillSource::Frames(frames) => frames,
                StillSource::Files(paths) => load_frames(&paths)?,
            };
            if frames.is_empty() {
                return Err(CameraError::NotFound);
            }
            let frames: Vec<RgbaImage> =
                frames.into_iter().map(|f| fit_within(f, max)).collect();
            info!("Still camera opened with {} frame(s)", frames.len());
            Ok::<Box<dyn CameraStream>, CameraError>(Box::new(StillStream {
                frames,
                cursor: 0,
                released: false,
            }))
        }
        .boxed()
    }
}

fn load_frames(paths: &[PathBuf]) -> Result<Vec<RgbaImage>, CameraError> {
    paths
        .iter()
        .map(|path| {
            debug!("Loading frame from {:?}", path);
            image::open(path)
                .map(|img| img.to_rgba8())
                .map_err(|e| match e {
                    image::ImageError::IoError(io) => match io.kind() {
                        std::io::ErrorKind::NotFound => CameraError::NotFound,
                        std::io::ErrorKind::PermissionDenied => CameraError::PermissionDenied,
                        _ => CameraError::Failure(format!("{}: {}", path.display(), io)),
                    },
                    other => CameraError::Failure(format!("{}: {}", path.display(), other)),
                })
        })
        .collect()
}

struct StillStream {
    frames: Vec<RgbaImage>,
    cursor: usize,
    released: bool,
}

impl CameraStream for StillStream {
    fn wait_ready(&mut self) -> BoxFuture<'_, Result<Dimensions, CameraError>> {
        let dims = self
            .frames
            .first()
            .map(|f| Dimensions::new(f.width(), f.height()))
            .filter(Dimensions::is_usable)
            .ok_or_else(|| CameraError::Failure("stream has no usable dimensions".to_string()));
        future::ready(dims).boxed()
    }

    fn capture(&mut self) -> Result<VideoFrame, CameraError> {
        if self.released {
            return Err(CameraError::Failure("stream released".to_string()));
        }
        let frame = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor += 1;
        Ok(VideoFrame::new(frame))
    }

    fn release(&mut self) {
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]))
    }

    #[tokio::test]
    async fn test_unavailable_backend() {
        let err = UnavailableCamera.open(&CameraRequest::default()).await.err();
        assert_eq!(err, Some(CameraError::Unavailable));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let camera = StillCamera::from_paths(vec![PathBuf::from("/definitely/not/here.png")]);
        let err = camera.open(&CameraRequest::default()).await.err();
        assert_eq!(err, Some(CameraError::NotFound));
    }

    #[tokio::test]
    async fn test_no_frames_is_not_found() {
        let camera = StillCamera::from_paths(Vec::new());
        let err = camera.open(&CameraRequest::default()).await.err();
        assert_eq!(err, Some(CameraError::NotFound));
    }

    #[tokio::test]
    async fn test_frames_capped_and_cycled() {
        let camera = StillCamera::from_frames(vec![solid(2560, 1440), solid(320, 240)]);
        let mut stream = camera.open(&CameraRequest::default()).await.unwrap();

        let dims = stream.wait_ready().await.unwrap();
        assert_eq!(dims, Dimensions::new(1280, 720));

        assert_eq!(stream.capture().unwrap().width(), 1280);
        assert_eq!(stream.capture().unwrap().width(), 320);
        assert_eq!(stream.capture().unwrap().width(), 1280);

        stream.release();
        assert!(stream.capture().is_err());
    }

    #[test]
    fn test_fit_within_keeps_small_frames() {
        let img = fit_within(solid(400, 300), Dimensions::new(1280, 720));
        assert_eq!(img.dimensions(), (400, 300));
    }
}
