//! Native Webcam Backend
//!
//! nokhwa's capture handle is not `Send`, so it lives on a dedicated thread
//! and the stream talks to it over channels.

use std::sync::mpsc;
use std::thread;

use futures::future::{BoxFuture, FutureExt};
use image::RgbaImage;
use log::{debug, info, warn};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use tokio::sync::oneshot;

use super::camera::{fit_within, CameraBackend, CameraRequest, CameraStream, Dimensions};
use super::VideoFrame;
use crate::error::CameraError;

/// Preferred frame rate when negotiating a format
const REQUESTED_FPS: u32 = 30;

enum Command {
    Capture(mpsc::Sender<Result<RgbaImage, CameraError>>),
    Stop,
}

/// Webcam access through the platform's native capture API
#[derive(Debug, Default)]
pub struct NativeCamera;

impl CameraBackend for NativeCamera {
    fn name(&self) -> &'static str {
        "native"
    }

    fn open(
        &self,
        request: &CameraRequest,
    ) -> BoxFuture<'static, Result<Box<dyn CameraStream>, CameraError>> {
        let request = request.clone();

        async move {
            let (open_tx, open_rx) = oneshot::channel();
            let (ready_tx, ready_rx) = oneshot::channel();
            let (cmd_tx, cmd_rx) = mpsc::channel();
            let max = request.max;

            thread::Builder::new()
                .name("camera-capture".to_string())
                .spawn(move || camera_thread(request, open_tx, ready_tx, cmd_rx))
                .map_err(|e| CameraError::Failure(e.to_string()))?;

            open_rx
                .await
                .map_err(|_| CameraError::Failure("camera thread exited".to_string()))??;

            Ok::<Box<dyn CameraStream>, CameraError>(Box::new(NativeStream {
                cmd_tx,
                ready_rx: Some(ready_rx),
                dimensions: None,
                max,
                released: false,
            }))
        }
        .boxed()
    }
}

struct NativeStream {
    cmd_tx: mpsc::Sender<Command>,
    ready_rx: Option<oneshot::Receiver<Result<Dimensions, CameraError>>>,
    dimensions: Option<Dimensions>,
    max: Dimensions,
    released: bool,
}

impl CameraStream for NativeStream {
    fn wait_ready(&mut self) -> BoxFuture<'_, Result<Dimensions, CameraError>> {
        async move {
            if let Some(dims) = self.dimensions {
                return Ok(dims);
            }
            let rx = self
                .ready_rx
                .take()
                .ok_or_else(|| CameraError::Failure("stream never became ready".to_string()))?;
            let dims = rx
                .await
                .map_err(|_| CameraError::Failure("camera thread exited".to_string()))??;
            if !dims.is_usable() {
                return Err(CameraError::Failure(
                    "stream has no usable dimensions".to_string(),
                ));
            }
            self.dimensions = Some(dims);
            Ok(dims)
        }
        .boxed()
    }

    fn capture(&mut self) -> Result<VideoFrame, CameraError> {
        if self.released {
            return Err(CameraError::Failure("stream released".to_string()));
        }
        let (reply_tx, reply_rx) = mpsc::channel();
        self.cmd_tx
            .send(Command::Capture(reply_tx))
            .map_err(|_| CameraError::Failure("camera thread exited".to_string()))?;
        let image = reply_rx
            .recv()
            .map_err(|_| CameraError::Failure("camera thread exited".to_string()))??;
        Ok(VideoFrame::new(fit_within(image, self.max)))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            let _ = self.cmd_tx.send(Command::Stop);
        }
    }
}

impl Drop for NativeStream {
    fn drop(&mut self) {
        self.release();
    }
}

fn camera_thread(
    request: CameraRequest,
    open_tx: oneshot::Sender<Result<(), CameraError>>,
    ready_tx: oneshot::Sender<Result<Dimensions, CameraError>>,
    cmd_rx: mpsc::Receiver<Command>,
) {
    let mut camera = match open_camera(&request) {
        Ok(camera) => {
            let _ = open_tx.send(Ok(()));
            camera
        }
        Err(e) => {
            warn!("Camera open failed: {}", e);
            let _ = open_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = ready_tx.send(Err(map_error(e)));
        return;
    }

    let resolution = camera.resolution();
    info!(
        "Camera stream ready: {}x{} ({:?} facing requested)",
        resolution.width(),
        resolution.height(),
        request.facing
    );
    let _ = ready_tx.send(Ok(Dimensions::new(resolution.width(), resolution.height())));

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            Command::Capture(reply) => {
                let _ = reply.send(capture_frame(&mut camera));
            }
            Command::Stop => break,
        }
    }

    if let Err(e) = camera.stop_stream() {
        debug!("Error stopping camera stream: {}", e);
    }
    info!("Camera released");
}

fn open_camera(request: &CameraRequest) -> Result<Camera, CameraError> {
    let devices = nokhwa::query(ApiBackend::Auto).map_err(map_error)?;
    debug!("Found {} camera device(s)", devices.len());
    if devices.is_empty() || request.device_index as usize >= devices.len() {
        return Err(CameraError::NotFound);
    }

    let format = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(
        CameraFormat::new(
            Resolution::new(request.ideal.width, request.ideal.height),
            FrameFormat::MJPEG,
            REQUESTED_FPS,
        ),
    ));

    Camera::new(CameraIndex::Index(request.device_index), format).map_err(map_error)
}

/// Grab one frame; only a failed grab says anything about the stream itself
fn capture_frame(camera: &mut Camera) -> Result<RgbaImage, CameraError> {
    let buffer = camera.frame().map_err(map_error)?;
    let decoded = buffer
        .decode_image::<RgbAFormat>()
        .map_err(|e| CameraError::BadFrame(e.to_string()))?;
    let (width, height) = (decoded.width(), decoded.height());
    RgbaImage::from_raw(width, height, decoded.into_raw())
        .ok_or_else(|| CameraError::BadFrame("frame buffer size mismatch".to_string()))
}

/// nokhwa reports most failures as strings; sort them into our categories
fn map_error(error: nokhwa::NokhwaError) -> CameraError {
    let message = error.to_string();
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        CameraError::PermissionDenied
    } else if lower.contains("not found") || lower.contains("no such device") {
        CameraError::NotFound
    } else {
        CameraError::Failure(message)
    }
}
