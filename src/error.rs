//! Error Types
//!
//! Failure taxonomy shared by the camera, decoder, actions and rule table.

use thiserror::Error;

/// Camera acquisition / capture failures
///
/// `BadFrame` costs one sample and the loop moves on. Every other variant
/// ends the current scan attempt but leaves the controller restartable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// No camera API on this build or platform
    #[error("camera API unavailable")]
    Unavailable,
    /// User or OS refused access to the device
    #[error("camera permission denied")]
    PermissionDenied,
    /// No capture device (or input file) found
    #[error("no camera found")]
    NotFound,
    /// Anything else the backend reports
    #[error("camera failure: {0}")]
    Failure(String),
    /// One frame couldn't be read (corrupt MJPEG, short buffer); the stream is fine
    #[error("unreadable frame: {0}")]
    BadFrame(String),
}

impl CameraError {
    /// Message shown to the user in the result region
    pub fn user_message(&self) -> &'static str {
        match self {
            CameraError::Unavailable => "Camera access is not supported on this build",
            CameraError::PermissionDenied => {
                "Camera access was denied. Please allow camera access in your system settings"
            }
            CameraError::NotFound => "No camera found",
            CameraError::Failure(_) => "Unable to access the camera",
            CameraError::BadFrame(_) => "The camera delivered an unreadable frame",
        }
    }
}

/// A single decode attempt failed (malformed pixel data, bad raster size)
///
/// Never fatal: the sampling loop logs it and moves on to the next frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("raster is empty ({width}x{height})")]
    EmptyRaster { width: u32, height: u32 },
    #[error("raster buffer too small: {actual} < {expected}")]
    BufferTooSmall { expected: usize, actual: usize },
}

/// Errors from user-triggered result actions
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("clipboard write failed: {0}")]
    Clipboard(String),
    #[error("failed to launch {target}: {source}")]
    Launch {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

/// Rule table compilation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid threat pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors that end a scan run
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Camera(#[from] CameraError),
}
