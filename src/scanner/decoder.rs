//! QR Decoder Adapter
//!
//! Hands a grayscale raster to rqrr and returns the first decodable symbol.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::media::{Point, QuadCorners};

/// Text of a decoded symbol plus where it sits in the raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedPayload {
    pub text: String,
    pub corners: QuadCorners,
}

/// Which polarities to search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Inversion {
    /// Dark modules on a light background only
    Original,
    /// Light modules on a dark background only
    Inverted,
    /// Original first, then inverted
    #[default]
    AttemptBoth,
}

/// Decode tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub inversion: Inversion,
    /// Cap on candidate grids decoded per pass
    pub max_grids: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            inversion: Inversion::AttemptBoth,
            max_grids: 15,
        }
    }
}

/// External QR decoding routine
///
/// Implementations only read the buffer.
pub trait QrDecoder: Send {
    fn decode(
        &self,
        luma: &[u8],
        width: u32,
        height: u32,
        options: &DecodeOptions,
    ) -> Result<Option<DecodedPayload>, DecodeError>;
}

/// rqrr-backed decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDecoder;

impl QrDecoder for RqrrDecoder {
    fn decode(
        &self,
        luma: &[u8],
        width: u32,
        height: u32,
        options: &DecodeOptions,
    ) -> Result<Option<DecodedPayload>, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyRaster { width, height });
        }
        let expected = width as usize * height as usize;
        if luma.len() < expected {
            return Err(DecodeError::BufferTooSmall {
                expected,
                actual: luma.len(),
            });
        }

        let passes: &[bool] = match options.inversion {
            Inversion::Original => &[false],
            Inversion::Inverted => &[true],
            Inversion::AttemptBoth => &[false, true],
        };

        for &invert in passes {
            let found = decode_pass(
                luma,
                width as usize,
                height as usize,
                invert,
                options.max_grids,
            );
            if found.is_some() {
                return Ok(found);
            }
        }

        Ok(None)
    }
}

fn decode_pass(
    luma: &[u8],
    width: usize,
    height: usize,
    invert: bool,
    max_grids: usize,
) -> Option<DecodedPayload> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
        let v = luma[y * width + x];
        if invert {
            255 - v
        } else {
            v
        }
    });

    let grids = prepared.detect_grids();
    if !grids.is_empty() {
        debug!(
            "Found {} potential QR grids ({} pass)",
            grids.len(),
            if invert { "inverted" } else { "original" }
        );
    }

    for grid in grids.into_iter().take(max_grids) {
        match grid.decode() {
            Ok((_, content)) => {
                return Some(DecodedPayload {
                    text: content,
                    corners: corners_from(&grid.bounds),
                });
            }
            Err(e) => {
                debug!("Grid decode failed: {:?}", e);
            }
        }
    }

    None
}

/// rqrr orders bounds clockwise from the top-left finder
fn corners_from(bounds: &[rqrr::Point; 4]) -> QuadCorners {
    let p = |pt: &rqrr::Point| Point::new(pt.x as f32, pt.y as f32);
    QuadCorners {
        top_left: p(&bounds[0]),
        top_right: p(&bounds[1]),
        bottom_right: p(&bounds[2]),
        bottom_left: p(&bounds[3]),
    }
}
