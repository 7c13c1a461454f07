//! Cut a detected face out of a frame and prepare it for the embedder.

use crate::brightness::BrightnessPolicy;
use crate::types::FaceObservation;
use image::imageops::{self, FilterType};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CropError {
    #[error("face region {x},{y} {width}x{height} lies outside the {frame_width}x{frame_height} frame")]
    OutOfFrame {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("target size must be > 0")]
    ZeroSize,
}

/// Intersect the face box with the frame. Returns `(x, y, w, h)`.
fn clamp_region(face: &FaceObservation, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = face.x.min(frame_width);
    let y0 = face.y.min(frame_height);
    let x1 = face.x.saturating_add(face.width).min(frame_width);
    let y1 = face.y.saturating_add(face.height).min(frame_height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0, y0, x1 - x0, y1 - y0))
}

/// Crop the face region, clamped to the frame bounds.
pub fn crop_face(frame: &RgbImage, face: &FaceObservation) -> Result<RgbImage, CropError> {
    let (x, y, w, h) = clamp_region(face, frame.width(), frame.height()).ok_or(CropError::OutOfFrame {
        x: face.x,
        y: face.y,
        width: face.width,
        height: face.height,
        frame_width: frame.width(),
        frame_height: frame.height(),
    })?;
    Ok(imageops::crop_imm(frame, x, y, w, h).to_image())
}

/// Crop, brightness-normalize, then bilinear-resize to `size × size`.
///
/// Brightness runs on the full-resolution crop, before the resize.
pub fn prepare_face(
    frame: &RgbImage,
    face: &FaceObservation,
    size: u32,
    brightness: &BrightnessPolicy,
) -> Result<RgbImage, CropError> {
    if size == 0 {
        return Err(CropError::ZeroSize);
    }
    let cropped = crop_face(frame, face)?;
    let (adjusted, adjustment) = brightness.normalize(&cropped);
    tracing::trace!(?adjustment, width = cropped.width(), height = cropped.height(), "face cropped");
    Ok(imageops::resize(&adjusted, size, size, FilterType::Triangle))
}

/// Prepare an image that is already a face crop (no detection step).
pub fn prepare_crop(face: &RgbImage, size: u32, brightness: &BrightnessPolicy) -> Result<RgbImage, CropError> {
    let whole = FaceObservation {
        x: 0,
        y: 0,
        width: face.width(),
        height: face.height(),
        yaw: 0.0,
        pitch: 0.0,
        roll: 0.0,
    };
    prepare_face(face, &whole, size, brightness)
}
