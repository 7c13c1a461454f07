//! Face detector capability.
//!
//! Detection itself lives outside this crate; the pipeline only needs a
//! source of face boxes with head pose for each frame.

use crate::types::FaceObservation;
use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detector unavailable: {0}")]
    Unavailable(String),
    #[error("detection failed: {0}")]
    Failed(String),
}

/// Locates faces in a frame.
///
/// Implementations should order results so the primary face comes first;
/// the pipeline only evaluates `faces[0]`. A failure is treated as "no face".
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, frame: &RgbImage) -> Result<Vec<FaceObservation>, DetectorError>;
}
