use crate::embedding::Embedding;
use serde::{Deserialize, Serialize};

/// One detected face: pixel bounding box and head pose in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Rotation around the vertical axis (turning left/right).
    pub yaw: f32,
    /// Rotation around the horizontal axis (nodding).
    pub pitch: f32,
    /// In-plane rotation (tilting the head sideways).
    pub roll: f32,
}

/// An enrolled identity as read from the gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolledIdentity {
    pub id: String,
    pub name: String,
    /// Opaque locator of the reference image captured at enrollment.
    pub image_ref: String,
    pub embedding: Embedding,
    pub created_at: String,
}

/// Outcome of matching a query embedding against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// The accepted identity (always the one with the lowest L2 distance).
    pub identity: Option<EnrolledIdentity>,
    /// Lowest L2 distance found across the gallery.
    pub l2_distance: f32,
    /// Highest cosine similarity found across the gallery, possibly from a
    /// different entry than `identity`.
    pub similarity: f32,
}

impl MatchResult {
    /// No identity: empty gallery or nothing comparable.
    pub fn no_match() -> Self {
        Self {
            identity: None,
            l2_distance: f32::INFINITY,
            similarity: -1.0,
        }
    }

    pub fn is_match(&self) -> bool {
        self.identity.is_some()
    }
}
