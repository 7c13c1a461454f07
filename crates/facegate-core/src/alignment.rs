//! Face alignment gate.
//!
//! Decides from bounding-box width and head pose whether a detected face is
//! framed well enough to be worth an embedder invocation, and produces the
//! feedback shown to the user on every frame.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Acceptable face geometry. All bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateBounds {
    /// Minimum bounding-box width in pixels.
    pub min_width: u32,
    /// Maximum bounding-box width in pixels.
    pub max_width: u32,
    /// Maximum absolute yaw, pitch and roll in degrees.
    pub max_angle: f32,
}

impl Default for GateBounds {
    fn default() -> Self {
        Self {
            min_width: 180,
            max_width: 420,
            max_angle: 15.0,
        }
    }
}

/// User-facing framing feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentFeedback {
    NoFaceDetected,
    MoveCloser,
    MoveBack,
    KeepLevel,
    Aligned,
}

impl AlignmentFeedback {
    pub fn message(self) -> &'static str {
        match self {
            Self::NoFaceDetected => "no face detected",
            Self::MoveCloser => "move closer",
            Self::MoveBack => "move back",
            Self::KeepLevel => "keep your face level and straight",
            Self::Aligned => "aligned",
        }
    }
}

impl fmt::Display for AlignmentFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Gate decision for one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentVerdict {
    pub aligned: bool,
    pub feedback: AlignmentFeedback,
}

impl AlignmentVerdict {
    pub fn no_face() -> Self {
        Self {
            aligned: false,
            feedback: AlignmentFeedback::NoFaceDetected,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlignmentGate {
    bounds: GateBounds,
}

impl AlignmentGate {
    pub fn new(bounds: GateBounds) -> Self {
        Self { bounds }
    }

    /// Evaluate face geometry. Width is checked before pose, so a face that
    /// is both too small and tilted is told to move closer first.
    pub fn evaluate(&self, box_width: u32, yaw: f32, pitch: f32, roll: f32) -> AlignmentVerdict {
        let feedback = if box_width < self.bounds.min_width {
            AlignmentFeedback::MoveCloser
        } else if box_width > self.bounds.max_width {
            AlignmentFeedback::MoveBack
        } else if ![yaw, pitch, roll].iter().all(|a| self.angle_ok(*a)) {
            AlignmentFeedback::KeepLevel
        } else {
            AlignmentFeedback::Aligned
        };

        AlignmentVerdict {
            aligned: feedback == AlignmentFeedback::Aligned,
            feedback,
        }
    }

    // NaN falls outside the range.
    fn angle_ok(&self, angle: f32) -> bool {
        (-self.bounds.max_angle..=self.bounds.max_angle).contains(&angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(width: u32, yaw: f32, pitch: f32, roll: f32) -> AlignmentVerdict {
        AlignmentGate::default().evaluate(width, yaw, pitch, roll)
    }

    #[test]
    fn test_too_small() {
        let v = eval(150, 0.0, 0.0, 0.0);
        assert!(!v.aligned);
        assert_eq!(v.feedback.message(), "move closer");
    }

    #[test]
    fn test_too_large() {
        let v = eval(450, 0.0, 0.0, 0.0);
        assert!(!v.aligned);
        assert_eq!(v.feedback.message(), "move back");
    }

    #[test]
    fn test_tilted() {
        let v = eval(300, 20.0, 0.0, 0.0);
        assert!(!v.aligned);
        assert_eq!(v.feedback.message(), "keep your face level and straight");

        assert_eq!(eval(300, 0.0, -15.5, 0.0).feedback, AlignmentFeedback::KeepLevel);
        assert_eq!(eval(300, 0.0, 0.0, 40.0).feedback, AlignmentFeedback::KeepLevel);
    }

    #[test]
    fn test_aligned() {
        let v = eval(300, 0.0, 0.0, 0.0);
        assert!(v.aligned);
        assert_eq!(v.feedback.message(), "aligned");
    }

    #[test]
    fn test_bounds_inclusive() {
        assert!(eval(180, 15.0, -15.0, 15.0).aligned);
        assert!(eval(420, -15.0, 15.0, -15.0).aligned);
        assert_eq!(eval(179, 0.0, 0.0, 0.0).feedback, AlignmentFeedback::MoveCloser);
        assert_eq!(eval(421, 0.0, 0.0, 0.0).feedback, AlignmentFeedback::MoveBack);
    }

    #[test]
    fn test_width_checked_before_pose() {
        assert_eq!(eval(100, 45.0, 0.0, 0.0).feedback, AlignmentFeedback::MoveCloser);
        assert_eq!(eval(500, 0.0, 45.0, 0.0).feedback, AlignmentFeedback::MoveBack);
    }

    #[test]
    fn test_nan_angle_rejected() {
        assert_eq!(eval(300, f32::NAN, 0.0, 0.0).feedback, AlignmentFeedback::KeepLevel);
    }

    #[test]
    fn test_custom_bounds() {
        let gate = AlignmentGate::new(GateBounds {
            min_width: 200,
            max_width: 400,
            max_angle: 10.0,
        });
        assert_eq!(gate.evaluate(190, 0.0, 0.0, 0.0).feedback, AlignmentFeedback::MoveCloser);
        assert_eq!(gate.evaluate(300, 12.0, 0.0, 0.0).feedback, AlignmentFeedback::KeepLevel);
        assert!(gate.evaluate(300, 9.0, 0.0, 0.0).aligned);
    }
}
