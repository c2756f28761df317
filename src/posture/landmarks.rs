use serde::{Deserialize, Serialize};

/// One landmark position in normalized image coordinates (0..1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Normalized iris position inside the left-eye corner span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub iris_x: f64,
    pub eye_left_x: f64,
    pub eye_right_x: f64,
}

impl GazeSample {
    /// Iris position as a fraction of the eye-corner span. A degenerate
    /// span reads as centered.
    pub fn iris_position(&self) -> f64 {
        let range = self.eye_right_x - self.eye_left_x;
        if range > 0.0 {
            (self.iris_x - self.eye_left_x) / range
        } else {
            0.5
        }
    }
}

/// One posture sample: body landmarks plus iris data when the face model
/// produced any.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    pub left_shoulder: Point,
    pub right_shoulder: Point,
    pub nose: Point,
    pub left_ear: Point,
    pub right_ear: Point,
    pub gaze: Option<GazeSample>,
}

/// Contract for the external pose/face model.
///
/// The orchestrator polls this at the posture sampling cadence; `None`
/// means no landmarks were detected for the current video frame.
pub trait PoseEstimator: Send + Sync {
    fn sample(&self) -> Option<LandmarkFrame>;
}

/// Estimator used when no pose model is wired in; posture tracking stays
/// inert for the whole session.
pub struct NullPoseEstimator;

impl PoseEstimator for NullPoseEstimator {
    fn sample(&self) -> Option<LandmarkFrame> {
        None
    }
}
