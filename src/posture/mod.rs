//! Posture tracking
//!
//! Samples the video feed at a fixed cadence, classifies each landmark
//! sample into a violation category, and debounces transient detections
//! into durable segments relative to the current question turn.

mod landmarks;
mod tracker;

pub use landmarks::{GazeSample, LandmarkFrame, NullPoseEstimator, Point, PoseEstimator};
pub use tracker::{
    classify, clip_segments, ClippedSegment, PostureConfig, PostureCounts, PostureReason,
    PostureSegment, PostureTracker,
};
