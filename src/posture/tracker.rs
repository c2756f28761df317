use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::landmarks::LandmarkFrame;

/// Posture violation categories, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostureReason {
    #[serde(rename = "shoulder")]
    Shoulder,
    #[serde(rename = "ear")]
    Ear,
    #[serde(rename = "headDown")]
    HeadDown,
    #[serde(rename = "gaze")]
    Gaze,
}

/// Detection thresholds and debounce timing.
///
/// Kept as configuration so threshold tuning never touches the state
/// machine.
#[derive(Debug, Clone)]
pub struct PostureConfig {
    /// Shoulder tilt violation threshold, degrees (strict >)
    pub shoulder_angle_deg: f64,
    /// Ear tilt violation threshold, degrees (strict >)
    pub ear_angle_deg: f64,
    /// Nose must sit this far below the shoulder midline (normalized y)
    pub head_down_margin: f64,
    /// Acceptable iris position band inside the eye-corner span
    pub gaze_band: (f64, f64),
    /// A violation must persist this long before it becomes a segment
    pub min_violation: Duration,
    /// Segments shorter than this are dropped at teardown
    pub min_segment: Duration,
    /// Sampling cadence for the video feed
    pub sample_interval: Duration,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            shoulder_angle_deg: 10.0,
            ear_angle_deg: 10.0,
            head_down_margin: 0.1,
            gaze_band: (0.35, 0.65),
            min_violation: Duration::from_secs(3),
            min_segment: Duration::from_millis(500),
            sample_interval: Duration::from_secs(3),
        }
    }
}

/// A durable posture violation, in seconds relative to the turn baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureSegment {
    pub reason: PostureReason,
    pub start: f64,
    pub end: f64,
}

/// Per-reason violation totals, reported to the final analysis request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostureCounts {
    pub shoulder: u32,
    #[serde(rename = "headDown")]
    pub head_down: u32,
    pub ear: u32,
    pub gaze: u32,
}

impl PostureCounts {
    fn increment(&mut self, reason: PostureReason) {
        match reason {
            PostureReason::Shoulder => self.shoulder += 1,
            PostureReason::Ear => self.ear += 1,
            PostureReason::HeadDown => self.head_down += 1,
            PostureReason::Gaze => self.gaze += 1,
        }
    }
}

/// Classify one landmark sample into a violation reason, if any.
///
/// When several conditions fire at once the first match wins:
/// shoulder > ear > headDown > gaze.
pub fn classify(frame: &LandmarkFrame, cfg: &PostureConfig) -> Option<PostureReason> {
    let shoulder_angle = tilt_degrees(
        frame.left_shoulder.y - frame.right_shoulder.y,
        frame.left_shoulder.x - frame.right_shoulder.x,
    );
    if shoulder_angle.abs() > cfg.shoulder_angle_deg {
        return Some(PostureReason::Shoulder);
    }

    let ear_angle = tilt_degrees(
        frame.left_ear.y - frame.right_ear.y,
        frame.left_ear.x - frame.right_ear.x,
    );
    if ear_angle.abs() > cfg.ear_angle_deg {
        return Some(PostureReason::Ear);
    }

    let avg_shoulder_y = (frame.left_shoulder.y + frame.right_shoulder.y) / 2.0;
    if frame.nose.y > avg_shoulder_y + cfg.head_down_margin {
        return Some(PostureReason::HeadDown);
    }

    if let Some(gaze) = &frame.gaze {
        let pos = gaze.iris_position();
        if pos < cfg.gaze_band.0 || pos > cfg.gaze_band.1 {
            return Some(PostureReason::Gaze);
        }
    }

    None
}

fn tilt_degrees(dy: f64, dx: f64) -> f64 {
    dy.atan2(dx).to_degrees()
}

/// Debounces transient violation detections into durable, time-stamped
/// segments.
///
/// Time is supplied by the caller as elapsed duration since session start;
/// the baseline is reset explicitly at the start of every question turn so
/// emitted segments are always relative to the current turn's recording
/// window.
pub struct PostureTracker {
    cfg: PostureConfig,
    baseline: Duration,
    pending: Option<(PostureReason, Duration)>,
    segments: Vec<PostureSegment>,
    counts: PostureCounts,
}

impl PostureTracker {
    pub fn new(cfg: PostureConfig) -> Self {
        Self {
            cfg,
            baseline: Duration::ZERO,
            pending: None,
            segments: Vec::new(),
            counts: PostureCounts::default(),
        }
    }

    /// Reset the turn baseline. Any in-flight violation is discarded.
    pub fn reset_baseline(&mut self, now: Duration) {
        self.baseline = now;
        self.pending = None;
    }

    /// Feed one sampling tick. Returns the segment emitted on this tick,
    /// if the active violation just crossed the persistence threshold.
    pub fn observe(
        &mut self,
        landmarks: Option<&LandmarkFrame>,
        now: Duration,
    ) -> Option<PostureSegment> {
        let Some(frame) = landmarks else {
            self.pending = None;
            return None;
        };

        let Some(reason) = classify(frame, &self.cfg) else {
            self.pending = None;
            return None;
        };

        match self.pending {
            Some((current, started)) if current == reason => {
                if now.saturating_sub(started) >= self.cfg.min_violation {
                    let segment = PostureSegment {
                        reason,
                        start: started.saturating_sub(self.baseline).as_secs_f64(),
                        end: now.saturating_sub(self.baseline).as_secs_f64(),
                    };
                    debug!(
                        "Posture violation: {:?} {:.1}s - {:.1}s",
                        segment.reason, segment.start, segment.end
                    );
                    self.counts.increment(reason);
                    self.segments.push(segment.clone());
                    self.pending = None;
                    return Some(segment);
                }
                None
            }
            // A different reason restarts the timer without emitting
            // anything for the interrupted one.
            _ => {
                self.pending = Some((reason, now));
                None
            }
        }
    }

    /// All segments emitted so far, in emission order.
    pub fn segments(&self) -> &[PostureSegment] {
        &self.segments
    }

    pub fn counts(&self) -> &PostureCounts {
        &self.counts
    }

    /// Tear down the tracker: drop segments shorter than the minimum
    /// duration and return the surviving segments with the final counts.
    pub fn finalize(self) -> (Vec<PostureSegment>, PostureCounts) {
        let min = self.cfg.min_segment.as_secs_f64();
        let segments = self
            .segments
            .into_iter()
            .filter(|s| s.end - s.start >= min)
            .collect();
        (segments, self.counts)
    }
}

/// A segment clipped to one turn's recorded duration, as uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClippedSegment {
    pub start: f64,
    pub end: f64,
}

/// Clip segments to `[0, duration]`, dropping any that fall entirely
/// outside the turn's recording window.
pub fn clip_segments(segments: &[PostureSegment], duration_secs: f64) -> Vec<ClippedSegment> {
    segments
        .iter()
        .filter(|s| s.start < duration_secs && s.end > 0.0)
        .map(|s| ClippedSegment {
            start: s.start.max(0.0),
            end: s.end.min(duration_secs),
        })
        .collect()
}
