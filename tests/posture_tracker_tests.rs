// Tests for posture classification, debouncing, and segment clipping.

use std::time::Duration;

use greenroom::posture::{
    classify, clip_segments, GazeSample, LandmarkFrame, Point, PostureConfig, PostureReason,
    PostureSegment, PostureTracker,
};

fn point(x: f64, y: f64) -> Point {
    Point { x, y }
}

/// Upright pose: level shoulders and ears, nose above the shoulder line,
/// iris centered.
fn good_frame() -> LandmarkFrame {
    LandmarkFrame {
        left_shoulder: point(0.7, 0.5),
        right_shoulder: point(0.3, 0.5),
        nose: point(0.5, 0.4),
        left_ear: point(0.6, 0.3),
        right_ear: point(0.4, 0.3),
        gaze: Some(GazeSample {
            iris_x: 0.5,
            eye_left_x: 0.45,
            eye_right_x: 0.55,
        }),
    }
}

/// Shoulders tilted past the default 10 degree threshold.
fn tilted_shoulder_frame() -> LandmarkFrame {
    let mut frame = good_frame();
    // dy 0.08 over dx 0.4 is roughly 11.3 degrees
    frame.left_shoulder.y = 0.58;
    frame
}

fn head_down_frame() -> LandmarkFrame {
    let mut frame = good_frame();
    frame.nose = point(0.5, 0.65);
    frame
}

fn averted_gaze_frame() -> LandmarkFrame {
    let mut frame = good_frame();
    frame.gaze = Some(GazeSample {
        iris_x: 0.46,
        eye_left_x: 0.45,
        eye_right_x: 0.55,
    });
    frame
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[test]
fn test_upright_pose_is_not_a_violation() {
    assert_eq!(classify(&good_frame(), &PostureConfig::default()), None);
}

#[test]
fn test_classify_detects_each_reason() {
    let cfg = PostureConfig::default();

    assert_eq!(
        classify(&tilted_shoulder_frame(), &cfg),
        Some(PostureReason::Shoulder)
    );
    assert_eq!(classify(&head_down_frame(), &cfg), Some(PostureReason::HeadDown));
    assert_eq!(classify(&averted_gaze_frame(), &cfg), Some(PostureReason::Gaze));

    let mut ear = good_frame();
    ear.left_ear = point(0.6, 0.38); // dy 0.08 over dx 0.2 is ~21.8 degrees
    assert_eq!(classify(&ear, &cfg), Some(PostureReason::Ear));
}

#[test]
fn test_angle_threshold_is_strict() {
    // dy == dx puts the tilt at roughly 45 degrees.
    let mut frame = good_frame();
    frame.left_shoulder = point(0.7, 0.9);
    frame.right_shoulder = point(0.3, 0.5);
    frame.nose = point(0.5, 0.3);

    // Exactly at the threshold: not a violation. The angle is derived with
    // the same formula the classifier uses, so the comparison is bit-exact.
    let dy = frame.left_shoulder.y - frame.right_shoulder.y;
    let dx = frame.left_shoulder.x - frame.right_shoulder.x;
    let tilt = dy.atan2(dx).to_degrees();

    let mut cfg = PostureConfig::default();
    cfg.shoulder_angle_deg = tilt;
    assert_eq!(classify(&frame, &cfg), None, "Exactly at the boundary is allowed");

    cfg.shoulder_angle_deg = 45.1;
    assert_eq!(classify(&frame, &cfg), None, "Under the threshold is allowed");

    cfg.shoulder_angle_deg = 44.9;
    assert_eq!(classify(&frame, &cfg), Some(PostureReason::Shoulder));
}

#[test]
fn test_shoulder_wins_over_head_down() {
    let mut frame = tilted_shoulder_frame();
    frame.nose = point(0.5, 0.8);

    assert_eq!(
        classify(&frame, &PostureConfig::default()),
        Some(PostureReason::Shoulder)
    );
}

#[test]
fn test_degenerate_eye_span_reads_as_centered() {
    let gaze = GazeSample {
        iris_x: 0.9,
        eye_left_x: 0.5,
        eye_right_x: 0.5,
    };
    assert_eq!(gaze.iris_position(), 0.5);
}

#[test]
fn test_short_violation_emits_nothing() {
    let mut tracker = PostureTracker::new(PostureConfig::default());
    let bad = tilted_shoulder_frame();

    assert_eq!(tracker.observe(Some(&bad), secs(0)), None);
    assert_eq!(tracker.observe(Some(&bad), secs(2)), None, "Under the 3s persistence floor");
    assert!(tracker.segments().is_empty());
}

#[test]
fn test_persistent_violation_becomes_a_segment() {
    let mut tracker = PostureTracker::new(PostureConfig::default());
    let bad = tilted_shoulder_frame();

    assert_eq!(tracker.observe(Some(&bad), secs(0)), None);
    let segment = tracker.observe(Some(&bad), secs(3)).expect("segment at 3s");

    assert_eq!(segment.reason, PostureReason::Shoulder);
    assert_eq!(segment.start, 0.0);
    assert_eq!(segment.end, 3.0);
    assert_eq!(tracker.counts().shoulder, 1);

    // Emission resets the pending timer: the next tick starts a fresh window.
    assert_eq!(tracker.observe(Some(&bad), secs(4)), None);
    assert_eq!(tracker.observe(Some(&bad), secs(5)), None);
    assert!(tracker.observe(Some(&bad), secs(7)).is_some());
}

#[test]
fn test_recovery_resets_the_timer() {
    let mut tracker = PostureTracker::new(PostureConfig::default());
    let bad = tilted_shoulder_frame();
    let good = good_frame();

    tracker.observe(Some(&bad), secs(0));
    tracker.observe(Some(&good), secs(2));
    tracker.observe(Some(&bad), secs(4));
    assert_eq!(tracker.observe(Some(&bad), secs(6)), None, "Only 2s since the restart");

    let segment = tracker.observe(Some(&bad), secs(7)).expect("segment at 7s");
    assert_eq!(segment.start, 4.0);
}

#[test]
fn test_missing_landmarks_reset_the_timer() {
    let mut tracker = PostureTracker::new(PostureConfig::default());
    let bad = tilted_shoulder_frame();

    tracker.observe(Some(&bad), secs(0));
    tracker.observe(None, secs(2));
    tracker.observe(Some(&bad), secs(4));

    let segment = tracker.observe(Some(&bad), secs(7)).expect("segment at 7s");
    assert_eq!(segment.start, 4.0);
}

#[test]
fn test_reason_change_restarts_without_emitting() {
    let mut tracker = PostureTracker::new(PostureConfig::default());

    tracker.observe(Some(&tilted_shoulder_frame()), secs(0));
    assert_eq!(tracker.observe(Some(&averted_gaze_frame()), secs(2)), None);
    assert_eq!(tracker.observe(Some(&averted_gaze_frame()), secs(4)), None);

    let segment = tracker
        .observe(Some(&averted_gaze_frame()), secs(5))
        .expect("gaze segment");
    assert_eq!(segment.reason, PostureReason::Gaze);
    assert_eq!(segment.start, 2.0);
    assert_eq!(tracker.counts().shoulder, 0, "Interrupted shoulder violation never counted");
    assert_eq!(tracker.counts().gaze, 1);
}

#[test]
fn test_segments_are_relative_to_the_turn_baseline() {
    let mut tracker = PostureTracker::new(PostureConfig::default());
    let bad = head_down_frame();

    tracker.reset_baseline(secs(10));
    tracker.observe(Some(&bad), secs(10));
    let segment = tracker.observe(Some(&bad), secs(13)).expect("segment");

    assert_eq!(segment.start, 0.0);
    assert_eq!(segment.end, 3.0);
}

#[test]
fn test_finalize_drops_sub_half_second_segments() {
    let mut cfg = PostureConfig::default();
    cfg.min_violation = Duration::from_millis(200);
    let mut tracker = PostureTracker::new(cfg);
    let bad = tilted_shoulder_frame();

    // 0.3s violation: emitted, then dropped at teardown.
    tracker.observe(Some(&bad), Duration::from_millis(0));
    assert!(tracker.observe(Some(&bad), Duration::from_millis(300)).is_some());

    // 0.6s violation: survives.
    tracker.observe(Some(&bad), Duration::from_millis(1000));
    assert!(tracker.observe(Some(&bad), Duration::from_millis(1600)).is_some());

    let (segments, counts) = tracker.finalize();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].start, 1.0);
    assert_eq!(counts.shoulder, 2, "Counts keep every emission, the filter only trims segments");
}

#[test]
fn test_clip_segments_bounds_to_the_recording_window() {
    let segments = vec![
        PostureSegment {
            reason: PostureReason::Gaze,
            start: 5.0,
            end: 12.0,
        },
        PostureSegment {
            reason: PostureReason::Shoulder,
            start: 11.0,
            end: 14.0,
        },
        PostureSegment {
            reason: PostureReason::Ear,
            start: 1.0,
            end: 2.0,
        },
    ];

    let clipped = clip_segments(&segments, 10.0);

    assert_eq!(clipped.len(), 2, "Segment entirely past the window is dropped");
    assert_eq!(clipped[0].start, 5.0);
    assert_eq!(clipped[0].end, 10.0);
    assert_eq!(clipped[1].start, 1.0);
    assert_eq!(clipped[1].end, 2.0);
}
