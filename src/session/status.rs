use serde::{Deserialize, Serialize};

use crate::posture::{PostureCounts, PostureSegment};

/// Orchestrator state, published over the status channel.
///
/// `Ended` is terminal; no state is re-entered after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    NotStarted,
    Prompting,
    Recording,
    Uploading,
    FollowupCheck,
    Ended,
}

/// Snapshot of where the session currently is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: Phase,
    /// Current turn index into the question sequence
    pub turn: usize,
    /// Question sequence length (grows with follow-up insertion)
    pub question_count: usize,
    /// Seconds recorded in the current turn, capped at the maximum
    pub recording_elapsed_secs: u64,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: Phase::NotStarted,
            turn: 0,
            question_count: 0,
            recording_elapsed_secs: 0,
        }
    }
}

/// Terminal result of a session. Always produced; `analysis` is an empty
/// object when the analysis service failed or was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewOutcome {
    pub interview_id: String,
    pub questions_asked: usize,
    pub upload_id: Option<String>,
    pub analysis: serde_json::Value,
    pub posture_counts: PostureCounts,
    pub posture_segments: Vec<PostureSegment>,
}
