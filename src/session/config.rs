use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::question::DEFAULT_INTRO_MARKERS;
use crate::posture::PostureConfig;

/// Configuration for one interview session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session identity, derived from the candidate and start timestamp
    pub interview_id: String,

    /// Candidate email (used for streaming identity and uploads)
    pub email: String,

    /// Requested question difficulty, passed through to the service
    pub difficulty: String,

    /// Capture sample rate (streaming transcription expects 16kHz mono)
    pub sample_rate: u32,

    /// Hard cap on one answer's recording window
    pub max_answer: Duration,

    /// Settle delay between question generation and the question fetch
    pub question_settle: Duration,

    /// One-shot delay before retrying the follow-up audio lookup
    pub followup_audio_retry: Duration,

    /// Substrings marking a self-introduction question
    pub intro_markers: Vec<String>,

    /// Base URL of the hosted question prompts
    pub tts_base: String,

    /// Posture thresholds and debounce timing
    #[serde(skip)]
    pub posture: PostureConfig,
}

impl SessionConfig {
    pub fn new(email: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            interview_id: derive_interview_id(&email),
            email,
            difficulty: "medium".to_string(),
            sample_rate: 16000,
            max_answer: Duration::from_secs(90),
            question_settle: Duration::from_secs(3),
            followup_audio_retry: Duration::from_secs(15),
            intro_markers: DEFAULT_INTRO_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            tts_base: String::new(),
            posture: PostureConfig::default(),
        }
    }

    /// The part of the email before `@`, used for the prompt URL layout.
    pub fn email_localpart(&self) -> &str {
        email_localpart(&self.email)
    }
}

pub fn email_localpart(email: &str) -> &str {
    email.split('@').next().unwrap_or("anonymous")
}

/// `interview_{localpart}_{start millis}`, matching the server-side
/// artifact correlation key. Sessions without an email get a random
/// identity instead.
pub fn derive_interview_id(email: &str) -> String {
    let local = if email.is_empty() {
        format!("anon_{}", uuid::Uuid::new_v4().simple())
    } else {
        email_localpart(email).to_string()
    };
    format!(
        "interview_{}_{}",
        local,
        chrono::Utc::now().timestamp_millis()
    )
}
