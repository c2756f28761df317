use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub interview: InterviewConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the Question/Analysis service
    pub api_base: String,
    /// Base URL of the streaming transcription service (ws:// or wss://)
    pub ws_base: String,
    /// Base URL where pre-rendered question prompts are hosted
    pub tts_base: String,
}

// Capture is mono by contract (the mic backend only accepts single-channel
// configs), so only the rate and frame width are configurable.
#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Samples per streamed PCM frame
    pub frame_samples: usize,
}

#[derive(Debug, Deserialize)]
pub struct InterviewConfig {
    /// Hard cap on a single answer, in seconds
    pub max_answer_secs: u64,
    /// Delay between question generation and the question fetch, in seconds
    pub question_settle_secs: u64,
    /// One-shot delay before the secondary follow-up audio lookup, in seconds
    pub followup_audio_retry_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))
    }
}
