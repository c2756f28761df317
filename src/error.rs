use thiserror::Error;

/// Error taxonomy for the interview session.
///
/// Only `DeviceUnavailable` blocks a session from starting. Everything
/// else degrades to "skip this artifact, keep going": the orchestrator
/// logs the failure and moves on.
#[derive(Debug, Error)]
pub enum Error {
    /// Camera or microphone could not be acquired. Fatal before start;
    /// the caller is expected to redirect to a device check.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The streaming transcription connection failed. Non-fatal: local
    /// capture continues and the fallback upload still carries the audio.
    #[error("streaming connection failed: {0}")]
    Streaming(String),

    /// A per-turn artifact upload failed. Non-fatal, per artifact.
    #[error("upload of {artifact} failed: {message}")]
    Upload { artifact: &'static str, message: String },

    /// The follow-up service errored or returned garbage. Treated as
    /// "no follow-up".
    #[error("follow-up service error: {0}")]
    Followup(String),

    /// Final analysis could not be obtained. The session still terminates,
    /// with an empty analysis payload.
    #[error("analysis unavailable: {0}")]
    Analysis(String),

    /// The Question/Analysis service rejected or failed a request.
    #[error("question service error: {0}")]
    Service(String),

    /// Audio capture, framing, or playback error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Service(e.to_string())
    }
}

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        Error::Audio(e.to_string())
    }
}
