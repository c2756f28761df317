pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod posture;
pub mod prompt;
pub mod services;
pub mod session;
pub mod streaming;

pub use audio::{encode_wav, AudioFramer};
pub use capture::{AudioCaptureBackend, CaptureSession, ClipRecorder, VideoCaptureBackend};
pub use config::Config;
pub use error::{Error, Result};
pub use posture::{PostureConfig, PostureCounts, PostureSegment, PostureTracker};
pub use session::{
    InterviewOutcome, Phase, SessionConfig, SessionHandle, SessionOrchestrator, SessionStatus,
};
pub use streaming::{TranscriberConnector, TurnContext, TurnTranscript, WsTranscriberConnector};
