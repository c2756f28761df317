//! Device capture
//!
//! Camera/microphone ownership for the lifetime of an interview:
//! - Backend traits delivering frames over channels
//! - cpal microphone backend, synthetic backends for offline runs
//! - `CaptureSession` with explicit acquire/release semantics
//! - Per-turn `ClipRecorder`

pub mod backend;
pub mod mic;
pub mod session;
pub mod synthetic;

pub use backend::{
    AudioCaptureBackend, AudioFrame, NullVideoBackend, VideoCaptureBackend, VideoChunk,
};
pub use mic::CpalMicBackend;
pub use session::{CaptureSession, ClipRecorder};
pub use synthetic::{SyntheticAudioBackend, SyntheticVideoBackend};
