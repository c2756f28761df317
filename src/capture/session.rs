use tokio::sync::mpsc;
use tracing::{error, info};

use super::backend::{
    AudioCaptureBackend, AudioFrame, VideoCaptureBackend, VideoChunk,
};
use crate::error::{Error, Result};

/// Owns the camera and microphone for the lifetime of one interview.
///
/// The orchestrator only ever asks for `acquire`, the frame streams, and
/// `release`; it never touches the device handles directly. `release` stops
/// both backends unconditionally and is safe to call on every exit path.
pub struct CaptureSession {
    audio: Box<dyn AudioCaptureBackend>,
    video: Box<dyn VideoCaptureBackend>,
    audio_rx: Option<mpsc::Receiver<AudioFrame>>,
    video_rx: Option<mpsc::Receiver<VideoChunk>>,
}

impl CaptureSession {
    pub fn new(audio: Box<dyn AudioCaptureBackend>, video: Box<dyn VideoCaptureBackend>) -> Self {
        Self {
            audio,
            video,
            audio_rx: None,
            video_rx: None,
        }
    }

    /// Acquire both devices. Fails with `DeviceUnavailable` if either is
    /// denied; a partially-acquired session is released before returning.
    pub async fn acquire(&mut self) -> Result<()> {
        if self.audio_rx.is_some() {
            return Ok(());
        }

        info!(
            "Acquiring capture devices: {} + {}",
            self.audio.name(),
            self.video.name()
        );

        let audio_rx = self.audio.acquire().await?;

        let video_rx = match self.video.acquire().await {
            Ok(rx) => rx,
            Err(e) => {
                // Don't leak the mic if the camera is denied.
                if let Err(release_err) = self.audio.release().await {
                    error!("Failed to release microphone: {}", release_err);
                }
                return Err(e);
            }
        };

        self.audio_rx = Some(audio_rx);
        self.video_rx = Some(video_rx);

        Ok(())
    }

    /// Mutable access to both frame streams for one recording window.
    pub fn streams(
        &mut self,
    ) -> Result<(&mut mpsc::Receiver<AudioFrame>, &mut mpsc::Receiver<VideoChunk>)> {
        match (self.audio_rx.as_mut(), self.video_rx.as_mut()) {
            (Some(audio), Some(video)) => Ok((audio, video)),
            _ => Err(Error::DeviceUnavailable(
                "capture session not acquired".to_string(),
            )),
        }
    }

    pub fn is_active(&self) -> bool {
        self.audio_rx.is_some()
    }

    /// Stop both devices. Both releases are always attempted; the first
    /// failure is reported after the second release has run.
    pub async fn release(&mut self) -> Result<()> {
        self.audio_rx = None;
        self.video_rx = None;

        let audio_result = self.audio.release().await;
        let video_result = self.video.release().await;

        if let Err(e) = &audio_result {
            error!("Failed to release {}: {}", self.audio.name(), e);
        }
        if let Err(e) = &video_result {
            error!("Failed to release {}: {}", self.video.name(), e);
        }

        audio_result.and(video_result)
    }
}

/// Buffers one question turn's encoded video chunks into a single clip.
///
/// Torn down and recreated every turn.
#[derive(Debug, Default)]
pub struct ClipRecorder {
    chunks: Vec<u8>,
    chunk_count: usize,
}

impl ClipRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &VideoChunk) {
        self.chunks.extend_from_slice(&chunk.data);
        self.chunk_count += 1;
    }

    /// Materialize the clip. Returns `None` when no chunks arrived (no
    /// camera pipeline, or the turn was too short).
    pub fn finish(self) -> Option<Vec<u8>> {
        if self.chunks.is_empty() {
            None
        } else {
            info!(
                "Clip materialized: {} chunks, {} bytes",
                self.chunk_count,
                self.chunks.len()
            );
            Some(self.chunks)
        }
    }
}
