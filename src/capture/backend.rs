use tokio::sync::mpsc;

use crate::error::Result;

/// Raw audio captured from the microphone (f32 samples in [-1, 1], mono).
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    /// Milliseconds since capture started
    pub timestamp_ms: u64,
}

/// One encoded video chunk from the camera recorder.
#[derive(Debug, Clone)]
pub struct VideoChunk {
    pub data: Vec<u8>,
    /// Milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Microphone capture backend.
///
/// Implementations deliver frames over a channel for the lifetime of the
/// acquisition; `release` must stop the underlying device unconditionally.
#[async_trait::async_trait]
pub trait AudioCaptureBackend: Send {
    /// Acquire the device and start capturing.
    ///
    /// Returns a channel receiver that will receive audio frames.
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing and free the device handle.
    async fn release(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Camera capture backend producing encoded clip chunks.
#[async_trait::async_trait]
pub trait VideoCaptureBackend: Send {
    async fn acquire(&mut self) -> Result<mpsc::Receiver<VideoChunk>>;

    async fn release(&mut self) -> Result<()>;

    fn is_capturing(&self) -> bool;

    fn name(&self) -> &str;
}

/// Video backend used when no camera pipeline is wired in. The chunk
/// channel closes immediately and per-turn clips come out empty.
pub struct NullVideoBackend {
    capturing: bool,
}

impl NullVideoBackend {
    pub fn new() -> Self {
        Self { capturing: false }
    }
}

impl Default for NullVideoBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl VideoCaptureBackend for NullVideoBackend {
    async fn acquire(&mut self) -> Result<mpsc::Receiver<VideoChunk>> {
        let (_tx, rx) = mpsc::channel(1);
        self.capturing = true;
        Ok(rx)
    }

    async fn release(&mut self) -> Result<()> {
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "null-video"
    }
}
