//! Question prompt playback
//!
//! Fetches a question's pre-rendered audio prompt and plays it through the
//! default output device. Playback failure must never block the interview;
//! the orchestrator treats any error here as "prompt done".

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Plays a question's audio prompt to completion.
#[async_trait::async_trait]
pub trait PromptPlayer: Send + Sync {
    async fn play(&self, url: &str) -> Result<()>;

    /// Interrupt any in-flight playback. Ending the interview early must
    /// silence the prompt, not wait it out. No-op when nothing is playing.
    fn stop(&self) {}
}

/// Player used when no speaker output is wanted (headless runs, tests).
pub struct NullPromptPlayer;

#[async_trait::async_trait]
impl PromptPlayer for NullPromptPlayer {
    async fn play(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

/// Fetches the prompt WAV over HTTP and plays it on the default output
/// device.
pub struct HttpPromptPlayer {
    client: reqwest::Client,
    cancel: Arc<AtomicBool>,
}

impl HttpPromptPlayer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for HttpPromptPlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PromptPlayer for HttpPromptPlayer {
    async fn play(&self, url: &str) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Audio(format!("prompt fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Audio(format!("prompt fetch failed: {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Audio(format!("prompt fetch failed: {e}")))?;

        let (samples, sample_rate) = decode_wav(&bytes)?;
        debug!(
            "Playing question prompt: {} samples at {} Hz",
            samples.len(),
            sample_rate
        );

        self.cancel.store(false, Ordering::Relaxed);
        let cancel = Arc::clone(&self.cancel);

        tokio::task::spawn_blocking(move || play_samples_blocking(&samples, sample_rate, &cancel))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }

    fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// Decode a WAV prompt into f32 samples (first channel only).
fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .into_samples::<i16>()
            .step_by(channels)
            .map(|s| s.map(|v| f32::from(v) / 32768.0))
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .step_by(channels)
            .collect::<std::result::Result<_, _>>()?,
    };

    Ok((samples, spec.sample_rate))
}

/// Play mono samples on the default output device, blocking until done
/// or cancelled.
fn play_samples_blocking(samples: &[f32], sample_rate: u32, cancel: &AtomicBool) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
    let channels = config.channels as usize;

    let source = Arc::new(samples.to_vec());
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let source_cb = Arc::clone(&source);
    let position_cb = Arc::clone(&position);
    let finished_cb = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let pos = position_cb.load(Ordering::Relaxed);
                    let sample = if pos < source_cb.len() {
                        position_cb.store(pos + 1, Ordering::Relaxed);
                        source_cb[pos]
                    } else {
                        finished_cb.store(true, Ordering::Relaxed);
                        0.0
                    };
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| {
                error!("Prompt playback error: {}", err);
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = samples.len() as u64 * 1000 / u64::from(sample_rate);
    let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

    while !finished.load(Ordering::Relaxed) && !cancel.load(Ordering::Relaxed) {
        if Instant::now() > deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
    Ok(())
}
