use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::backend::{AudioCaptureBackend, AudioFrame};
use crate::error::{Error, Result};

/// Microphone backend built on cpal.
///
/// The cpal stream is not `Send`, so it lives on a dedicated thread that
/// parks until `release` raises the stop flag.
pub struct CpalMicBackend {
    sample_rate: u32,
    frame_samples: usize,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalMicBackend {
    pub fn new(sample_rate: u32, frame_samples: usize) -> Self {
        Self {
            sample_rate,
            frame_samples,
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioCaptureBackend for CpalMicBackend {
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.thread.is_some() {
            return Err(Error::DeviceUnavailable(
                "microphone already acquired".to_string(),
            ));
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no input device available".to_string()))?;

        let supported = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(self.sample_rate)
                    && c.max_sample_rate() >= SampleRate(self.sample_rate)
            })
            .ok_or_else(|| {
                Error::DeviceUnavailable("no suitable microphone config found".to_string())
            })?;

        let config = supported.with_sample_rate(SampleRate(self.sample_rate)).config();

        info!(
            "Microphone acquired: {} ({} Hz, {} ch)",
            device.name().unwrap_or_default(),
            self.sample_rate,
            config.channels
        );

        let (tx, rx) = mpsc::channel(64);
        let stop = Arc::clone(&self.stop);
        stop.store(false, Ordering::SeqCst);

        let frame_samples = self.frame_samples;
        let sample_rate = self.sample_rate;

        let thread = std::thread::spawn(move || {
            let mut pending: Vec<f32> = Vec::with_capacity(frame_samples * 2);
            let mut sent_samples: u64 = 0;

            let stream = device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    pending.extend_from_slice(data);
                    while pending.len() >= frame_samples {
                        let samples: Vec<f32> = pending.drain(..frame_samples).collect();
                        let frame = AudioFrame {
                            samples,
                            timestamp_ms: sent_samples * 1000 / u64::from(sample_rate),
                        };
                        sent_samples += frame_samples as u64;
                        // Never block the audio callback; drop on backpressure.
                        if tx.try_send(frame).is_err() {
                            warn!("Audio frame dropped: receiver full or closed");
                        }
                    }
                },
                |err| {
                    error!("Microphone capture error: {}", err);
                },
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    error!("Failed to build microphone stream: {}", e);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                error!("Failed to start microphone stream: {}", e);
                return;
            }

            while !stop.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(50));
            }

            drop(stream);
        });

        self.thread = Some(thread);

        Ok(rx)
    }

    async fn release(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);

        if let Some(thread) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || thread.join()).await;
            match joined {
                Ok(Ok(())) => info!("Microphone released"),
                Ok(Err(_)) => error!("Microphone capture thread panicked"),
                Err(e) => error!("Failed to join microphone thread: {}", e),
            }
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.thread.is_some()
    }

    fn name(&self) -> &str {
        "cpal-microphone"
    }
}
