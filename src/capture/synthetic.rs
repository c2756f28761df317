use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioCaptureBackend, AudioFrame, VideoCaptureBackend, VideoChunk};
use crate::error::Result;

/// Generates a paced sine tone instead of reading a microphone. Used for
/// offline runs and integration tests.
pub struct SyntheticAudioBackend {
    sample_rate: u32,
    frame_samples: usize,
    stop: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SyntheticAudioBackend {
    pub fn new(sample_rate: u32, frame_samples: usize) -> Self {
        Self {
            sample_rate,
            frame_samples,
            stop: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioCaptureBackend for SyntheticAudioBackend {
    async fn acquire(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(64);
        let stop = Arc::clone(&self.stop);
        stop.store(false, Ordering::SeqCst);

        let sample_rate = self.sample_rate;
        let frame_samples = self.frame_samples;
        let frame_ms = frame_samples as u64 * 1000 / u64::from(sample_rate);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms.max(1)));
            let mut sent_samples: u64 = 0;

            loop {
                ticker.tick().await;
                if stop.load(Ordering::SeqCst) {
                    break;
                }

                let samples: Vec<f32> = (0..frame_samples)
                    .map(|i| {
                        let t = (sent_samples + i as u64) as f32 / sample_rate as f32;
                        (t * 440.0 * TAU).sin() * 0.2
                    })
                    .collect();

                let frame = AudioFrame {
                    samples,
                    timestamp_ms: sent_samples * 1000 / u64::from(sample_rate),
                };
                sent_samples += frame_samples as u64;

                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        self.task = Some(task);
        info!("Synthetic audio backend started ({} Hz)", sample_rate);

        Ok(rx)
    }

    async fn release(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.is_some()
    }

    fn name(&self) -> &str {
        "synthetic-audio"
    }
}

/// Emits small opaque chunks on a fixed cadence, standing in for a camera
/// clip recorder.
pub struct SyntheticVideoBackend {
    chunk_interval: Duration,
    stop: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SyntheticVideoBackend {
    pub fn new(chunk_interval: Duration) -> Self {
        Self {
            chunk_interval,
            stop: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl VideoCaptureBackend for SyntheticVideoBackend {
    async fn acquire(&mut self) -> Result<mpsc::Receiver<VideoChunk>> {
        let (tx, rx) = mpsc::channel(64);
        let stop = Arc::clone(&self.stop);
        stop.store(false, Ordering::SeqCst);

        let interval = self.chunk_interval;

        let task = tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let mut ticker = tokio::time::interval(interval);
            let mut index: u8 = 0;

            loop {
                ticker.tick().await;
                if stop.load(Ordering::SeqCst) {
                    break;
                }

                let chunk = VideoChunk {
                    data: vec![index; 256],
                    timestamp_ms: started.elapsed().as_millis() as u64,
                };
                index = index.wrapping_add(1);

                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        });

        self.task = Some(task);

        Ok(rx)
    }

    async fn release(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.is_some()
    }

    fn name(&self) -> &str {
        "synthetic-video"
    }
}
