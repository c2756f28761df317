use std::io::Cursor;

use crate::error::Result;

/// Converts captured f32 samples into fixed-width 16-bit PCM frames for
/// streaming, and finalizes the accumulated take into a mono WAV container.
///
/// Holds nothing but the running sample buffer, so it is safe to drive from
/// any task.
pub struct AudioFramer {
    sample_rate: u32,
    samples: Vec<f32>,
}

impl AudioFramer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: Vec::new(),
        }
    }

    /// Quantize one f32 sample in [-1, 1] to i16.
    ///
    /// Negative samples scale by 32768, positive by 32767, so both ends of
    /// the range map onto the full signed 16-bit span. Out-of-range input
    /// saturates.
    pub fn quantize(s: f32) -> i16 {
        let s = s.clamp(-1.0, 1.0);
        let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
        scaled.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }

    /// Convert one capture buffer to little-endian 16-bit PCM bytes,
    /// appending the raw samples to the running take.
    pub fn frame(&mut self, raw: &[f32]) -> Vec<u8> {
        self.samples.extend_from_slice(raw);

        let mut bytes = Vec::with_capacity(raw.len() * 2);
        for &s in raw {
            bytes.extend_from_slice(&Self::quantize(s).to_le_bytes());
        }
        bytes
    }

    /// Number of samples accumulated so far.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Encode the accumulated take as a mono 16-bit WAV file in memory.
    ///
    /// Output is the standard 44-byte RIFF/WAVE header followed by the
    /// samples, so the byte length is always `44 + 2 * sample_count`.
    pub fn finalize(&self) -> Result<Vec<u8>> {
        encode_wav(&self.samples, self.sample_rate)
    }

    /// Drop the accumulated take (start of a new question turn).
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Encode f32 samples as an in-memory mono 16-bit WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample(AudioFramer::quantize(s))?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
