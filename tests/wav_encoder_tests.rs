// Tests for PCM quantization and in-memory WAV encoding.

use std::io::Cursor;

use greenroom::audio::{encode_wav, AudioFramer};

#[test]
fn test_quantize_scales_asymmetrically() {
    assert_eq!(AudioFramer::quantize(0.0), 0);
    assert_eq!(AudioFramer::quantize(-1.0), -32768, "Full negative swing maps to i16::MIN");
    assert_eq!(AudioFramer::quantize(1.0), 32767, "Full positive swing maps to i16::MAX");
    assert_eq!(AudioFramer::quantize(-0.5), -16384);
    assert_eq!(AudioFramer::quantize(0.5), 16384);
}

#[test]
fn test_quantize_saturates_out_of_range_input() {
    assert_eq!(AudioFramer::quantize(2.5), 32767);
    assert_eq!(AudioFramer::quantize(-7.0), -32768);
    assert_eq!(AudioFramer::quantize(f32::INFINITY), 32767);
    assert_eq!(AudioFramer::quantize(f32::NEG_INFINITY), -32768);
}

#[test]
fn test_wav_byte_length_is_header_plus_samples() {
    let samples = vec![0.0f32; 1600];
    let wav = encode_wav(&samples, 16000).unwrap();

    assert_eq!(wav.len(), 44 + 2 * samples.len(), "44-byte header plus 2 bytes per sample");
}

#[test]
fn test_wav_header_describes_mono_16bit_pcm() {
    let samples = vec![0.25f32; 320];
    let wav = encode_wav(&samples, 16000).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();

    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);
    assert_eq!(reader.len(), 320);
}

#[test]
fn test_wav_samples_survive_roundtrip() {
    let samples = vec![0.0f32, 0.5, -0.5, 1.0, -1.0, 0.1];
    let wav = encode_wav(&samples, 16000).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();

    let expected: Vec<i16> = samples.iter().map(|&s| AudioFramer::quantize(s)).collect();
    assert_eq!(decoded, expected);
}

#[test]
fn test_framer_emits_le_pcm_and_accumulates() {
    let mut framer = AudioFramer::new(16000);

    let pcm = framer.frame(&[0.5, -0.5]);
    assert_eq!(pcm.len(), 4, "Two bytes per sample");
    assert_eq!(&pcm[0..2], &16384i16.to_le_bytes());
    assert_eq!(&pcm[2..4], &(-16384i16).to_le_bytes());
    assert_eq!(framer.sample_count(), 2);

    framer.frame(&[0.0; 100]);
    assert_eq!(framer.sample_count(), 102);

    let wav = framer.finalize().unwrap();
    assert_eq!(wav.len(), 44 + 2 * 102);
}

#[test]
fn test_framer_clear_drops_the_take() {
    let mut framer = AudioFramer::new(16000);
    framer.frame(&[0.1; 50]);
    framer.clear();

    assert_eq!(framer.sample_count(), 0);
    let wav = framer.finalize().unwrap();
    assert_eq!(wav.len(), 44, "Empty take encodes to a bare header");
}

#[test]
fn test_empty_take_still_encodes() {
    let wav = encode_wav(&[], 16000).unwrap();
    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    assert_eq!(reader.len(), 0);
}
