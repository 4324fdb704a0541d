//! Waveform loading
//!
//! Decode, downmix and resample a source into the mono waveform that every
//! downstream stage expects.

use crate::error::DetectionError;
use crate::io::decoder::{decode_audio, AudioSource};
use crate::io::Waveform;
use crate::preprocessing::channel_mixer::downmix_interleaved;
use crate::preprocessing::resample::resample_mono;

/// Load a mono waveform at `target_rate`
///
/// # Arguments
///
/// * `source` - File path or in-memory buffer
/// * `target_rate` - Output sample rate in Hz (typically [`crate::config::TARGET_SAMPLE_RATE`])
///
/// # Returns
///
/// Mono waveform at `target_rate`
///
/// # Errors
///
/// Returns `DetectionError::Decode` if the source cannot be decoded or resampled
pub fn load_waveform(source: &AudioSource, target_rate: u32) -> Result<Waveform, DetectionError> {
    let decoded = decode_audio(source)?;
    let mono = downmix_interleaved(&decoded.samples, decoded.channels)?;
    let waveform = Waveform::new(resample_mono(&mono, decoded.sample_rate, target_rate)?, target_rate);

    log::debug!(
        "Loaded {}: {} samples at {} Hz ({:.2} s)",
        source.describe(),
        waveform.len(),
        target_rate,
        waveform.duration_seconds()
    );

    Ok(waveform)
}

/// Load a waveform, substituting an empty one on failure
///
/// Batch jobs use this so one unreadable file does not abort the run.
pub fn load_waveform_or_empty(source: &AudioSource, target_rate: u32) -> Waveform {
    match load_waveform(source, target_rate) {
        Ok(waveform) => waveform,
        Err(e) => {
            log::warn!("Failed to load {}: {}", source.describe(), e);
            Waveform::empty(target_rate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stereo_wav(frames: usize, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..frames {
                writer.write_sample(0.5f32).unwrap();
                writer.write_sample(-0.1f32).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_load_downmixes_and_resamples() {
        let source = AudioSource::from_bytes(stereo_wav(44100, 44100), Some("wav"));
        let waveform = load_waveform(&source, 22050).unwrap();

        assert_eq!(waveform.sample_rate(), 22050);
        assert_eq!(waveform.len(), 22050);
        let mid = waveform.samples()[11025];
        assert!((mid - 0.2).abs() < 0.01, "downmixed level should be 0.2, got {}", mid);
    }

    #[test]
    fn test_native_rate_untouched() {
        let source = AudioSource::from_bytes(stereo_wav(1000, 22050), Some("wav"));
        let waveform = load_waveform(&source, 22050).unwrap();
        assert_eq!(waveform.len(), 1000);
        assert!(waveform.samples().iter().all(|&x| (x - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_or_empty_on_failure() {
        let source = AudioSource::from_bytes(vec![0u8; 16], Some("mp3"));
        let waveform = load_waveform_or_empty(&source, 22050);
        assert!(waveform.is_empty());
        assert_eq!(waveform.sample_rate(), 22050);
    }
}
