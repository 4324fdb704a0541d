//! Sample rate conversion
//!
//! Offline conversion of a whole mono signal with rubato's FFT resampler. The
//! resampler consumes fixed-size input chunks; the tail is fed as a partial chunk
//! and the filter delay is flushed and trimmed so the output is time-aligned with
//! the input and exactly `ceil(len * to / from)` samples long.

use rubato::{FftFixedIn, Resampler};

use crate::error::DetectionError;

/// Input frames per resampler chunk
const CHUNK_SIZE: usize = 1024;

/// Sub-chunks used by the FFT resampler
const SUB_CHUNKS: usize = 2;

/// Resample a mono signal
///
/// # Arguments
///
/// * `samples` - Mono samples at `from_rate`
/// * `from_rate` - Source sample rate in Hz
/// * `to_rate` - Target sample rate in Hz
///
/// # Returns
///
/// Mono samples at `to_rate`. Returned unchanged when the rates match.
///
/// # Errors
///
/// Returns `DetectionError::InvalidInput` for zero rates, `DetectionError::Decode`
/// if the resampler fails.
pub fn resample_mono(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, DetectionError> {
    if from_rate == 0 || to_rate == 0 {
        return Err(DetectionError::InvalidInput(format!(
            "Invalid sample rates: {} Hz -> {} Hz",
            from_rate, to_rate
        )));
    }

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    log::debug!(
        "Resampling {} samples from {} Hz to {} Hz",
        samples.len(),
        from_rate,
        to_rate
    );

    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        1,
    )?;

    let expected = (samples.len() as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    let mut position = 0;
    loop {
        let needed = resampler.input_frames_next();
        if position + needed > samples.len() {
            break;
        }
        let input: [&[f32]; 1] = [&samples[position..position + needed]];
        let chunk = resampler.process(&input[..], None)?;
        output.extend_from_slice(&chunk[0]);
        position += needed;
    }

    if position < samples.len() {
        let tail: [&[f32]; 1] = [&samples[position..]];
        let chunk = resampler.process_partial(Some(&tail[..]), None)?;
        output.extend_from_slice(&chunk[0]);
    }

    // Flush the filter delay
    while output.len() < expected + delay {
        let chunk = resampler.process_partial::<&[f32]>(None, None)?;
        if chunk[0].is_empty() {
            break;
        }
        output.extend_from_slice(&chunk[0]);
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected, 0.0);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_same_rate_passthrough() {
        let samples = sine(440.0, 22050, 0.1);
        let out = resample_mono(&samples, 22050, 22050).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn test_output_length() {
        let samples = sine(440.0, 44100, 1.0);
        let out = resample_mono(&samples, 44100, 22050).unwrap();
        assert_eq!(out.len(), 22050);

        let samples = sine(440.0, 16000, 0.5);
        let out = resample_mono(&samples, 16000, 22050).unwrap();
        assert_eq!(out.len(), 11025);
    }

    #[test]
    fn test_preserves_sine_amplitude() {
        let samples = sine(440.0, 48000, 1.0);
        let out = resample_mono(&samples, 48000, 22050).unwrap();

        // Ignore the edges where the filter ramps in and out
        let middle = &out[2000..out.len() - 2000];
        let peak = middle.iter().map(|x| x.abs()).fold(0.0f32, f32::max);
        assert!(
            (peak - 1.0).abs() < 0.05,
            "Resampled sine peak should stay near 1.0, got {:.3}",
            peak
        );

        // Phase alignment: compare against an ideal sine at the target rate
        let reference = sine(440.0, 22050, 1.0);
        let err: f32 = middle
            .iter()
            .zip(&reference[2000..reference.len() - 2000])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max);
        assert!(err < 0.3, "Resampled signal should be time-aligned, max error {:.3}", err);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(resample_mono(&[0.0; 10], 0, 22050).is_err());
    }
}
