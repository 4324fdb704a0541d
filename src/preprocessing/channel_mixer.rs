//! Channel mixing utilities (multi-channel to mono conversion)

use crate::error::DetectionError;

/// Downmix interleaved samples to mono by averaging the channels of each frame
///
/// # Arguments
///
/// * `interleaved` - Interleaved samples (`frame0_ch0, frame0_ch1, ...`)
/// * `channels` - Number of channels
///
/// # Returns
///
/// Mono samples, one per frame
///
/// # Errors
///
/// Returns `DetectionError::InvalidInput` if `channels` is zero or the buffer does
/// not hold a whole number of frames
pub fn downmix_interleaved(interleaved: &[f32], channels: usize) -> Result<Vec<f32>, DetectionError> {
    if channels == 0 {
        return Err(DetectionError::InvalidInput(
            "Channel count must be > 0".to_string(),
        ));
    }

    if interleaved.len() % channels != 0 {
        return Err(DetectionError::InvalidInput(format!(
            "{} samples do not form whole frames of {} channels",
            interleaved.len(),
            channels
        )));
    }

    if channels == 1 {
        return Ok(interleaved.to_vec());
    }

    log::debug!(
        "Downmixing {} frames of {} channels to mono",
        interleaved.len() / channels,
        channels
    );

    let scale = 1.0 / channels as f32;
    Ok(interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_passthrough() {
        let samples = vec![0.1, -0.2, 0.3];
        assert_eq!(downmix_interleaved(&samples, 1).unwrap(), samples);
    }

    #[test]
    fn test_stereo_average() {
        let samples = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        let mono = downmix_interleaved(&samples, 2).unwrap();
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_invalid_layout() {
        assert!(downmix_interleaved(&[0.0; 5], 2).is_err());
        assert!(downmix_interleaved(&[0.0; 4], 0).is_err());
    }
}
