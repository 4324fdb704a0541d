//! Silence detection
//!
//! Blocks whose RMS level falls below a dBFS threshold carry no speech evidence and
//! can be skipped at inference time.

/// Level reported for an all-zero signal
pub const SILENCE_FLOOR_DB: f32 = -120.0;

/// Silence detection configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceDetector {
    /// Threshold in dBFS (default: -60.0)
    pub threshold_db: f32,
}

impl Default for SilenceDetector {
    fn default() -> Self {
        Self { threshold_db: -60.0 }
    }
}

impl SilenceDetector {
    /// Detector with the given threshold
    pub fn new(threshold_db: f32) -> Self {
        Self { threshold_db }
    }

    /// Whether the samples are quieter than the threshold
    ///
    /// Empty input is reported as silent.
    pub fn is_silent(&self, samples: &[f32]) -> bool {
        rms_db(samples) < self.threshold_db
    }
}

/// RMS level of a signal in dBFS
///
/// # Returns
///
/// `20 * log10(rms)`, floored at [`SILENCE_FLOOR_DB`]
pub fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return SILENCE_FLOOR_DB;
    }

    let mean_square = samples.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>() / samples.len() as f64;
    let rms = mean_square.sqrt();
    if rms <= 0.0 {
        return SILENCE_FLOOR_DB;
    }

    ((20.0 * rms.log10()) as f32).max(SILENCE_FLOOR_DB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_db_full_scale() {
        let square = vec![1.0f32, -1.0, 1.0, -1.0];
        assert!(rms_db(&square).abs() < 1e-5, "full-scale square should be 0 dBFS");

        let half = vec![0.5f32; 100];
        assert!((rms_db(&half) + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn test_zero_signal_floor() {
        assert_eq!(rms_db(&[0.0; 64]), SILENCE_FLOOR_DB);
        assert_eq!(rms_db(&[]), SILENCE_FLOOR_DB);
    }

    #[test]
    fn test_is_silent() {
        let detector = SilenceDetector::new(-40.0);
        assert!(detector.is_silent(&[0.001; 1000]));
        assert!(!detector.is_silent(&[0.1; 1000]));
        assert!(detector.is_silent(&[]));
    }
}
