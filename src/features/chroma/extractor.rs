//! Chromagram computation
//!
//! Applies a chroma filter bank to every frame of a spectrogram and max-normalizes
//! each frame.

use crate::features::chroma::normalization::normalize_max;
use crate::features::mel::{apply_filter_bank, dot};

/// Chromagram of a power spectrogram (`frames × 12`)
///
/// # Arguments
///
/// * `power` - STFT power spectrogram (`frames × bins`)
/// * `bank` - Filter bank from [`crate::features::chroma::filters::stft_chroma_bank`]
pub fn chroma_stft(power: &[Vec<f64>], bank: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut chroma = apply_filter_bank(power, bank);
    chroma.iter_mut().for_each(|frame| normalize_max(frame));
    chroma
}

/// Chromagram of a constant-Q magnitude spectrogram (`frames × 12`)
///
/// # Arguments
///
/// * `cqt` - Constant-Q magnitudes (`frames × bins`)
/// * `folding` - Matrix from [`crate::features::chroma::filters::cq_to_chroma`]
pub fn chroma_cqt(cqt: &[Vec<f64>], folding: &[Vec<f64>]) -> Vec<Vec<f64>> {
    cqt.iter()
        .map(|frame| {
            let mut chroma: Vec<f64> = folding
                .iter()
                .map(|row| dot(row, frame).max(0.0))
                .collect();
            normalize_max(&mut chroma);
            chroma
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::chroma::filters::{cq_to_chroma, stft_chroma_bank};

    #[test]
    fn test_chroma_stft_range() {
        let bank = stft_chroma_bank(22050, 2048, 0.0);
        let mut frame = vec![0.0; 1025];
        frame[41] = 1.0; // ~440 Hz
        let chroma = chroma_stft(&[frame, vec![0.0; 1025]], &bank);

        assert_eq!(chroma.len(), 2);
        assert!(chroma[0].iter().all(|&c| (0.0..=1.0).contains(&c)));
        assert!((chroma[0][9] - 1.0).abs() < 1e-12, "A should be the loudest class");
        assert!(chroma[1].iter().all(|&c| c == 0.0), "silent frames stay zero");
    }

    #[test]
    fn test_chroma_cqt_folds_octaves() {
        let folding = cq_to_chroma(24, 12);
        let mut frame = vec![0.0; 24];
        frame[4] = 2.0; // E, first octave
        frame[16] = 2.0; // E, second octave
        frame[7] = 1.0; // G
        let chroma = chroma_cqt(&[frame], &folding);
        assert_eq!(chroma[0][4], 1.0);
        assert_eq!(chroma[0][7], 0.25);
    }
}
