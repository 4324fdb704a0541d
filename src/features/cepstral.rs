//! Cepstral coefficients
//!
//! - MFCC: mel power spectrum in dB (80 dB dynamic range) → DCT-II
//! - IMFCC: magnitude spectrum through the mel bank in reversed band order →
//!   natural log → DCT-II
//! - CQCC: constant-Q magnitudes → natural log → DCT-II
//!
//! All transforms use the orthonormal DCT-II across bands and keep the leading
//! coefficients. Output layout is `frames × coefficients`.

use crate::features::mel::{apply_filter_bank, dot};
use crate::features::stft::power_to_db;

fn project(frames: &[Vec<f64>], dct: &[Vec<f64>]) -> Vec<Vec<f64>> {
    frames
        .iter()
        .map(|bands| dct.iter().map(|basis| dot(basis, bands)).collect())
        .collect()
}

/// Mel-frequency cepstral coefficients
///
/// # Arguments
///
/// * `power` - STFT power spectrogram (`frames × bins`)
/// * `mel_bank` - Mel filter bank (`bands × bins`)
/// * `dct` - DCT basis rows (`coefficients × bands`)
/// * `top_db` - Dynamic range of the dB conversion
pub fn mfcc(power: &[Vec<f64>], mel_bank: &[Vec<f64>], dct: &[Vec<f64>], top_db: f64) -> Vec<Vec<f64>> {
    let mut mel = apply_filter_bank(power, mel_bank);
    power_to_db(&mut mel, Some(top_db));
    project(&mel, dct)
}

/// Inverted mel-frequency cepstral coefficients
///
/// `reversed_bank` is the mel bank with its band order flipped, so the narrow
/// low-frequency filters weight the top of the spectrum.
pub fn imfcc(
    magnitude: &[Vec<f64>],
    reversed_bank: &[Vec<f64>],
    dct: &[Vec<f64>],
    log_floor: f64,
) -> Vec<Vec<f64>> {
    let mut bands = apply_filter_bank(magnitude, reversed_bank);
    for x in bands.iter_mut().flatten() {
        *x = (*x + log_floor).ln();
    }
    project(&bands, dct)
}

/// Constant-Q cepstral coefficients
pub fn cqcc(cqt: &[Vec<f64>], dct: &[Vec<f64>], log_floor: f64) -> Vec<Vec<f64>> {
    let log_cqt: Vec<Vec<f64>> = cqt
        .iter()
        .map(|frame| frame.iter().map(|&x| (x + log_floor).ln()).collect())
        .collect();
    project(&log_cqt, dct)
}

/// Mean of each column of a `frames × coefficients` matrix
pub fn column_means(matrix: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = matrix.first() else {
        return Vec::new();
    };
    let mut sums = vec![0.0; first.len()];
    for row in matrix {
        for (s, x) in sums.iter_mut().zip(row) {
            *s += x;
        }
    }
    let n = matrix.len() as f64;
    sums.into_iter().map(|s| s / n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::mel::{dct_basis, mel_filter_bank};

    #[test]
    fn test_mfcc_shape() {
        let bank = mel_filter_bank(22050, 2048, 128);
        let dct = dct_basis(20, 128);
        let power = vec![vec![1.0; 1025]; 5];
        let coeffs = mfcc(&power, &bank, &dct, 80.0);
        assert_eq!(coeffs.len(), 5);
        assert!(coeffs.iter().all(|row| row.len() == 20));
        assert!(coeffs.iter().flatten().all(|c| c.is_finite()));
    }

    #[test]
    fn test_imfcc_silence_is_log_floor() {
        let mut bank = mel_filter_bank(22050, 2048, 128);
        bank.reverse();
        let dct = dct_basis(13, 128);
        let coeffs = imfcc(&[vec![0.0; 1025]], &bank, &dct, 1e-9);

        // Constant log energy only loads the DC coefficient
        let expected_c0 = (1e-9f64).ln() * (128.0f64).sqrt();
        assert!((coeffs[0][0] - expected_c0).abs() < 1e-9);
        assert!(coeffs[0][1..].iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn test_imfcc_weights_bands_in_reversed_order() {
        let bank = mel_filter_bank(22050, 2048, 128);
        let mut reversed = bank.clone();
        reversed.reverse();
        let dct = dct_basis(13, 128);

        // Spectrum decaying with frequency
        let magnitude = vec![(0..1025).map(|k| 1.0 / (1.0 + k as f64)).collect::<Vec<f64>>()];
        let coeffs = imfcc(&magnitude, &reversed, &dct, 1e-9);

        let energies: Vec<f64> = reversed
            .iter()
            .map(|filter| (dot(filter, &magnitude[0]) + 1e-9).ln())
            .collect();
        for (c, basis) in coeffs[0].iter().zip(&dct) {
            assert!((c - dot(basis, &energies)).abs() < 1e-9);
        }

        let forward = imfcc(&magnitude, &bank, &dct, 1e-9);
        assert!((coeffs[0][1] - forward[0][1]).abs() > 1e-3, "band order must matter");

        let power = vec![magnitude[0].iter().map(|m| m * m).collect::<Vec<f64>>()];
        let mel = mfcc(&power, &bank, &dct, 80.0);
        assert!(coeffs[0].iter().zip(&mel[0]).any(|(a, b)| (a - b).abs() > 1e-3));
    }

    #[test]
    fn test_column_means() {
        let matrix = vec![vec![1.0, 2.0], vec![3.0, 6.0]];
        assert_eq!(column_means(&matrix), vec![2.0, 4.0]);
        assert!(column_means(&[]).is_empty());
    }
}
