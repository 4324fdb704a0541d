//! Chroma filter banks
//!
//! [`stft_chroma_bank`] spreads every STFT bin over neighbouring pitch classes with
//! a Gaussian in log-frequency, weighted toward the middle octaves.
//! [`cq_to_chroma`] folds constant-Q bins onto pitch classes.

/// Number of pitch classes
pub const N_CHROMA: usize = 12;

/// Center octave of the octave weighting (relative to A0 / 16 reference)
const CENTER_OCTAVE: f64 = 5.0;

/// Width in octaves of the octave weighting
const OCTAVE_WIDTH: f64 = 2.0;

/// STFT-to-chroma filter bank (`12 × (n_fft / 2 + 1)`), rows starting at C
///
/// # Arguments
///
/// * `sample_rate` - Sample rate in Hz
/// * `n_fft` - FFT size
/// * `tuning` - Tuning deviation from A440 in fractions of a chroma bin
pub fn stft_chroma_bank(sample_rate: u32, n_fft: usize, tuning: f64) -> Vec<Vec<f64>> {
    let n_chroma = N_CHROMA as f64;
    let a440 = 440.0 * 2f64.powf(tuning / n_chroma);

    // Fractional chroma position of every FFT bin (the full, two-sided grid)
    let mut frqbins: Vec<f64> = (1..n_fft)
        .map(|k| {
            let f = k as f64 * sample_rate as f64 / n_fft as f64;
            n_chroma * (f / (a440 / 16.0)).log2()
        })
        .collect();
    let dc = frqbins.first().copied().unwrap_or(0.0) - 1.5 * n_chroma;
    frqbins.insert(0, dc);

    let mut binwidths: Vec<f64> = frqbins.windows(2).map(|w| (w[1] - w[0]).max(1.0)).collect();
    binwidths.push(1.0);

    let half = (n_chroma / 2.0).round();
    let mut weights = vec![vec![0.0; n_fft]; N_CHROMA];
    for (c, row) in weights.iter_mut().enumerate() {
        for (k, w) in row.iter_mut().enumerate() {
            let d = (frqbins[k] - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
            *w = (-0.5 * (2.0 * d / binwidths[k]).powi(2)).exp();
        }
    }

    // Unit L2 norm per FFT bin, then octave weighting
    for k in 0..n_fft {
        let norm = weights.iter().map(|row| row[k] * row[k]).sum::<f64>().sqrt();
        let octave = (-0.5 * ((frqbins[k] / n_chroma - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
        for row in weights.iter_mut() {
            if norm >= f64::MIN_POSITIVE {
                row[k] /= norm;
            }
            row[k] *= octave;
        }
    }

    // Rows start at A; rotate so the first row is C
    weights.rotate_left(3);

    weights
        .into_iter()
        .map(|mut row| {
            row.truncate(n_fft / 2 + 1);
            row
        })
        .collect()
}

/// Constant-Q-to-chroma folding matrix (`12 × n_bins`) for a bank starting at C
///
/// Each pitch class collects `bins_per_octave / 12` adjacent bins centered on it.
pub fn cq_to_chroma(n_bins: usize, bins_per_octave: usize) -> Vec<Vec<f64>> {
    let merge = bins_per_octave / N_CHROMA;
    let shift = merge / 2;

    let mut matrix = vec![vec![0.0; n_bins]; N_CHROMA];
    for k in 0..n_bins {
        let position = (k % bins_per_octave + shift) % bins_per_octave;
        matrix[position / merge][k] = 1.0;
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stft_bank_shape() {
        let bank = stft_chroma_bank(22050, 2048, 0.0);
        assert_eq!(bank.len(), 12);
        assert!(bank.iter().all(|row| row.len() == 1025));
        assert!(bank.iter().flatten().all(|&w| w >= 0.0 && w.is_finite()));
    }

    #[test]
    fn test_a440_maps_to_a() {
        let sr = 22050;
        let n_fft = 2048;
        let bank = stft_chroma_bank(sr, n_fft, 0.0);
        let bin = (440.0 * n_fft as f64 / sr as f64).round() as usize;

        let best = (0..12)
            .max_by(|&a, &b| bank[a][bin].total_cmp(&bank[b][bin]))
            .unwrap();
        assert_eq!(best, 9, "440 Hz should load the A row (index 9 from C)");
    }

    #[test]
    fn test_cq_to_chroma_centered() {
        let matrix = cq_to_chroma(72, 36);
        // C collects its own bin, the one above, and the top bin of the octave below
        assert_eq!(matrix[0][0], 1.0);
        assert_eq!(matrix[0][1], 1.0);
        assert_eq!(matrix[0][35], 1.0);
        assert_eq!(matrix[1][2], 1.0);
        assert_eq!(matrix[0][36], 1.0);
        for k in 0..72 {
            let total: f64 = matrix.iter().map(|row| row[k]).sum();
            assert_eq!(total, 1.0, "every bin maps to exactly one pitch class");
        }
    }

    #[test]
    fn test_cq_to_chroma_one_bin_per_class() {
        let matrix = cq_to_chroma(24, 12);
        for k in 0..24 {
            assert_eq!(matrix[k % 12][k], 1.0);
        }
    }
}
