//! Harmonic-percussive source separation (HPSS)
//!
//! Median filtering of the magnitude spectrogram: harmonic energy is smooth along
//! time, percussive energy is smooth along frequency. A soft Wiener-style mask
//! built from the two filtered spectrograms is applied to the complex STFT, which
//! keeps the original phase.
//!
//! # Reference
//!
//! Fitzgerald, D. (2010). Harmonic/Percussive Separation using Median Filtering.
//! *Proceedings of the 13th International Conference on Digital Audio Effects (DAFx-10)*.

use rustfft::num_complex::Complex;

use crate::features::stft::TINY;

/// Median of `values`, reordering them
fn median_in_place(values: &mut [f64]) -> f64 {
    let mid = values.len() / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}

/// Index into a sequence of length `n` with half-sample symmetric reflection
/// (`d c b a | a b c d | d c b a`)
fn reflect(idx: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let mut i = idx.rem_euclid(period);
    if i >= n {
        i = period - 1 - i;
    }
    i as usize
}

/// Median filter along one axis of a `frames × bins` matrix
///
/// `along_time` filters each bin across frames; otherwise each frame is filtered
/// across bins. Borders are reflected.
pub fn median_filter(matrix: &[Vec<f64>], width: usize, along_time: bool) -> Vec<Vec<f64>> {
    let n_frames = matrix.len();
    if n_frames == 0 || width <= 1 {
        return matrix.to_vec();
    }
    let n_bins = matrix[0].len();
    let half = (width / 2) as isize;
    let mut window = vec![0.0; width];
    let mut output = vec![vec![0.0; n_bins]; n_frames];

    for t in 0..n_frames {
        for f in 0..n_bins {
            for (j, slot) in window.iter_mut().enumerate() {
                let offset = j as isize - half;
                *slot = if along_time {
                    matrix[reflect(t as isize + offset, n_frames)][f]
                } else {
                    matrix[t][reflect(f as isize + offset, n_bins)]
                };
            }
            output[t][f] = median_in_place(&mut window);
        }
    }

    output
}

/// Soft mask `X^p / (X^p + X_ref^p)`
///
/// Where both inputs are below the smallest normal float the mask is 0.5 when
/// `split_zeros` is set, otherwise 0.
fn soft_mask(x: f64, x_ref: f64, power: f64, split_zeros: bool) -> f64 {
    let z = x.max(x_ref);
    if z < TINY {
        return if split_zeros { 0.5 } else { 0.0 };
    }
    let m = (x / z).powf(power);
    let r = (x_ref / z).powf(power);
    m / (m + r)
}

/// Harmonic component of a complex spectrogram
///
/// # Arguments
///
/// * `spectrum` - Complex STFT (`frames × bins`)
/// * `kernel` - Median filter width for both directions (31 in the reference configuration)
/// * `power` - Mask exponent
/// * `margin` - Percussive margin; the mask compares `H` against `margin * P`
///
/// # Returns
///
/// Masked complex spectrogram holding the harmonic component
pub fn harmonic(
    spectrum: &[Vec<Complex<f64>>],
    kernel: usize,
    power: f64,
    margin: f64,
) -> Vec<Vec<Complex<f64>>> {
    let magnitude: Vec<Vec<f64>> = spectrum
        .iter()
        .map(|frame| frame.iter().map(|c| c.norm()).collect())
        .collect();

    log::debug!(
        "HPSS: {} frames, kernel {}, power {}, margin {}",
        magnitude.len(),
        kernel,
        power,
        margin
    );

    let harm = median_filter(&magnitude, kernel, true);
    let perc = median_filter(&magnitude, kernel, false);
    let split_zeros = margin == 1.0;

    spectrum
        .iter()
        .zip(harm.iter().zip(&perc))
        .map(|(frame, (h_row, p_row))| {
            frame
                .iter()
                .zip(h_row.iter().zip(p_row))
                .map(|(&c, (&h, &p))| c * soft_mask(h, p * margin, power, split_zeros))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect() {
        let idx: Vec<usize> = (-3..7).map(|i| reflect(i, 4)).collect();
        assert_eq!(idx, vec![2, 1, 0, 0, 1, 2, 3, 3, 2, 1]);
    }

    #[test]
    fn test_median_filter_removes_impulse() {
        let mut matrix = vec![vec![1.0; 3]; 9];
        matrix[4][1] = 100.0;
        let filtered = median_filter(&matrix, 5, true);
        assert_eq!(filtered[4][1], 1.0, "a one-frame impulse is not harmonic");

        let filtered = median_filter(&matrix, 3, false);
        assert_eq!(filtered[4][1], 1.0);
        assert_eq!(filtered[0][0], 1.0);
    }

    #[test]
    fn test_soft_mask() {
        assert_eq!(soft_mask(0.0, 0.0, 2.0, true), 0.5);
        assert_eq!(soft_mask(0.0, 0.0, 2.0, false), 0.0);
        assert!((soft_mask(3.0, 1.0, 2.0, true) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_steady_tone_is_harmonic() {
        // Constant energy in one bin across time survives the harmonic mask
        let mut spectrum = vec![vec![Complex::new(0.0, 0.0); 64]; 40];
        for frame in spectrum.iter_mut() {
            frame[10] = Complex::new(2.0, 0.0);
        }
        let h = harmonic(&spectrum, 31, 2.0, 1.0);
        assert!((h[20][10].re - 2.0).abs() < 1e-12);
        assert_eq!(h[20][30].re, 0.0);
    }
}
