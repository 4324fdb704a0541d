//! Mel filter bank and cepstral transform
//!
//! Slaney-style mel scale (linear below 1 kHz, logarithmic above) with triangular
//! filters normalized to constant energy per band, and the orthonormal DCT-II used
//! to turn log band energies into cepstral coefficients.

use crate::features::stft::fft_frequencies;

/// Frequency below which the Slaney mel scale is linear
const MIN_LOG_HZ: f64 = 1000.0;

/// Hz per mel in the linear region
const F_SP: f64 = 200.0 / 3.0;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Convert Hz to Slaney mels
pub fn hz_to_mel(hz: f64) -> f64 {
    let min_log_mel = MIN_LOG_HZ / F_SP;
    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Convert Slaney mels to Hz
pub fn mel_to_hz(mel: f64) -> f64 {
    let min_log_mel = MIN_LOG_HZ / F_SP;
    if mel >= min_log_mel {
        MIN_LOG_HZ * (log_step() * (mel - min_log_mel)).exp()
    } else {
        F_SP * mel
    }
}

/// Mel filter bank (`n_mels × (n_fft / 2 + 1)`)
///
/// Band edges are `n_mels + 2` points evenly spaced on the mel scale between 0 Hz
/// and Nyquist. Each triangle is scaled by `2 / (f_upper - f_lower)`.
pub fn mel_filter_bank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f64>> {
    let fft_freqs = fft_frequencies(sample_rate, n_fft);
    let max_mel = hz_to_mel(sample_rate as f64 / 2.0);

    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(max_mel * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lower, center, upper) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
            let enorm = 2.0 / (upper - lower);
            fft_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - lower) / (center - lower);
                    let falling = (upper - f) / (upper - center);
                    rising.min(falling).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II basis, first `n_coeffs` rows of an `n × n` transform
///
/// Row `k` holds `s_k * cos(pi * k * (2n + 1) / (2N))` with `s_0 = sqrt(1/N)` and
/// `s_k = sqrt(2/N)` otherwise.
pub fn dct_basis(n_coeffs: usize, n: usize) -> Vec<Vec<f64>> {
    let n_f = n as f64;
    (0..n_coeffs)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n_f).sqrt() } else { (2.0 / n_f).sqrt() };
            (0..n)
                .map(|i| {
                    scale
                        * (std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n_f))
                            .cos()
                })
                .collect()
        })
        .collect()
}

/// Apply a filter bank to every frame of a spectrogram
///
/// # Returns
///
/// `frames × bands` matrix of band energies
pub fn apply_filter_bank(spectrogram: &[Vec<f64>], bank: &[Vec<f64>]) -> Vec<Vec<f64>> {
    spectrogram
        .iter()
        .map(|frame| bank.iter().map(|filter| dot(filter, frame)).collect())
        .collect()
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
