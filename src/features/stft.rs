//! Short-time Fourier transform
//!
//! Centered framing with zero padding of `n_fft / 2` samples on both sides and a
//! periodic Hann window, so a signal of `len` samples yields `1 + len / hop` frames
//! and frame `t` is centered on sample `t * hop`. Spectrogram layout throughout
//! the crate is `frames × bins`.
//!
//! # Example
//!
//! ```
//! use deepvoice_detect::features::stft::Stft;
//!
//! let stft = Stft::new(2048, 512);
//! let signal = vec![0.0f64; 22050];
//! let spectrum = stft.forward(&signal);
//! assert_eq!(spectrum.len(), 1 + 22050 / 512);
//! assert_eq!(spectrum[0].len(), 1025);
//! ```

use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Complex spectrogram (`frames × bins`)
pub type ComplexSpectrogram = Vec<Vec<Complex<f64>>>;

/// Real-valued spectrogram (`frames × bins`)
pub type Spectrogram = Vec<Vec<f64>>;

/// Smallest positive normal `f64`, below which a value counts as zero
pub const TINY: f64 = f64::MIN_POSITIVE;

/// Periodic Hann window of length `n`
pub fn hann_window(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n as f64).cos())
        .collect()
}

/// Center frequency in Hz of every rfft bin
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    (0..=n_fft / 2)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect()
}

/// Convert a power matrix to decibels in place
///
/// Computes `10 * log10(max(x, amin))` with reference 1.0, then clamps every value
/// to at least `max - top_db` where `max` is taken over the whole matrix.
pub fn power_to_db(matrix: &mut [Vec<f64>], top_db: Option<f64>) {
    const AMIN: f64 = 1e-10;

    let mut max_db = f64::NEG_INFINITY;
    for row in matrix.iter_mut() {
        for x in row.iter_mut() {
            *x = 10.0 * x.max(AMIN).log10();
            max_db = max_db.max(*x);
        }
    }

    if let Some(top_db) = top_db {
        let floor = max_db - top_db;
        for x in matrix.iter_mut().flatten() {
            *x = x.max(floor);
        }
    }
}

/// Magnitude of every bin
pub fn magnitude(spectrum: &[Vec<Complex<f64>>]) -> Spectrogram {
    spectrum
        .iter()
        .map(|frame| frame.iter().map(|c| c.norm()).collect())
        .collect()
}

/// Squared magnitude of every bin
pub fn power(spectrum: &[Vec<Complex<f64>>]) -> Spectrogram {
    spectrum
        .iter()
        .map(|frame| frame.iter().map(|c| c.norm_sqr()).collect())
        .collect()
}

/// Number of centered frames for a signal length
pub fn frame_count(len: usize, hop_length: usize) -> usize {
    1 + len / hop_length
}

/// Planned forward/inverse STFT for a fixed frame size and hop
#[derive(Clone)]
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for Stft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stft")
            .field("n_fft", &self.n_fft)
            .field("hop_length", &self.hop_length)
            .finish()
    }
}

impl Stft {
    /// Plan transforms for `n_fft`-point frames spaced `hop_length` apart
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            n_fft,
            hop_length,
            window: hann_window(n_fft),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        }
    }

    /// Frame size
    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    /// Hop size
    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Number of non-negative frequency bins
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Windowed, centered STFT of a signal
    ///
    /// # Returns
    ///
    /// Complex spectrogram with `1 + len / hop` frames of `n_fft / 2 + 1` bins
    pub fn forward(&self, signal: &[f64]) -> ComplexSpectrogram {
        let n_frames = frame_count(signal.len(), self.hop_length);
        let pad = (self.n_fft / 2) as isize;
        let n_bins = self.n_bins();

        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0, 0.0); self.forward.get_inplace_scratch_len()];
        let mut frames = Vec::with_capacity(n_frames);

        for t in 0..n_frames {
            let start = (t * self.hop_length) as isize - pad;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let idx = start + i as isize;
                let x = if idx >= 0 && (idx as usize) < signal.len() {
                    signal[idx as usize]
                } else {
                    0.0
                };
                *slot = Complex::new(x * self.window[i], 0.0);
            }
            self.forward.process_with_scratch(&mut buffer, &mut scratch);
            frames.push(buffer[..n_bins].to_vec());
        }

        frames
    }

    /// Inverse STFT by windowed overlap-add
    ///
    /// Each frame is inverted (Hermitian extension, `1 / n_fft` scaling), windowed
    /// and overlap-added; the sum is divided by the squared-window envelope where
    /// it is non-zero, the centering pad is removed and the result is cut or
    /// zero-extended to `length` samples.
    pub fn inverse(&self, spectrum: &[Vec<Complex<f64>>], length: usize) -> Vec<f64> {
        let n = self.n_fft;
        let n_bins = self.n_bins();
        let total = n + self.hop_length * spectrum.len().saturating_sub(1);

        let mut output = vec![0.0; total];
        let mut envelope = vec![0.0; total];
        let mut buffer = vec![Complex::new(0.0, 0.0); n];
        let mut scratch = vec![Complex::new(0.0, 0.0); self.inverse.get_inplace_scratch_len()];
        let scale = 1.0 / n as f64;

        for (t, frame) in spectrum.iter().enumerate() {
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = if k < n_bins {
                    frame.get(k).copied().unwrap_or_default()
                } else {
                    frame.get(n - k).map(|c| c.conj()).unwrap_or_default()
                };
            }
            self.inverse.process_with_scratch(&mut buffer, &mut scratch);

            let offset = t * self.hop_length;
            for i in 0..n {
                let w = self.window[i];
                output[offset + i] += buffer[i].re * scale * w;
                envelope[offset + i] += w * w;
            }
        }

        for (y, &env) in output.iter_mut().zip(&envelope) {
            if env > TINY {
                *y /= env;
            }
        }

        let start = n / 2;
        let mut signal: Vec<f64> = output.into_iter().skip(start).take(length).collect();
        signal.resize(length, 0.0);
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_hann_periodic() {
        let w = hann_window(4);
        let expected = [0.0, 0.5, 1.0, 0.5];
        for (a, b) in w.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_frame_count() {
        let stft = Stft::new(2048, 512);
        assert_eq!(stft.forward(&vec![0.0; 1000]).len(), 2);
        assert_eq!(stft.forward(&vec![0.0; 22050]).len(), 44);
        assert_eq!(stft.forward(&[0.1]).len(), 1);
    }

    #[test]
    fn test_sine_peak_bin() {
        let sr = 22050.0;
        let bin = 93;
        let freq = bin as f64 * sr / 2048.0;
        let stft = Stft::new(2048, 512);
        let mag = magnitude(&stft.forward(&sine(freq, sr, 22050)));

        let middle = &mag[mag.len() / 2];
        let peak = middle
            .iter()
            .enumerate()
            .fold((0, 0.0), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc })
            .0;
        assert_eq!(peak, bin, "peak should land on the sine's bin");
    }

    #[test]
    fn test_inverse_reconstructs() {
        let signal: Vec<f64> = sine(440.0, 22050.0, 5000)
            .iter()
            .zip(sine(1234.5, 22050.0, 5000))
            .map(|(a, b)| 0.6 * a + 0.3 * b)
            .collect();
        let stft = Stft::new(2048, 512);
        let restored = stft.inverse(&stft.forward(&signal), signal.len());

        assert_eq!(restored.len(), signal.len());
        let max_err = signal
            .iter()
            .zip(&restored)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f64, f64::max);
        assert!(max_err < 1e-9, "ISTFT(STFT(x)) should reproduce x, max error {}", max_err);
    }

    #[test]
    fn test_power_to_db_clamps() {
        let mut matrix = vec![vec![1.0, 1e-12], vec![100.0, 0.0]];
        power_to_db(&mut matrix, Some(80.0));

        assert!((matrix[0][0] - 0.0).abs() < 1e-12);
        assert!((matrix[1][0] - 20.0).abs() < 1e-12);
        assert!((matrix[0][1] - (-60.0)).abs() < 1e-12, "floor is max - top_db");
        assert!((matrix[1][1] - (-60.0)).abs() < 1e-12);
    }

    #[test]
    fn test_fft_frequencies() {
        let freqs = fft_frequencies(22050, 2048);
        assert_eq!(freqs.len(), 1025);
        assert_eq!(freqs[0], 0.0);
        assert!((freqs[1024] - 11025.0).abs() < 1e-9);
    }
}
