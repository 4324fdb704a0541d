//! Constant-Q transform
//!
//! Single-rate spectral-kernel implementation (Brown & Puckette). Every bin `k` has
//! center frequency `fmin * 2^(k / bins_per_octave)` and a Hann-windowed complex
//! exponential kernel whose length is inversely proportional to that frequency.
//! Kernels are L1-normalized, centered in one shared power-of-two FFT frame and
//! transformed once; their spectra are sparsified by dropping the smallest
//! coefficients that together hold 1% of each kernel's magnitude.
//!
//! A frame's CQT is then a sparse dot product between its FFT and each kernel
//! spectrum. Responses are scaled by the square root of the kernel length so that
//! bins are comparable across octaves.
//!
//! # Reference
//!
//! Brown, J. C., & Puckette, M. S. (1992). An efficient algorithm for the calculation
//! of a constant Q transform. *JASA*, 92(5), 2698-2701.

use std::fmt;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::DetectionError;
use crate::features::stft::hann_window;

/// Fraction of each kernel's L1 mass discarded when sparsifying
const SPARSITY: f64 = 0.01;

/// One sparsified kernel spectrum
#[derive(Debug, Clone)]
struct SparseKernel {
    /// (FFT bin, conjugated coefficient / fft_len) pairs
    entries: Vec<(usize, Complex<f64>)>,
    /// `sqrt(kernel length)`
    scale: f64,
}

/// Planned constant-Q transform
#[derive(Clone)]
pub struct ConstantQ {
    fft_len: usize,
    hop_length: usize,
    kernels: Vec<SparseKernel>,
    fft: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for ConstantQ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstantQ")
            .field("fft_len", &self.fft_len)
            .field("hop_length", &self.hop_length)
            .field("n_bins", &self.kernels.len())
            .finish()
    }
}

/// Relative bandwidth of an equal-tempered bin (`(2^(2/b) - 1) / (2^(2/b) + 1)`)
fn relative_bandwidth(bins_per_octave: usize) -> f64 {
    let r = 2f64.powf(2.0 / bins_per_octave as f64);
    (r - 1.0) / (r + 1.0)
}

/// Center frequencies of a constant-Q bank
pub fn cqt_frequencies(fmin: f64, n_bins: usize, bins_per_octave: usize) -> Vec<f64> {
    (0..n_bins)
        .map(|k| fmin * 2f64.powf(k as f64 / bins_per_octave as f64))
        .collect()
}

impl ConstantQ {
    /// Build the kernel bank
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Sample rate in Hz
    /// * `hop_length` - Hop between frames
    /// * `fmin` - Center frequency of the lowest bin
    /// * `n_bins` - Number of bins
    /// * `bins_per_octave` - Bins per octave
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::Configuration` if the bank is empty or its highest
    /// bin reaches the Nyquist frequency
    pub fn new(
        sample_rate: u32,
        hop_length: usize,
        fmin: f64,
        n_bins: usize,
        bins_per_octave: usize,
    ) -> Result<Self, DetectionError> {
        if n_bins == 0 || bins_per_octave == 0 || fmin <= 0.0 {
            return Err(DetectionError::Configuration(format!(
                "Invalid constant-Q bank: fmin {} Hz, {} bins, {} per octave",
                fmin, n_bins, bins_per_octave
            )));
        }

        let sr = sample_rate as f64;
        let freqs = cqt_frequencies(fmin, n_bins, bins_per_octave);
        if let Some(&top) = freqs.last() {
            if top >= sr / 2.0 {
                return Err(DetectionError::Configuration(format!(
                    "Constant-Q bin at {:.1} Hz exceeds the Nyquist frequency {} Hz",
                    top,
                    sr / 2.0
                )));
            }
        }

        let q = 1.0 / relative_bandwidth(bins_per_octave);
        let lengths: Vec<f64> = freqs.iter().map(|&f| q * sr / f).collect();
        let longest = lengths.iter().copied().fold(0.0, f64::max).ceil() as usize;
        let fft_len = longest.max(2).next_power_of_two();

        log::debug!(
            "Building constant-Q bank: {} bins from {:.2} Hz, {} per octave, FFT length {}",
            n_bins,
            fmin,
            bins_per_octave,
            fft_len
        );

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_len);
        let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        let kernels = freqs
            .iter()
            .zip(&lengths)
            .map(|(&freq, &length)| {
                // Kernel support is [-floor(l/2)... floor(l/2)) around the frame center
                let lo = (-length / 2.0).floor() as isize;
                let hi = (length / 2.0).floor() as isize;
                let n = (hi - lo) as usize;
                let window = hann_window(n);

                let mut kernel: Vec<Complex<f64>> = (lo..hi)
                    .zip(&window)
                    .map(|(t, &w)| {
                        let phase = 2.0 * std::f64::consts::PI * freq * t as f64 / sr;
                        Complex::from_polar(w, phase)
                    })
                    .collect();
                let l1: f64 = kernel.iter().map(|c| c.norm()).sum();
                if l1 > 0.0 {
                    kernel.iter_mut().for_each(|c| *c /= l1);
                }

                let mut buffer = vec![Complex::new(0.0, 0.0); fft_len];
                let center = (fft_len / 2) as isize;
                for (t, c) in (lo..hi).zip(kernel) {
                    buffer[(center + t) as usize] = c;
                }
                fft.process_with_scratch(&mut buffer, &mut scratch);

                let spectrum: Vec<Complex<f64>> = buffer[..=fft_len / 2]
                    .iter()
                    .map(|c| c.conj() / fft_len as f64)
                    .collect();

                SparseKernel {
                    entries: sparsify(&spectrum),
                    scale: length.sqrt(),
                }
            })
            .collect();

        Ok(Self {
            fft_len,
            hop_length,
            kernels,
            fft,
        })
    }

    /// Number of bins
    pub fn n_bins(&self) -> usize {
        self.kernels.len()
    }

    /// Magnitude CQT of a signal (`frames × bins`)
    ///
    /// Frames are centered on multiples of the hop with zero padding, giving
    /// `1 + len / hop` frames like the STFT.
    pub fn magnitude(&self, signal: &[f64]) -> Vec<Vec<f64>> {
        let n_frames = 1 + signal.len() / self.hop_length;
        let pad = (self.fft_len / 2) as isize;

        let mut buffer = vec![Complex::new(0.0, 0.0); self.fft_len];
        let mut scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
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
                *slot = Complex::new(x, 0.0);
            }
            self.fft.process_with_scratch(&mut buffer, &mut scratch);

            frames.push(
                self.kernels
                    .iter()
                    .map(|kernel| {
                        let response: Complex<f64> = kernel
                            .entries
                            .iter()
                            .map(|&(bin, coeff)| buffer[bin] * coeff)
                            .sum();
                        response.norm() * kernel.scale
                    })
                    .collect(),
            );
        }

        frames
    }
}

/// Keep the coefficients of a kernel spectrum that carry 99% of its L1 mass
fn sparsify(spectrum: &[Complex<f64>]) -> Vec<(usize, Complex<f64>)> {
    let mags: Vec<f64> = spectrum.iter().map(|c| c.norm()).collect();
    let total: f64 = mags.iter().sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..mags.len()).collect();
    order.sort_by(|&a, &b| mags[a].total_cmp(&mags[b]));

    let mut dropped = vec![false; mags.len()];
    let mut cumulative = 0.0;
    for &i in &order {
        cumulative += mags[i] / total;
        if cumulative >= SPARSITY {
            break;
        }
        dropped[i] = true;
    }

    spectrum
        .iter()
        .enumerate()
        .filter(|(i, _)| !dropped[*i])
        .map(|(i, &c)| (i, c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequencies() {
        let freqs = cqt_frequencies(32.703_197, 84, 12);
        assert_eq!(freqs.len(), 84);
        assert!((freqs[12] - 2.0 * 32.703_197).abs() < 1e-9);
    }

    #[test]
    fn test_sine_peaks_at_matching_bin() {
        let sr = 22050;
        let cqt = ConstantQ::new(sr, 512, 32.703_197, 84, 12).unwrap();
        // A4 = 440 Hz sits 57 semitones above C1
        let signal: Vec<f64> = (0..22050)
            .map(|i| (2.0 * std::f64::consts::PI * 440.0 * i as f64 / sr as f64).sin())
            .collect();
        let frames = cqt.magnitude(&signal);
        assert_eq!(frames.len(), 1 + 22050 / 512);

        let middle = &frames[frames.len() / 2];
        let peak = middle
            .iter()
            .enumerate()
            .fold((0, 0.0), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc })
            .0;
        assert_eq!(peak, 57, "440 Hz should peak at bin 57");
    }

    #[test]
    fn test_rejects_bins_above_nyquist() {
        assert!(ConstantQ::new(8000, 512, 32.703_197, 120, 12).is_err());
        assert!(ConstantQ::new(22050, 512, 32.703_197, 0, 12).is_err());
    }

    #[test]
    fn test_silence_is_zero() {
        let cqt = ConstantQ::new(22050, 512, 65.4, 24, 12).unwrap();
        let frames = cqt.magnitude(&vec![0.0; 2048]);
        assert!(frames.iter().flatten().all(|&m| m == 0.0));
    }
}
