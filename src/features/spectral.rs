//! Frame-level time-domain and spectral statistics
//!
//! Each function returns one value per frame; the extractor reduces them to means.
//! Spectral shape statistics (centroid, bandwidth, roll-off, contrast) work on
//! the magnitude spectrogram.

use crate::error::DetectionError;

/// Amplitudes at or below this value count as zero when detecting sign changes
const ZCR_THRESHOLD: f64 = 1e-10;

/// Root-mean-square energy of centered, zero-padded frames
///
/// # Arguments
///
/// * `signal` - Mono samples
/// * `frame_length` - Frame size (2048 in the reference configuration)
/// * `hop_length` - Hop size
///
/// # Returns
///
/// One RMS value per frame (`1 + len / hop` frames)
pub fn rms(signal: &[f64], frame_length: usize, hop_length: usize) -> Vec<f64> {
    let n_frames = 1 + signal.len() / hop_length;
    let pad = (frame_length / 2) as isize;

    (0..n_frames)
        .map(|t| {
            let start = (t * hop_length) as isize - pad;
            let end = start + frame_length as isize;
            let lo = start.max(0) as usize;
            let hi = end.clamp(0, signal.len() as isize) as usize;
            let energy: f64 = signal[lo.min(hi)..hi].iter().map(|x| x * x).sum();
            (energy / frame_length as f64).sqrt()
        })
        .collect()
}

/// Zero-crossing rate of centered, edge-padded frames
///
/// Values with magnitude at or below 1e-10 are treated as zero and zero counts as
/// positive. The first sample of a frame never counts as a crossing; the count is
/// divided by the frame length.
pub fn zero_crossing_rate(signal: &[f64], frame_length: usize, hop_length: usize) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }

    let n_frames = 1 + signal.len() / hop_length;
    let pad = (frame_length / 2) as isize;
    let last = signal.len() as isize - 1;

    let negative = |idx: isize| -> bool {
        let x = signal[idx.clamp(0, last) as usize];
        x.abs() > ZCR_THRESHOLD && x < 0.0
    };

    (0..n_frames)
        .map(|t| {
            let start = (t * hop_length) as isize - pad;
            let crossings = (1..frame_length as isize)
                .filter(|&i| negative(start + i) != negative(start + i - 1))
                .count();
            crossings as f64 / frame_length as f64
        })
        .collect()
}

/// Divide a frame by its L1 norm; frames with zero norm are returned unchanged
fn l1_normalized(frame: &[f64]) -> Vec<f64> {
    let norm: f64 = frame.iter().map(|x| x.abs()).sum();
    if norm < f64::MIN_POSITIVE {
        return frame.to_vec();
    }
    frame.iter().map(|x| x / norm).collect()
}

/// Spectral centroid in Hz of each magnitude frame
pub fn spectral_centroid(magnitude: &[Vec<f64>], freqs: &[f64]) -> Vec<f64> {
    magnitude
        .iter()
        .map(|frame| {
            l1_normalized(frame)
                .iter()
                .zip(freqs)
                .map(|(w, f)| w * f)
                .sum()
        })
        .collect()
}

/// Spectral bandwidth (order 2) around the centroid of each magnitude frame
pub fn spectral_bandwidth(magnitude: &[Vec<f64>], freqs: &[f64], centroids: &[f64]) -> Vec<f64> {
    magnitude
        .iter()
        .zip(centroids)
        .map(|(frame, &centroid)| {
            l1_normalized(frame)
                .iter()
                .zip(freqs)
                .map(|(w, f)| w * (f - centroid).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .collect()
}

/// Roll-off frequency: lowest bin frequency where cumulative magnitude reaches
/// `roll_percent` of the frame total
pub fn spectral_rolloff(magnitude: &[Vec<f64>], freqs: &[f64], roll_percent: f64) -> Vec<f64> {
    magnitude
        .iter()
        .map(|frame| {
            let total: f64 = frame.iter().sum();
            let threshold = roll_percent * total;
            let mut cumulative = 0.0;
            for (m, &f) in frame.iter().zip(freqs) {
                cumulative += m;
                if cumulative >= threshold {
                    return f;
                }
            }
            freqs.last().copied().unwrap_or(0.0)
        })
        .collect()
}

/// Precomputed octave bands for spectral contrast
#[derive(Debug, Clone)]
pub struct ContrastBands {
    /// Bins analysed for each band
    rows: Vec<std::ops::Range<usize>>,
    /// Number of values averaged on each side of each band
    counts: Vec<usize>,
}

impl ContrastBands {
    /// Plan `n_bands` octave bands starting at `fmin`, plus the residual band up to
    /// Nyquist
    ///
    /// Band `k` spans `[fmin * 2^(k-1), fmin * 2^k]` (the first band starts at 0 Hz);
    /// every band except the first also takes the bin just below its lower edge, and
    /// every band except the last drops its top bin. Peaks and valleys average the
    /// `max(round(quantile * width), 1)` largest and smallest magnitudes.
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::Configuration` if a band contains no bins
    pub fn new(freqs: &[f64], n_bands: usize, fmin: f64, quantile: f64) -> Result<Self, DetectionError> {
        let mut edges = vec![0.0];
        edges.extend((0..=n_bands).map(|k| fmin * 2f64.powi(k as i32)));

        let mut rows = Vec::with_capacity(n_bands + 1);
        let mut counts = Vec::with_capacity(n_bands + 1);

        for k in 0..=n_bands {
            let (f_low, f_high) = (edges[k], edges[k + 1]);
            let first = freqs.iter().position(|&f| f >= f_low && f <= f_high);
            let last = freqs.iter().rposition(|&f| f >= f_low && f <= f_high);
            let (Some(mut first), Some(mut last)) = (first, last) else {
                return Err(DetectionError::Configuration(format!(
                    "Contrast band {} ({:.1}-{:.1} Hz) contains no frequency bins",
                    k, f_low, f_high
                )));
            };

            if k > 0 && first > 0 {
                first -= 1;
            }
            if k == n_bands {
                last = freqs.len() - 1;
            }

            let width = last - first + 1;
            let mut end = last + 1;
            if k < n_bands {
                end -= 1;
            }

            let count = ((quantile * width as f64).round() as usize).max(1);
            rows.push(first..end.max(first + 1));
            counts.push(count);
        }

        Ok(Self { rows, counts })
    }

    /// Number of bands including the residual band
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no band was planned
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Spectral contrast (`bands × frames`, in dB)
///
/// Peak and valley magnitudes are converted to dB with an 80 dB dynamic range
/// computed over all bands and frames, and the contrast is their difference.
pub fn spectral_contrast(magnitude: &[Vec<f64>], bands: &ContrastBands, top_db: f64) -> Vec<Vec<f64>> {
    let mut peaks = Vec::with_capacity(bands.len());
    let mut valleys = Vec::with_capacity(bands.len());

    for (range, &count) in bands.rows.iter().zip(&bands.counts) {
        let mut band_peaks = Vec::with_capacity(magnitude.len());
        let mut band_valleys = Vec::with_capacity(magnitude.len());
        for frame in magnitude {
            let mut sorted: Vec<f64> = frame[range.clone()].to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let n = count.min(sorted.len());
            band_valleys.push(sorted[..n].iter().sum::<f64>() / n as f64);
            band_peaks.push(sorted[sorted.len() - n..].iter().sum::<f64>() / n as f64);
        }
        peaks.push(band_peaks);
        valleys.push(band_valleys);
    }

    crate::features::stft::power_to_db(&mut peaks, Some(top_db));
    crate::features::stft::power_to_db(&mut valleys, Some(top_db));

    peaks
        .iter()
        .zip(&valleys)
        .map(|(p, v)| p.iter().zip(v).map(|(a, b)| a - b).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::stft::fft_frequencies;

    #[test]
    fn test_rms_constant_signal() {
        let signal = vec![0.5; 22050];
        let values = rms(&signal, 2048, 512);
        assert_eq!(values.len(), 44);
        // Interior frames see only signal
        assert!((values[10] - 0.5).abs() < 1e-12);
        // Edge frames are half zero padding
        assert!((values[0] - 0.5 * (0.5f64).sqrt()).abs() < 1e-3);
    }

    #[test]
    fn test_zcr_alternating() {
        let signal: Vec<f64> = (0..8192).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let values = zero_crossing_rate(&signal, 2048, 512);
        let interior = values[4];
        assert!((interior - 2047.0 / 2048.0).abs() < 1e-12, "got {}", interior);
    }

    #[test]
    fn test_zcr_ignores_tiny_values() {
        let signal: Vec<f64> = (0..4096).map(|i| if i % 2 == 0 { 1e-12 } else { -1e-12 }).collect();
        let values = zero_crossing_rate(&signal, 2048, 512);
        assert!(values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_centroid_single_bin() {
        let freqs = fft_frequencies(22050, 2048);
        let mut frame = vec![0.0; 1025];
        frame[100] = 3.0;
        let centroid = spectral_centroid(&[frame.clone()], &freqs);
        assert!((centroid[0] - freqs[100]).abs() < 1e-9);

        let bandwidth = spectral_bandwidth(&[frame], &freqs, &centroid);
        assert!(bandwidth[0].abs() < 1e-9, "a single bin has no spread");
    }

    #[test]
    fn test_silent_frame_statistics() {
        let freqs = fft_frequencies(22050, 2048);
        let frame = vec![0.0; 1025];
        assert_eq!(spectral_centroid(&[frame.clone()], &freqs), vec![0.0]);
        assert_eq!(spectral_rolloff(&[frame], &freqs, 0.85), vec![0.0]);
    }

    #[test]
    fn test_rolloff_threshold() {
        let freqs = vec![0.0, 100.0, 200.0, 300.0];
        let frame = vec![1.0, 1.0, 1.0, 1.0];
        // 85% of 4.0 = 3.4 is first reached at the fourth bin
        assert_eq!(spectral_rolloff(&[frame], &freqs, 0.85), vec![300.0]);
    }

    #[test]
    fn test_contrast_bands_layout() {
        let freqs = fft_frequencies(22050, 2048);
        let bands = ContrastBands::new(&freqs, 6, 200.0, 0.02).unwrap();
        assert_eq!(bands.len(), 7);
        assert_eq!(bands.rows[0].start, 0);
        assert_eq!(*bands.rows.last().map(|r| &r.end).unwrap(), 1025);
        assert!(bands.counts.iter().all(|&c| c >= 1));
    }

    #[test]
    fn test_contrast_flat_spectrum_is_zero() {
        let freqs = fft_frequencies(22050, 2048);
        let bands = ContrastBands::new(&freqs, 6, 200.0, 0.02).unwrap();
        let flat = vec![vec![0.7; 1025]; 3];
        let contrast = spectral_contrast(&flat, &bands, 80.0);
        assert_eq!(contrast.len(), 7);
        assert!(contrast.iter().flatten().all(|&c| c.abs() < 1e-9));
    }
}
