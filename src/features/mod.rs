//! Feature extraction modules
//!
//! This module turns a mono waveform segment into the fixed-length descriptor used
//! by the classifier:
//! - Short-time Fourier transform and dB conversion
//! - Frame-level spectral statistics (RMS, centroid, bandwidth, roll-off, ZCR, contrast)
//! - Chroma and tonal centroids of the harmonic component
//! - Cepstral coefficients (MFCC, IMFCC, optional CQCC)
//!
//! Vector layout (reference configuration, 41 values):
//!
//! | index  | feature                       |
//! |--------|-------------------------------|
//! | 0      | mean chroma (STFT)            |
//! | 1      | mean RMS                      |
//! | 2      | mean spectral centroid (Hz)   |
//! | 3      | mean spectral bandwidth (Hz)  |
//! | 4      | mean spectral roll-off (Hz)   |
//! | 5      | mean zero-crossing rate       |
//! | 6      | mean tonnetz                  |
//! | 7      | mean spectral contrast (dB)   |
//! | 8..28  | MFCC means                    |
//! | 28..41 | IMFCC means                   |
//! | 41..54 | CQCC means (when enabled)     |
//!
//! # Example
//!
//! ```no_run
//! use deepvoice_detect::config::ExtractionConfig;
//! use deepvoice_detect::features::FeatureExtractor;
//!
//! let extractor = FeatureExtractor::new(ExtractionConfig::default())?;
//! let samples = vec![0.0f32; 22050];
//! let features = extractor.extract(&samples)?;
//! assert_eq!(features.len(), 41);
//! # Ok::<(), deepvoice_detect::DetectionError>(())
//! ```

pub mod cepstral;
pub mod chroma;
pub mod cqt;
pub mod hpss;
pub mod mel;
pub mod spectral;
pub mod stft;
pub mod tonnetz;

use rustfft::num_complex::Complex;

use crate::config::ExtractionConfig;
use crate::error::DetectionError;

use self::chroma::extractor::{chroma_cqt, chroma_stft};
use self::chroma::filters::{cq_to_chroma, stft_chroma_bank};
use self::cqt::ConstantQ;
use self::spectral::ContrastBands;
use self::stft::Stft;

/// Fixed-length feature vector
pub type FeatureVector = Vec<f64>;

/// Constant-Q bank and DCT basis used for CQCC
#[derive(Debug, Clone)]
struct CqccPlan {
    cqt: ConstantQ,
    dct: Vec<Vec<f64>>,
}

/// Feature extractor with precomputed transforms and filter banks
///
/// Construction plans every FFT and builds every filter bank once; extraction is
/// read-only, so one extractor can be shared across threads.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: ExtractionConfig,
    stft: Stft,
    freqs: Vec<f64>,
    chroma_bank: Vec<Vec<f64>>,
    mel_bank: Vec<Vec<f64>>,
    reversed_mel_bank: Vec<Vec<f64>>,
    mfcc_dct: Vec<Vec<f64>>,
    imfcc_dct: Vec<Vec<f64>>,
    contrast_bands: ContrastBands,
    chroma_cqt: ConstantQ,
    cq_folding: Vec<Vec<f64>>,
    tonnetz_projection: Vec<Vec<f64>>,
    cqcc: Option<CqccPlan>,
}

/// Mean of a sequence, 0 for an empty one
fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

impl FeatureExtractor {
    /// Create an extractor for a configuration
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::Configuration` if the configuration is invalid
    pub fn new(config: ExtractionConfig) -> Result<Self, DetectionError> {
        config.validate()?;

        let sr = config.sample_rate;
        let stft = Stft::new(config.n_fft, config.hop_length);
        let freqs = stft::fft_frequencies(sr, config.n_fft);

        let mel_bank = mel::mel_filter_bank(sr, config.n_fft, config.n_mels);
        let mut reversed_mel_bank = mel_bank.clone();
        reversed_mel_bank.reverse();

        let contrast_bands = ContrastBands::new(
            &freqs,
            config.contrast_bands,
            config.contrast_fmin as f64,
            config.contrast_quantile as f64,
        )?;

        let chroma_bins = config.chroma_cqt_bins_per_octave * config.chroma_cqt_octaves;
        let chroma_cqt = ConstantQ::new(
            sr,
            config.hop_length,
            config.cqt_fmin as f64,
            chroma_bins,
            config.chroma_cqt_bins_per_octave,
        )?;
        let cq_folding = cq_to_chroma(chroma_bins, config.chroma_cqt_bins_per_octave);

        let cqcc = if config.include_cqcc {
            Some(CqccPlan {
                cqt: ConstantQ::new(
                    sr,
                    config.hop_length,
                    config.cqt_fmin as f64,
                    config.cqcc_bins,
                    config.cqcc_bins_per_octave,
                )?,
                dct: mel::dct_basis(config.n_cqcc, config.cqcc_bins),
            })
        } else {
            None
        };

        log::debug!(
            "Feature extractor ready: {} Hz, n_fft {}, hop {}, {} features",
            sr,
            config.n_fft,
            config.hop_length,
            config.feature_dimension()
        );

        Ok(Self {
            chroma_bank: stft_chroma_bank(sr, config.n_fft, config.tuning as f64),
            mfcc_dct: mel::dct_basis(config.n_mfcc, config.n_mels),
            imfcc_dct: mel::dct_basis(config.n_imfcc, config.n_mels),
            tonnetz_projection: tonnetz::tonnetz_projection(),
            stft,
            freqs,
            mel_bank,
            reversed_mel_bank,
            contrast_bands,
            chroma_cqt,
            cq_folding,
            cqcc,
            config,
        })
    }

    /// Configuration the extractor was built with
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Length of every vector this extractor produces
    pub fn dimension(&self) -> usize {
        self.config.feature_dimension()
    }

    /// Extract the feature vector of a waveform segment
    ///
    /// # Arguments
    ///
    /// * `samples` - Mono samples at the configured sample rate
    ///
    /// # Returns
    ///
    /// Feature vector of length [`FeatureExtractor::dimension`]
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::InvalidInput` for an empty segment and
    /// `DetectionError::DataShape` if any component is not finite
    pub fn extract(&self, samples: &[f32]) -> Result<FeatureVector, DetectionError> {
        if samples.is_empty() {
            return Err(DetectionError::InvalidInput(
                "Cannot extract features from an empty segment".to_string(),
            ));
        }

        let cfg = &self.config;
        let y: Vec<f64> = samples.iter().map(|&x| x as f64).collect();

        log::debug!("Extracting features from {} samples", y.len());

        let spectrum = self.stft.forward(&y);
        let magnitude = stft::magnitude(&spectrum);
        let power = stft::power(&spectrum);

        let chroma = chroma_stft(&power, &self.chroma_bank);
        let rms = spectral::rms(&y, cfg.n_fft, cfg.hop_length);
        let centroid = spectral::spectral_centroid(&magnitude, &self.freqs);
        let bandwidth = spectral::spectral_bandwidth(&magnitude, &self.freqs, &centroid);
        let rolloff = spectral::spectral_rolloff(&magnitude, &self.freqs, cfg.rolloff_percent as f64);
        let zcr = spectral::zero_crossing_rate(&y, cfg.n_fft, cfg.hop_length);
        let tonnetz = self.tonnetz(&spectrum, y.len());
        let contrast = spectral::spectral_contrast(&magnitude, &self.contrast_bands, cfg.top_db as f64);

        let mfcc = cepstral::mfcc(&power, &self.mel_bank, &self.mfcc_dct, cfg.top_db as f64);
        let imfcc = cepstral::imfcc(
            &magnitude,
            &self.reversed_mel_bank,
            &self.imfcc_dct,
            cfg.log_floor as f64,
        );

        let mut components: Vec<(&str, Vec<f64>)> = vec![
            ("chroma", vec![mean(chroma.into_iter().flatten())]),
            ("rms", vec![mean(rms)]),
            ("spectral centroid", vec![mean(centroid)]),
            ("spectral bandwidth", vec![mean(bandwidth)]),
            ("spectral roll-off", vec![mean(rolloff)]),
            ("zero-crossing rate", vec![mean(zcr)]),
            ("tonnetz", vec![mean(tonnetz.into_iter().flatten())]),
            ("spectral contrast", vec![mean(contrast.into_iter().flatten())]),
            ("mfcc", cepstral::column_means(&mfcc)),
            ("imfcc", cepstral::column_means(&imfcc)),
        ];

        if let Some(plan) = &self.cqcc {
            let cqt = plan.cqt.magnitude(&y);
            let cqcc = cepstral::cqcc(&cqt, &plan.dct, cfg.log_floor as f64);
            components.push(("cqcc", cepstral::column_means(&cqcc)));
        }

        let mut features = Vec::with_capacity(self.dimension());
        for (name, values) in components {
            if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
                return Err(DetectionError::DataShape(format!(
                    "Non-finite {} feature ({})",
                    name, bad
                )));
            }
            features.extend(values);
        }

        if features.len() != self.dimension() {
            return Err(DetectionError::DataShape(format!(
                "Feature vector has {} values, expected {}",
                features.len(),
                self.dimension()
            )));
        }

        Ok(features)
    }

    /// Tonnetz of the harmonic component (`frames × 6`)
    fn tonnetz(&self, spectrum: &[Vec<Complex<f64>>], length: usize) -> Vec<Vec<f64>> {
        let cfg = &self.config;
        let harmonic_spectrum = hpss::harmonic(
            spectrum,
            cfg.hpss_kernel,
            cfg.hpss_power as f64,
            cfg.hpss_margin as f64,
        );
        let harmonic = self.stft.inverse(&harmonic_spectrum, length);
        let cqt = self.chroma_cqt.magnitude(&harmonic);
        let chroma = chroma_cqt(&cqt, &self.cq_folding);
        tonnetz::tonnetz(&chroma, &self.tonnetz_projection)
    }
}
