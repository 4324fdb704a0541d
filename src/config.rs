//! Configuration parameters for feature extraction, training and inference
//!
//! Every struct implements `Default` with the reference configuration and can be
//! deserialized (with missing fields falling back to the defaults), so a YAML file
//! only needs to list the values it overrides:
//!
//! ```
//! use deepvoice_detect::config::DetectorConfig;
//!
//! let config = DetectorConfig::from_yaml_str("training:\n  c: 10.0\n  seed: 7\n")?;
//! assert_eq!(config.training.c, 10.0);
//! assert_eq!(config.extraction.feature_dimension(), 41);
//! # Ok::<(), deepvoice_detect::DetectionError>(())
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};
use crate::ml::kernel::{GammaPolicy, Kernel};
use crate::ml::svm::ClassWeight;
use crate::preprocessing::normalization::NormalizationMethod;

/// Sample rate every waveform is resampled to before feature extraction
pub const TARGET_SAMPLE_RATE: u32 = 22050;

/// Frequency of C1 in Hz, lowest constant-Q bin
pub const C1_HZ: f32 = 32.703_197;

/// Number of scalar statistics at the head of every feature vector
/// (chroma, RMS, centroid, bandwidth, roll-off, ZCR, tonnetz, contrast)
pub const SCALAR_FEATURES: usize = 8;

/// Feature extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    // Framing
    /// Sample rate expected by the extractor (default: 22050)
    pub sample_rate: u32,

    /// FFT frame size (default: 2048)
    pub n_fft: usize,

    /// Hop size between frames (default: 512)
    pub hop_length: usize,

    // Cepstral features
    /// Number of mel bands used by MFCC and IMFCC (default: 128)
    pub n_mels: usize,

    /// Number of MFCC means in the vector (default: 20)
    pub n_mfcc: usize,

    /// Number of IMFCC means in the vector (default: 13)
    pub n_imfcc: usize,

    /// Dynamic range kept by the dB conversion (default: 80.0)
    pub top_db: f32,

    /// Additive floor before the natural log of IMFCC/CQCC energies (default: 1e-9)
    pub log_floor: f32,

    /// Append CQCC means to the vector (default: false)
    pub include_cqcc: bool,

    /// Number of CQCC means when enabled (default: 13)
    pub n_cqcc: usize,

    /// Constant-Q bins used for CQCC (default: 84)
    pub cqcc_bins: usize,

    /// Constant-Q bins per octave used for CQCC (default: 12)
    pub cqcc_bins_per_octave: usize,

    // Spectral statistics
    /// Tuning deviation in fractions of a chroma bin (default: 0.0)
    pub tuning: f32,

    /// Roll-off energy fraction (default: 0.85)
    pub rolloff_percent: f32,

    /// Number of octave bands for spectral contrast (default: 6)
    pub contrast_bands: usize,

    /// Lower edge of the first contrast band in Hz (default: 200.0)
    pub contrast_fmin: f32,

    /// Quantile defining contrast peaks and valleys (default: 0.02)
    pub contrast_quantile: f32,

    // Tonnetz
    /// Median filter width for harmonic/percussive separation (default: 31)
    pub hpss_kernel: usize,

    /// Mask exponent for harmonic/percussive separation (default: 2.0)
    pub hpss_power: f32,

    /// Harmonic margin for harmonic/percussive separation (default: 1.0)
    pub hpss_margin: f32,

    /// Constant-Q bins per octave for the tonnetz chromagram (default: 36)
    pub chroma_cqt_bins_per_octave: usize,

    /// Octaves covered by the tonnetz chromagram (default: 7)
    pub chroma_cqt_octaves: usize,

    /// Lowest constant-Q frequency in Hz (default: C1)
    pub cqt_fmin: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            sample_rate: TARGET_SAMPLE_RATE,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            n_mfcc: 20,
            n_imfcc: 13,
            top_db: 80.0,
            log_floor: 1e-9,
            include_cqcc: false,
            n_cqcc: 13,
            cqcc_bins: 84,
            cqcc_bins_per_octave: 12,
            tuning: 0.0,
            rolloff_percent: 0.85,
            contrast_bands: 6,
            contrast_fmin: 200.0,
            contrast_quantile: 0.02,
            hpss_kernel: 31,
            hpss_power: 2.0,
            hpss_margin: 1.0,
            chroma_cqt_bins_per_octave: 36,
            chroma_cqt_octaves: 7,
            cqt_fmin: C1_HZ,
        }
    }
}

impl ExtractionConfig {
    /// Length of the feature vector produced with this configuration
    ///
    /// Depends only on the configuration, never on the input length.
    pub fn feature_dimension(&self) -> usize {
        let cqcc = if self.include_cqcc { self.n_cqcc } else { 0 };
        SCALAR_FEATURES + self.n_mfcc + self.n_imfcc + cqcc
    }

    /// Check parameter consistency
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::Configuration` describing the first invalid parameter
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(config_error("sample_rate must be > 0"));
        }
        if self.n_fft < 2 || self.hop_length == 0 {
            return Err(config_error("n_fft must be >= 2 and hop_length > 0"));
        }
        if self.n_mels == 0 {
            return Err(config_error("n_mels must be > 0"));
        }
        if self.n_mfcc > self.n_mels || self.n_imfcc > self.n_mels {
            return Err(config_error(format!(
                "n_mfcc ({}) and n_imfcc ({}) cannot exceed n_mels ({})",
                self.n_mfcc, self.n_imfcc, self.n_mels
            )));
        }
        if self.include_cqcc && (self.cqcc_bins_per_octave == 0 || self.n_cqcc > self.cqcc_bins) {
            return Err(config_error(format!(
                "n_cqcc ({}) cannot exceed cqcc_bins ({}) and bins per octave must be > 0",
                self.n_cqcc, self.cqcc_bins
            )));
        }
        if !(self.rolloff_percent > 0.0 && self.rolloff_percent < 1.0) {
            return Err(config_error("rolloff_percent must be in (0, 1)"));
        }
        if self.contrast_bands == 0 || self.contrast_fmin <= 0.0 {
            return Err(config_error("contrast_bands and contrast_fmin must be > 0"));
        }
        if !(self.contrast_quantile > 0.0 && self.contrast_quantile < 1.0) {
            return Err(config_error("contrast_quantile must be in (0, 1)"));
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        let contrast_top = self.contrast_fmin * 2f32.powi(self.contrast_bands as i32 - 1);
        if contrast_top >= nyquist {
            return Err(config_error(format!(
                "{} contrast bands from {} Hz exceed the Nyquist frequency {} Hz",
                self.contrast_bands, self.contrast_fmin, nyquist
            )));
        }
        if self.hpss_kernel == 0 {
            return Err(config_error("hpss_kernel must be > 0"));
        }
        if self.chroma_cqt_bins_per_octave == 0
            || self.chroma_cqt_bins_per_octave % 12 != 0
            || self.chroma_cqt_octaves == 0
        {
            return Err(config_error(
                "chroma_cqt_bins_per_octave must be a positive multiple of 12 and chroma_cqt_octaves > 0",
            ));
        }
        let chroma_top = self.cqt_fmin * 2f32.powf(self.chroma_cqt_octaves as f32);
        let cqcc_top = if self.include_cqcc {
            self.cqt_fmin * 2f32.powf(self.cqcc_bins as f32 / self.cqcc_bins_per_octave as f32)
        } else {
            0.0
        };
        let chroma_top = chroma_top.max(cqcc_top);
        if self.cqt_fmin <= 0.0 || chroma_top >= nyquist {
            return Err(config_error(format!(
                "constant-Q range {:.1}-{:.1} Hz must lie below the Nyquist frequency {} Hz",
                self.cqt_fmin, chroma_top, nyquist
            )));
        }
        Ok(())
    }
}

/// Classifier training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of samples held out for evaluation (default: 0.2)
    pub test_size: f64,

    /// Seed for the train/test split and calibration folds (default: 42)
    pub seed: u64,

    /// Row normalization applied before the classifier (default: l2)
    pub normalization: NormalizationMethod,

    /// Kernel function (default: RBF)
    pub kernel: Kernel,

    /// Regularization parameter C (default: 1.0)
    pub c: f64,

    /// Kernel coefficient policy (default: scale)
    pub gamma: GammaPolicy,

    /// Per-class weights multiplying C (default: uniform)
    pub class_weight: ClassWeight,

    /// Cross-validation folds used to calibrate probabilities (default: 5)
    pub probability_folds: usize,

    /// Stopping tolerance of the SMO solver (default: 1e-3)
    pub tolerance: f64,

    /// Iteration cap of the SMO solver (default: 10_000_000)
    pub max_iter: usize,

    /// Largest training set accepted; the solver keeps an n × n kernel matrix in
    /// memory (default: 20_000, about 3 GiB)
    pub max_kernel_samples: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            normalization: NormalizationMethod::L2,
            kernel: Kernel::Rbf,
            c: 1.0,
            gamma: GammaPolicy::Scale,
            class_weight: ClassWeight::Uniform,
            probability_folds: 5,
            tolerance: 1e-3,
            max_iter: 10_000_000,
            max_kernel_samples: 20_000,
        }
    }
}

impl TrainingConfig {
    /// Check parameter consistency before any numeric work
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::Configuration` describing the first invalid parameter
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(config_error(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(config_error(format!("C must be positive, got {}", self.c)));
        }
        if !(self.tolerance > 0.0) || self.max_iter == 0 || self.max_kernel_samples == 0 {
            return Err(config_error("tolerance, max_iter and max_kernel_samples must be > 0"));
        }
        if self.probability_folds < 2 {
            return Err(config_error(format!(
                "probability_folds must be >= 2, got {}",
                self.probability_folds
            )));
        }
        self.kernel.validate()?;
        self.gamma.validate()?;
        self.class_weight.validate()?;
        Ok(())
    }
}

/// Block-wise inference parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Block duration in seconds (default: 1.0)
    pub block_duration: f64,

    /// Skip blocks whose RMS level is below this threshold in dBFS
    /// (default: None, every block is scored)
    pub silence_threshold_db: Option<f32>,

    /// Presentation threshold below which a block is labelled uncertain
    /// (default: 0.30)
    pub uncertain_threshold: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            block_duration: 1.0,
            silence_threshold_db: None,
            uncertain_threshold: 0.30,
        }
    }
}

impl InferenceConfig {
    /// Check parameter consistency
    pub fn validate(&self) -> Result<()> {
        if !(self.block_duration > 0.0 && self.block_duration.is_finite()) {
            return Err(config_error(format!(
                "block_duration must be a positive number of seconds, got {}",
                self.block_duration
            )));
        }
        if !(0.0..=1.0).contains(&self.uncertain_threshold) {
            return Err(config_error(format!(
                "uncertain_threshold must be in [0, 1], got {}",
                self.uncertain_threshold
            )));
        }
        Ok(())
    }
}

/// Complete configuration, as read from a YAML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Feature extraction parameters
    pub extraction: ExtractionConfig,
    /// Training parameters
    pub training: TrainingConfig,
    /// Inference parameters
    pub inference: InferenceConfig,
}

impl DetectorConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: DetectorConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.extraction.validate()?;
        self.training.validate()?;
        self.inference.validate()
    }
}

fn config_error(msg: impl Into<String>) -> DetectionError {
    DetectionError::Configuration(msg.into())
}
