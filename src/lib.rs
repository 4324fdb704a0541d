//! # deepvoice-detect
//!
//! Detection of synthetically generated speech in audio recordings.
//!
//! ## Features
//!
//! - **Feature extraction**: spectral statistics, chroma and tonal centroids, MFCC,
//!   IMFCC and optional CQCC means summarized into one fixed-length vector
//! - **Block-wise inference**: per-block `[p_fake, p_real]` trace over a recording
//! - **Training**: kernel SVM with Platt-calibrated probabilities, seeded split and
//!   held-out evaluation, atomic model persistence
//! - **Corpus tooling**: labeled directory walk with parallel extraction and a JSON
//!   feature cache
//!
//! ## Quick Start
//!
//! ```no_run
//! use deepvoice_detect::{predict_audio_blocks, AudioSource};
//!
//! let source = AudioSource::from_path("interview.wav");
//! let predictions = predict_audio_blocks("models/svm.json", &source, 1.0)?;
//!
//! for (t, [p_fake, p_real]) in predictions.iter() {
//!     println!("{:>5.1}s  fake {:.2}  real {:.2}", t, p_fake, p_real);
//! }
//! println!("verdict: {:?}", predictions.verdict());
//! # Ok::<(), deepvoice_detect::DetectionError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Audio Input → Decode/Downmix/Resample → Blocks → Feature Extraction → L2 Normalization → SVM → [p_fake, p_real]
//! ```
//!
//! Training follows the same path per corpus file (without block segmentation),
//! then splits the labeled vectors, fits on the training partition and evaluates
//! on the held-out partition.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod io;
pub mod ml;
pub mod preprocessing;

use std::path::Path;

// Re-export main types
pub use analysis::detector::Detector;
pub use analysis::result::{BlockLabel, BlockPredictions, Verdict};
pub use config::{DetectorConfig, ExtractionConfig, InferenceConfig, TrainingConfig};
pub use error::{DetectionError, Result};
pub use features::{FeatureExtractor, FeatureVector};
pub use io::{AudioSource, Waveform};
pub use ml::{EvaluationMetrics, Label, Model, TrainingSample};

/// Block-wise authenticity probabilities for one recording
///
/// Loads the model, decodes the source, splits it into `block_duration`-second
/// blocks and scores each one with the default extraction configuration.
///
/// # Arguments
///
/// * `model_location` - Model artifact written by [`ml::train_and_persist`]
/// * `source` - File path or in-memory audio
/// * `block_duration` - Block length in seconds (1.0 in the reference setup)
///
/// # Returns
///
/// Block start times and `[p_fake, p_real]` pairs, in time order
///
/// # Errors
///
/// - `DetectionError::MissingArtifact` if the model does not exist (checked before decoding)
/// - `DetectionError::Decode` if the audio cannot be decoded
/// - `DetectionError::Configuration` for a non-positive block duration
pub fn predict_audio_blocks(
    model_location: impl AsRef<Path>,
    source: &AudioSource,
    block_duration: f64,
) -> Result<BlockPredictions> {
    let model_location = model_location.as_ref();
    if !model_location.is_file() {
        return Err(DetectionError::MissingArtifact(model_location.to_path_buf()));
    }

    let config = InferenceConfig {
        block_duration,
        ..InferenceConfig::default()
    };
    let detector = Detector::load(model_location, config)?;
    detector.predict_source(source)
}
