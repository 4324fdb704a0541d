//! Classification modules
//!
//! - Kernel support vector classifier with Platt-calibrated probabilities
//! - Seeded train/test split and held-out evaluation
//! - Model bundle (normalization + classifier) with atomic persistence

pub mod calibration;
pub mod kernel;
pub mod metrics;
pub mod model;
pub mod split;
pub mod svm;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::error::DetectionError;

pub use metrics::EvaluationMetrics;
pub use model::{train, train_and_persist, Model, TrainingOutcome};
pub use split::{train_test_split, Split};
pub use svm::SvmClassifier;

/// Class of an audio sample
///
/// Probability pairs are always ordered `[fake, real]`, matching the numeric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// Synthetically generated speech (label 0)
    Fake = 0,
    /// Authentic speech (label 1)
    Real = 1,
}

impl Label {
    /// Label of a class directory: `REAL` in any case is real, anything else fake
    pub fn from_class_dir(name: &str) -> Self {
        if name.eq_ignore_ascii_case("real") {
            Label::Real
        } else {
            Label::Fake
        }
    }

    /// Numeric label (0 fake, 1 real)
    pub fn as_index(self) -> usize {
        self as usize
    }

    /// Most likely label of a `[fake, real]` probability pair (ties go to real)
    pub fn from_probabilities(probabilities: [f64; 2]) -> Self {
        if probabilities[1] >= probabilities[0] {
            Label::Real
        } else {
            Label::Fake
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Fake => f.write_str("fake"),
            Label::Real => f.write_str("real"),
        }
    }
}

/// Feature vector with its label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    /// Feature vector
    pub features: Vec<f64>,
    /// Class
    pub label: Label,
    /// File the features were extracted from, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

impl TrainingSample {
    /// Sample without a recorded source
    pub fn new(features: Vec<f64>, label: Label) -> Self {
        Self {
            features,
            label,
            source: None,
        }
    }
}

/// Binary probabilistic classifier
pub trait Classifier: Sized {
    /// Fit on a normalized feature matrix
    ///
    /// # Errors
    ///
    /// Returns `DetectionError::DataShape` for inconsistent inputs, a missing class
    /// or a numerically degenerate fit
    fn fit(matrix: &[Vec<f64>], labels: &[Label], config: &TrainingConfig) -> Result<Self, DetectionError>;

    /// `[p_fake, p_real]` for one normalized feature vector; never returns non-finite values
    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2], DetectionError>;

    /// Feature dimension seen at fit time
    fn n_features(&self) -> usize;
}
